#![forbid(unsafe_code)]

//! `tracing` output to the browser console.

use std::io;
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

static INIT: Once = Once::new();

/// Buffers one formatted event and hands it to `console.log` on drop.
pub(crate) struct ConsoleWriter {
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            web_sys::console::log_1(&line.into());
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { buf: Vec::new() }
    }
}

/// Install the console subscriber once per page. `filter` uses `EnvFilter`
/// directive syntax, e.g. `"backdrop_runtime=debug"`.
pub(crate) fn init(filter: &str) {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(MakeConsoleWriter)
            .with_ansi(false)
            .without_time()
            .try_init();
        if installed.is_err() {
            web_sys::console::warn_1(&"backdrop: a tracing subscriber is already installed".into());
        }
    });
}
