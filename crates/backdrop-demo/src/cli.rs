#![forbid(unsafe_code)]

//! Command-line argument parsing for the background demo.
//!
//! Parses args manually (no external dependencies) to keep the binary lean.
//! Supports environment variable overrides via `BACKDROP_DEMO_*` prefix.

use std::env;
use std::path::PathBuf;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Backdrop Demo: themed particle background on a simulated page

USAGE:
    backdrop-demo [OPTIONS]

OPTIONS:
    --target=ID          Mount target id (default: particles-js)
    --load-after-ms=N    Simulated particle script load delay (default: 350)
    --toggles=N          Theme toggles to perform (default: 2)
    --toggle-every-ms=N  Time between toggles (default: 500)
    --duration-ms=N      Total simulated time (default: 2000)
    --tick-ms=N          Simulation step (default: 50)
    --state-file=PATH    Preference file (default: XDG state dir)
    --effects=PATH       JSON file with light/dark effect configs
    --in-memory          Do not persist the theme preference
    --print-config       Print the particles.js params for the current theme and exit
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    BACKDROP_DEMO_LOAD_AFTER_MS   Override --load-after-ms
    BACKDROP_DEMO_TOGGLES         Override --toggles
    BACKDROP_DEMO_DURATION_MS     Override --duration-ms
    BACKDROP_DEMO_STATE_FILE      Override --state-file
    BACKDROP_DEMO_EFFECTS         Override --effects
    BACKDROP_TARGET_ID            Default mount target id
    BACKDROP_POLL_INTERVAL_MS     Library poll interval
    RUST_LOG                      Log filter (default: info; backdrop_runtime=trace
                                  for every poll tick)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Mount target override.
    pub target: Option<String>,
    /// Milliseconds before the simulated library becomes ready.
    pub load_after_ms: u64,
    /// Number of theme toggles.
    pub toggles: u32,
    /// Milliseconds between toggles, starting after the library loads.
    pub toggle_every_ms: u64,
    /// Total simulated milliseconds.
    pub duration_ms: u64,
    /// Simulation step.
    pub tick_ms: u64,
    /// Preference file override.
    pub state_file: Option<PathBuf>,
    /// Effects file.
    pub effects: Option<PathBuf>,
    /// Skip persistence.
    pub in_memory: bool,
    /// Print params and exit.
    pub print_config: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            target: None,
            load_after_ms: 350,
            toggles: 2,
            toggle_every_ms: 500,
            duration_ms: 2000,
            tick_ms: 50,
            state_file: None,
            effects: None,
            in_memory: false,
            print_config: false,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

fn parse_number<T: std::str::FromStr>(flag: &str, val: &str) -> Result<T, String> {
    val.parse()
        .map_err(|_| format!("Invalid {flag} value: {val}"))
}

impl Opts {
    /// Parse command-line arguments and environment variables, exiting on
    /// `--help`, `--version` or bad input.
    pub fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match Self::parse_from(&args, |name| env::var(name).ok()) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("backdrop-demo {VERSION}");
                process::exit(0);
            }
            Err(msg) => {
                eprintln!("{msg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` with environment values from `lookup`.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags. Unparsable environment values are ignored.
    pub fn parse_from(
        args: &[String],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Command, String> {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if let Some(val) = lookup("BACKDROP_DEMO_LOAD_AFTER_MS")
            && let Ok(n) = val.parse()
        {
            opts.load_after_ms = n;
        }
        if let Some(val) = lookup("BACKDROP_DEMO_TOGGLES")
            && let Ok(n) = val.parse()
        {
            opts.toggles = n;
        }
        if let Some(val) = lookup("BACKDROP_DEMO_DURATION_MS")
            && let Ok(n) = val.parse()
        {
            opts.duration_ms = n;
        }
        if let Some(val) = lookup("BACKDROP_DEMO_STATE_FILE")
            && !val.is_empty()
        {
            opts.state_file = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("BACKDROP_DEMO_EFFECTS")
            && !val.is_empty()
        {
            opts.effects = Some(PathBuf::from(val));
        }

        // Parse command-line args (override env vars)
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                "--in-memory" => opts.in_memory = true,
                "--print-config" => opts.print_config = true,
                other => {
                    if let Some(val) = other.strip_prefix("--target=") {
                        opts.target = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--load-after-ms=") {
                        opts.load_after_ms = parse_number("--load-after-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--toggles=") {
                        opts.toggles = parse_number("--toggles", val)?;
                    } else if let Some(val) = other.strip_prefix("--toggle-every-ms=") {
                        opts.toggle_every_ms = parse_number("--toggle-every-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--duration-ms=") {
                        opts.duration_ms = parse_number("--duration-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--tick-ms=") {
                        opts.tick_ms = parse_number("--tick-ms", val)?;
                        if opts.tick_ms == 0 {
                            return Err("--tick-ms must be positive".to_string());
                        }
                    } else if let Some(val) = other.strip_prefix("--state-file=") {
                        opts.state_file = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--effects=") {
                        opts.effects = Some(PathBuf::from(val));
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }

        Ok(Command::Run(opts))
    }
}
