//! Logging setup for the verdict binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job.
//!
//! Log levels:
//! - ERROR: A run aborted (structural error, unreadable input)
//! - WARN: A task failed, a fallback was taken
//! - INFO: Run and round level progress, capability summaries
//! - DEBUG: Per-task dispatch and per-detector detail
//!
//! Debug mode can be enabled with `--debug` or `VERDICT_DEBUG=1`. A full
//! filter in `VERDICT_LOG` (e.g. `verdict=trace`) overrides both.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::Result;

/// Environment variable holding a full filter directive.
pub const LOG_ENV: &str = "VERDICT_LOG";
/// Environment variable that turns on debug mode.
pub const DEBUG_ENV: &str = "VERDICT_DEBUG";

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Log to stderr.
pub fn init(debug: bool) {
    let debug = resolve_debug(debug);
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter(debug))
        .try_init();
}

/// Log to `~/.verdict/verdict.log`, truncating it first.
pub fn init_to_file(debug: bool) -> Result<PathBuf> {
    let debug = resolve_debug(debug);
    std::fs::create_dir_all(Config::verdict_dir()?)?;
    let path = Config::log_path()?;
    let file = File::create(&path)?;

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter(debug))
        .try_init();
    Ok(path)
}

/// Check if debug mode is enabled.
pub fn is_debug() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

fn resolve_debug(debug: bool) -> bool {
    let enabled = debug || env_flag(std::env::var(DEBUG_ENV).ok().as_deref());
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    enabled
}

fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(debug)))
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "verdict=debug"
    } else {
        "verdict=info"
    }
}

fn env_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
