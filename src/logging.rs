//! Logging setup for the `stagededupe` binary.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from
//! (highest priority first):
//!
//! 1. `RUST_LOG`, when set
//! 2. `--quiet` (errors only) or `-v` / `-vv` (debug / trace)
//! 3. info
//!
//! Stage summaries log at info, per-record exclusions at debug or trace, and
//! oracle failures and dropped oracle groups at warn, so `-q` silences all
//! of them while keeping fatal errors.
//!
//! ```rust,no_run
//! use stagededupe::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialize the global logger, before any logging.
///
/// Later calls in the same process keep the first logger.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=info, 1=debug, 2+=trace)
/// * `quiet` - Only show errors (ignored when `RUST_LOG` is set)
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var("RUST_LOG").ok();

    let mut builder = Builder::new();
    match from_env {
        Some(_) => {
            builder.parse_default_env();
        }
        None => {
            builder.filter_level(level_for(verbose, quiet));
        }
    }
    configure_format(&mut builder, verbose);
    if builder.try_init().is_err() {
        return;
    }

    match from_env {
        Some(filter) => log::debug!("Logging configured from RUST_LOG={filter}"),
        None => log::debug!("Logging initialized at level {}", level_for(verbose, quiet)),
    }
}

/// Map CLI flags to a level filter. `quiet` beats `verbose`.
fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Debug builds print timestamps, plus module paths from `-v` up.
/// Release builds print level and message only.
fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            let timestamp = buf.timestamp_seconds();
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{timestamp} {style}{level:<5}{style:#} [{}] {}",
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(buf, "{timestamp} {style}{level:<5}{style:#} {}", record.args())
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{level:<5}{style:#} {}", record.args())
        });
    }
}
