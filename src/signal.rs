//! Ctrl+C handling.
//!
//! A single `Arc<AtomicBool>` is shared by the record builder, the walker and
//! the detection orchestrator. Setting it makes the walker stop, the builder
//! skip remaining files, the orchestrator refuse to start further stages, and
//! an in-flight oracle call get abandoned.
//!
//! ```rust,no_run
//! use stagededupe::duplicates::FinderConfig;
//! use stagededupe::signal::install_handler;
//!
//! let handler = install_handler().unwrap();
//! let config = FinderConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Process exit code after Ctrl+C (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Flag to hand to the finder, walker and record builder.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C hook and return its handler.
///
/// The hook can only be registered once per process. Later calls (repeated
/// `run_app` invocations in tests) get the same handler back with the flag
/// cleared. If some other code already owns the hook, an unhooked handler
/// is returned that still honors [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Currently infallible; the `Result` leaves room for platforms where
/// installation must be reported.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();
    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing current stage...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    let handler = match installed {
        Ok(()) => handler,
        Err(e) => {
            log::debug!("Ctrl+C hook unavailable ({e}), using unhooked handler");
            ShutdownHandler::new()
        }
    };
    Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone())
}
