use crate::error::{Result, TraceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Cancellation flag checked between files of a directory run.
///
/// The first Ctrl+C lets the current file finish; a second one exits with 130.
#[derive(Debug, Clone)]
pub struct GracefulShutdown {
    running: Arc<AtomicBool>,
}

impl GracefulShutdown {
    /// Creates the flag and installs the process-wide Ctrl+C handler.
    pub fn new() -> Result<Self> {
        let shutdown = Self::detached();
        let running = Arc::clone(&shutdown.running);

        ctrlc::set_handler(move || {
            if running.swap(false, Ordering::SeqCst) {
                warn!("interrupt received, stopping after the current file");
            } else {
                std::process::exit(130);
            }
        })
        .map_err(|e| TraceError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(shutdown)
    }

    /// A flag with no signal handler behind it.
    pub fn detached() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TraceError::Cancelled);
        }
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_is_shared_between_clones() {
        let shutdown = GracefulShutdown::detached();
        let observer = shutdown.clone();
        assert!(observer.check_shutdown().is_ok());

        shutdown.request_shutdown();
        assert!(matches!(observer.check_shutdown(), Err(TraceError::Cancelled)));
    }
}
