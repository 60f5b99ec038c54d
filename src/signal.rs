//! Cooperative cancellation and Ctrl+C wiring

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag checked by the scanner and the poll loop at safe points
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancel `token` when the process receives Ctrl+C.
///
/// The listener runs on its own thread with a single-threaded tokio runtime.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("fim-ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Interrupt received, stopping monitor");
                        token.cancel();
                    }
                    Err(e) => tracing::warn!("Failed to listen for Ctrl+C: {}", e),
                }
            });
        })?;

    Ok(())
}
