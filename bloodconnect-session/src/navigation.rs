//! Navigation hook used for the hard reset on logout

use tracing::info;

/// Performs a full client navigation, discarding all in-memory UI state
pub trait Navigator: Send + Sync {
    fn hard_reset(&self, path: &str);
}

/// Navigator for headless clients; records the reset in the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn hard_reset(&self, path: &str) {
        info!(path = %path, "Hard navigation reset");
    }
}
