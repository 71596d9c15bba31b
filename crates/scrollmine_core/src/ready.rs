//! crates/scrollmine_core/src/ready.rs
//!
//! A one-way readiness flag a component raises once it has finished loading.
//! Waiters resolve as soon as the flag is raised instead of polling for it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct Readiness {
    state: Arc<watch::Sender<bool>>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn mark_ready(&self) {
        self.state.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until ready; `false` when `timeout` elapses first.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut ready = self.state.subscribe();
        let raised = matches!(
            tokio::time::timeout(timeout, ready.wait_for(|ready| *ready)).await,
            Ok(Ok(_))
        );
        raised
    }
}
