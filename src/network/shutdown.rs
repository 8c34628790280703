//! Process-level shutdown signal
//!
//! Connections never close listeners themselves. They trigger this signal
//! and the server, which owns every listener and the store, tears them down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct State {
    triggered: Mutex<bool>,
    changed: Condvar,
}

/// Cloneable shutdown trigger shared by the server and its workers
#[derive(Clone, Default)]
pub struct Shutdown {
    state: Arc<State>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; only the first call has any effect
    pub fn trigger(&self, reason: &str) {
        let mut triggered = self.state.triggered.lock();
        if !*triggered {
            *triggered = true;
            tracing::info!("Shutdown requested: {}", reason);
            self.state.changed.notify_all();
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.state.triggered.lock()
    }

    /// Block until shutdown is triggered or `timeout` elapses
    ///
    /// Returns true if shutdown has been triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut triggered = self.state.triggered.lock();
        if !*triggered {
            let _ = self.state.changed.wait_for(&mut triggered, timeout);
        }
        *triggered
    }
}
