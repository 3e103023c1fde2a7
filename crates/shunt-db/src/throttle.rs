//! Throttle oracles.

use crate::traits::{ThrottleCheck, ThrottleOracle};
use async_trait::async_trait;
use std::sync::Mutex;

/// Never holds work back.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverThrottle;

#[async_trait]
impl ThrottleOracle for NeverThrottle {
    async fn check(&self, _app: &str) -> ThrottleCheck {
        ThrottleCheck::ok()
    }
}

/// Operator-controlled throttle: any ratio above zero holds every app back.
#[derive(Debug, Default)]
pub struct ManualThrottle {
    state: Mutex<(f64, String)>,
}

impl ManualThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the throttle ratio (clamped to 0.0..=1.0).
    pub fn throttle(&self, ratio: f64, reason: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = (ratio.clamp(0.0, 1.0), reason.into());
    }

    pub fn unthrottle(&self) {
        self.throttle(0.0, "");
    }

    pub fn ratio(&self) -> f64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).0
    }
}

#[async_trait]
impl ThrottleOracle for ManualThrottle {
    async fn check(&self, app: &str) -> ThrottleCheck {
        let (ratio, reason) = self.state.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if ratio > 0.0 {
            ThrottleCheck {
                throttled: true,
                ratio,
                reason: if reason.is_empty() {
                    format!("{} throttled by operator", app)
                } else {
                    reason
                },
            }
        } else {
            ThrottleCheck::ok()
        }
    }
}
