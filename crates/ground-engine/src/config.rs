//! Engine configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Collision-avoidance cycle period.
    pub fast_cycle_ms: u64,
    /// Routing/clearance/sequencing cycle period.
    pub slow_cycle_ms: u64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            fast_cycle_ms: env::var("GROUND_FAST_CYCLE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            slow_cycle_ms: env::var("GROUND_SLOW_CYCLE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_cycle_ms: 100,
            slow_cycle_ms: 1000,
        }
    }
}
