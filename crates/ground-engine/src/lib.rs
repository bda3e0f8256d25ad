//! Ground-traffic engine: orchestration of routing, clearances,
//! runway assignment, sequencing and collision avoidance over the
//! pure domain logic in `ground-core`.

pub mod config;
pub mod cycles;
pub mod loops;
pub mod orchestrator;
pub mod state;

pub use config::EngineConfig;
pub use cycles::{fast_cycle, slow_cycle};
pub use loops::run_engine;
pub use orchestrator::Orchestrator;
pub use state::{GroundState, RunwayHold, RunwayRequest};
