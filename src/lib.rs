// ============================================================================
// Consumer Supervisor
// ============================================================================
//
// Owns a dynamic set of long-running consumers produced by pluggable
// factories, serializes every registry mutation through one actor, and
// periodically replaces consumers that are no longer alive.
//
// Structure:
// - contracts - Factory / Consumer traits implemented by transport bindings
// - actors    - ManagerActor (registry owner) and the health monitor
// - manager   - Manager, the public handle (start / stop / inspect)
// - errors    - SupervisorError and the MultiError aggregate
// - config    - ManagerConfig and recreation backoff settings
// - metrics   - per-manager Prometheus registry
// - telemetry - tracing subscriber setup
//
// ============================================================================

mod actors;
mod manager;
mod utils;

pub mod config;
pub mod contracts;
pub mod errors;
pub mod metrics;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use actors::{ConsumerStatus, HealReport};
pub use config::{ManagerConfig, RetryConfig};
pub use contracts::{Consumer, Factory};
pub use errors::{MultiError, SupervisorError};
pub use manager::Manager;
pub use metrics::Metrics;
