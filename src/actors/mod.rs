// ============================================================================
// Actors Module
// ============================================================================
//
// Structure:
// - manager        - ManagerActor, sole owner of the registries, and its commands
// - health_monitor - timer task that submits scan-and-heal commands
//
// ============================================================================

// Private module declarations
mod health_monitor;
mod manager;

// Re-export for public API
pub use manager::{ConsumerStatus, HealReport};

// Internal re-exports for use within the crate
pub(crate) use health_monitor::spawn_health_monitor;
pub(crate) use manager::{
    ListConsumers,
    ManagerActor,
    RemoveFactory,
    ScanAndHeal,
    Start,
    Stop,
};
