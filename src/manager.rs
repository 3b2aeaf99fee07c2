use kameo::actor::ActorRef;
use kameo::error::SendError;
use kameo::Actor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::actors::{
    spawn_health_monitor,
    ConsumerStatus,
    HealReport,
    ListConsumers,
    ManagerActor,
    RemoveFactory,
    ScanAndHeal,
    Start,
    Stop,
};
use crate::config::ManagerConfig;
use crate::contracts::Factory;
use crate::errors::{MultiError, SupervisorError};
use crate::metrics::Metrics;

// ============================================================================
// Manager - Public handle over the manager actor
// ============================================================================
//
// Every operation submits one command to the actor and waits for its reply,
// so callers observe the full outcome of their own command. The handle also
// owns the health monitor task; dropping it stops the monitor and releases
// the actor.
//
// ============================================================================

pub struct Manager {
    actor_ref: ActorRef<ManagerActor>,
    monitor: JoinHandle<()>,
    metrics: Arc<Metrics>,
    config: ManagerConfig,
}

impl Manager {
    /// Spawn the manager actor and its health monitor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ManagerConfig) -> Result<Self, SupervisorError> {
        config.validate()?;

        let metrics = Arc::new(Metrics::new()?);
        let actor_ref = ManagerActor::spawn(ManagerActor::new(&config, metrics.clone()));
        let monitor = spawn_health_monitor(
            actor_ref.downgrade(),
            config.check_interval,
            metrics.clone(),
        );

        tracing::info!(
            check_interval = ?config.check_interval,
            kill_timeout = ?config.kill_timeout,
            "Consumer manager started"
        );

        Ok(Self {
            actor_ref,
            monitor,
            metrics,
            config,
        })
    }

    /// Default configuration with the given health-check interval
    pub fn with_check_interval(interval: Duration) -> Result<Self, SupervisorError> {
        Self::new(ManagerConfig::default().with_check_interval(interval))
    }

    /// Register `factories`, create and run all of their consumers.
    ///
    /// Returns the first factory failure. Consumers created before that
    /// failure stay registered and running.
    pub async fn start(&self, factories: Vec<Arc<dyn Factory>>) -> Result<(), SupervisorError> {
        self.metrics.command_submitted();
        match self.actor_ref.ask(Start { factories }).send().await {
            Ok(()) => Ok(()),
            Err(SendError::HandlerError(err)) => Err(err),
            Err(_) => Err(self.unavailable()),
        }
    }

    /// Kill every registered consumer and empty the registry.
    ///
    /// All consumers are asked to stop even if some fail; every failure is
    /// returned in the aggregate.
    pub async fn stop(&self) -> Result<(), MultiError> {
        self.metrics.command_submitted();
        match self.actor_ref.ask(Stop).send().await {
            Ok(()) => Ok(()),
            Err(SendError::HandlerError(errors)) => Err(errors),
            Err(_) => Err(self.unavailable().into()),
        }
    }

    /// Run one scan-and-heal pass now, in order with every other command.
    pub async fn check_now(&self) -> Result<HealReport, SupervisorError> {
        self.metrics.command_submitted();
        self.actor_ref
            .ask(ScanAndHeal)
            .send()
            .await
            .map_err(|_| self.unavailable())
    }

    /// Snapshot of the consumer registry, sorted by name.
    pub async fn consumers(&self) -> Result<Vec<ConsumerStatus>, SupervisorError> {
        self.metrics.command_submitted();
        self.actor_ref
            .ask(ListConsumers)
            .send()
            .await
            .map(|snapshot| snapshot.consumers)
            .map_err(|_| self.unavailable())
    }

    /// Deregister a factory. Its consumers keep running but are no longer
    /// recreated when they die. Returns whether the factory was registered.
    pub async fn remove_factory(&self, name: &str) -> Result<bool, SupervisorError> {
        self.metrics.command_submitted();
        self.actor_ref
            .ask(RemoveFactory {
                name: name.to_string(),
            })
            .send()
            .await
            .map_err(|_| self.unavailable())
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Stop the health monitor and the actor. Consumers are left as they
    /// are; call `stop` first to kill them.
    pub async fn shutdown(self) {
        self.monitor.abort();
        if self.actor_ref.stop_gracefully().await.is_err() {
            tracing::debug!("Manager actor was already stopped");
        }
        tracing::info!("Consumer manager shut down");
    }

    fn unavailable(&self) -> SupervisorError {
        // The command never reached a handler
        self.metrics.command_handled();
        SupervisorError::ManagerUnavailable
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}
