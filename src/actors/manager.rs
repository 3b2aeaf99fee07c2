use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::reply::{Reply, ReplyError};
use kameo::Actor;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{ManagerConfig, RetryConfig};
use crate::contracts::{Consumer, Factory};
use crate::errors::{MultiError, SupervisorError};
use crate::metrics::Metrics;
use crate::utils::{Backoff, BackoffStep};

// ============================================================================
// Manager Actor - Single owner of the factory and consumer registries
// ============================================================================
//
// Responsibilities:
// - Hold the factory, consumer and pending-recreation registries
// - Execute commands (messages) strictly one at a time
// - Start and stop consumers on behalf of the Manager facade
// - Scan for dead consumers and replace them on behalf of the health monitor
//
// Nothing outside this actor ever reads or writes the registries. Handlers
// must not wait on another command, the mailbox is the only queue.
//
// ============================================================================

struct ConsumerEntry {
    consumer: Box<dyn Consumer>,
    instance: Uuid,
    registered_at: DateTime<Utc>,
    running: bool,
    restarts: u32,
}

impl ConsumerEntry {
    fn new(consumer: Box<dyn Consumer>, restarts: u32) -> Self {
        Self {
            consumer,
            instance: Uuid::new_v4(),
            registered_at: Utc::now(),
            running: false,
            restarts,
        }
    }

    fn run(&mut self) {
        self.consumer.run();
        self.running = true;
    }

    fn status(&self, name: &str) -> ConsumerStatus {
        ConsumerStatus {
            name: name.to_string(),
            factory_name: self.consumer.factory_name().to_string(),
            instance: self.instance,
            alive: self.consumer.alive(),
            running: self.running,
            restarts: self.restarts,
            registered_at: self.registered_at,
        }
    }
}

/// A slot whose recreation failed and is waiting for its next attempt
struct PendingRecreation {
    factory: String,
    restarts: u32,
    backoff: Backoff,
    retry_at: Instant,
}

pub struct ManagerActor {
    factories: HashMap<String, Arc<dyn Factory>>,
    consumers: HashMap<String, ConsumerEntry>,
    pending: HashMap<String, PendingRecreation>,
    kill_timeout: Duration,
    recreate_backoff: RetryConfig,
    metrics: Arc<Metrics>,
}

impl ManagerActor {
    pub fn new(config: &ManagerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            factories: HashMap::new(),
            consumers: HashMap::new(),
            pending: HashMap::new(),
            kill_timeout: config.kill_timeout,
            recreate_backoff: config.recreate_backoff.clone(),
            metrics,
        }
    }

    fn record_sizes(&self) {
        self.metrics
            .record_registry_sizes(self.factories.len(), self.consumers.len());
    }

    /// Register a freshly created consumer. A previous instance under the
    /// same name is killed before it is discarded.
    async fn register(&mut self, consumer: Box<dyn Consumer>) {
        let name = consumer.name().to_string();
        self.pending.remove(&name);

        let entry = ConsumerEntry::new(consumer, 0);
        tracing::debug!(
            consumer = %name,
            factory = %entry.consumer.factory_name(),
            instance = %entry.instance,
            "Registered consumer"
        );

        if let Some(mut previous) = self.consumers.insert(name.clone(), entry) {
            tracing::warn!(consumer = %name, "Consumer name already registered, replacing previous instance");
            if let Err(e) = kill_bounded(previous.consumer.as_mut(), self.kill_timeout).await {
                self.metrics.kill_failures_total.inc();
                tracing::warn!(error = %e, "Failed to kill replaced consumer");
            }
        }
    }

    fn run_idle_consumers(&mut self) {
        for (name, entry) in self.consumers.iter_mut().filter(|(_, e)| !e.running) {
            entry.run();
            tracing::info!(consumer = %name, instance = %entry.instance, "Consumer running");
        }
    }

    /// Try to put a new instance into `name`'s slot using its origin factory.
    async fn recreate(
        &mut self,
        name: String,
        factory_name: String,
        restarts: u32,
        mut backoff: Backoff,
        report: &mut HealReport,
    ) {
        let Some(factory) = self.factories.get(&factory_name).cloned() else {
            let err = SupervisorError::MissingFactory {
                factory: factory_name,
                consumer: name,
            };
            tracing::warn!(error = %err, "Leaving consumer slot empty");
            report.abandoned += 1;
            return;
        };

        match factory.create_consumer(&name).await {
            Ok(consumer) => {
                let mut entry = ConsumerEntry::new(consumer, restarts);
                entry.run();

                tracing::info!(
                    consumer = %name,
                    factory = %factory_name,
                    instance = %entry.instance,
                    restarts = restarts,
                    "Consumer recreated"
                );

                self.consumers.insert(name, entry);
                self.metrics.record_recreation(&factory_name, true);
                report.recreated += 1;
            }
            Err(source) => {
                self.metrics.record_recreation(&factory_name, false);
                let err = SupervisorError::ConsumerCreation {
                    factory: factory_name.clone(),
                    consumer: name.clone(),
                    source,
                };

                match backoff.record_failure(Instant::now()) {
                    BackoffStep::RetryAt(retry_at) => {
                        tracing::warn!(
                            error = %err,
                            attempt = backoff.attempts(),
                            "Consumer recreation failed, will retry"
                        );
                        self.pending.insert(
                            name,
                            PendingRecreation {
                                factory: factory_name,
                                restarts,
                                backoff,
                                retry_at,
                            },
                        );
                        report.deferred += 1;
                    }
                    BackoffStep::Exhausted => {
                        tracing::error!(
                            error = %err,
                            attempts = backoff.attempts(),
                            "Consumer recreation failed after all retries, giving up on slot"
                        );
                        report.abandoned += 1;
                    }
                }
            }
        }
    }

    async fn retry_pending(&mut self, report: &mut HealReport) {
        let now = Instant::now();
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.retry_at <= now)
            .map(|(name, _)| name.clone())
            .collect();

        for name in due {
            let Some(pending) = self.pending.remove(&name) else {
                continue;
            };
            if self.consumers.contains_key(&name) {
                // Refilled by a later start
                continue;
            }
            self.recreate(name, pending.factory, pending.restarts, pending.backoff, report)
                .await;
        }
    }
}

/// Kill a consumer, giving up after `timeout`.
async fn kill_bounded(consumer: &mut dyn Consumer, timeout: Duration) -> Result<(), SupervisorError> {
    let name = consumer.name().to_string();
    match tokio::time::timeout(timeout, consumer.kill()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(SupervisorError::Kill {
            consumer: name,
            source,
        }),
        Err(_) => Err(SupervisorError::KillTimeout {
            consumer: name,
            timeout,
        }),
    }
}

impl Actor for ManagerActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(
        state: Self::Args,
        _actor_ref: ActorRef<Self>
    ) -> Result<Self, Self::Error> {
        tracing::info!("ManagerActor started");
        Ok(state)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Register factories, create their consumers and run them
pub struct Start {
    pub factories: Vec<Arc<dyn Factory>>,
}

/// Kill every consumer and empty the registry
pub struct Stop;

/// Replace dead consumers and retry pending recreations
pub struct ScanAndHeal;

/// Forget a factory; its consumers will not be recreated
pub struct RemoveFactory {
    pub name: String,
}

pub struct ListConsumers;

/// Outcome of one scan-and-heal pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealReport {
    /// Consumers checked for liveness
    pub checked: usize,
    /// Consumers found dead and removed
    pub dead: usize,
    /// Slots refilled with a new instance
    pub recreated: usize,
    /// Slots whose recreation failed and will be retried
    pub deferred: usize,
    /// Slots left empty for good
    pub abandoned: usize,
}

/// Point-in-time view of one registered consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumerStatus {
    pub name: String,
    pub factory_name: String,
    pub instance: Uuid,
    pub alive: bool,
    pub running: bool,
    pub restarts: u32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConsumerSnapshot {
    pub consumers: Vec<ConsumerStatus>,
}

// Implement Reply for the custom reply types so they can be returned by `ask`
impl Reply for HealReport {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

impl Reply for ConsumerSnapshot {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<Start> for ManagerActor {
    type Reply = Result<(), SupervisorError>;

    async fn handle(&mut self, msg: Start, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.metrics.command_handled();

        // Later duplicates overwrite earlier ones, each name is created once
        let mut order: Vec<String> = Vec::new();
        for factory in msg.factories {
            let name = factory.name().to_string();
            if !order.contains(&name) {
                order.push(name.clone());
            }
            self.factories.insert(name, factory);
        }

        let mut outcome = Ok(());
        for name in &order {
            let Some(factory) = self.factories.get(name).cloned() else {
                continue;
            };

            match factory.create_consumers().await {
                Ok(consumers) => {
                    tracing::info!(
                        factory = %name,
                        count = consumers.len(),
                        "Factory created consumers"
                    );
                    for consumer in consumers {
                        self.register(consumer).await;
                    }
                }
                Err(source) => {
                    tracing::error!(factory = %name, error = %source, "Factory failed to create consumers");
                    outcome = Err(SupervisorError::FactoryCreation {
                        factory: name.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        // Whatever made it into the registry runs, even after a failure
        self.run_idle_consumers();
        self.record_sizes();
        outcome
    }
}

impl Message<Stop> for ManagerActor {
    type Reply = Result<(), MultiError>;

    async fn handle(&mut self, _msg: Stop, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.metrics.command_handled();

        let timeout = self.kill_timeout;
        let mut entries: Vec<ConsumerEntry> = self.consumers.drain().map(|(_, entry)| entry).collect();
        self.pending.clear();

        let results = join_all(
            entries
                .iter_mut()
                .map(|entry| kill_bounded(entry.consumer.as_mut(), timeout)),
        )
        .await;

        let errors: MultiError = results.into_iter().filter_map(Result::err).collect();
        for error in &errors {
            self.metrics.kill_failures_total.inc();
            tracing::warn!(error = %error, "Consumer failed to stop");
        }

        tracing::info!(
            stopped = entries.len() - errors.len(),
            failed = errors.len(),
            "Stopped consumers"
        );

        self.record_sizes();
        errors.into_result()
    }
}

impl Message<ScanAndHeal> for ManagerActor {
    type Reply = HealReport;

    async fn handle(&mut self, _msg: ScanAndHeal, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.metrics.command_handled();
        self.metrics.health_scans_total.inc();

        let mut report = HealReport::default();
        self.retry_pending(&mut report).await;

        report.checked = self.consumers.len();
        let dead: Vec<String> = self
            .consumers
            .iter()
            .filter(|(_, entry)| !entry.consumer.alive())
            .map(|(name, _)| name.clone())
            .collect();

        for name in dead {
            let Some(mut entry) = self.consumers.remove(&name) else {
                continue;
            };
            report.dead += 1;

            let factory_name = entry.consumer.factory_name().to_string();
            tracing::warn!(
                consumer = %name,
                factory = %factory_name,
                instance = %entry.instance,
                "Consumer is not alive, replacing it"
            );

            // Best effort: a dead consumer failing to confirm its death must
            // not block healing
            if let Err(e) = kill_bounded(entry.consumer.as_mut(), self.kill_timeout).await {
                self.metrics.kill_failures_total.inc();
                tracing::warn!(error = %e, "Failed to kill dead consumer");
            }
            let restarts = entry.restarts + 1;
            drop(entry);

            let backoff = Backoff::new(self.recreate_backoff.clone());
            self.recreate(name, factory_name, restarts, backoff, &mut report)
                .await;
        }

        if report.dead > 0 || report.recreated > 0 {
            tracing::info!(?report, "Health scan finished");
        } else {
            tracing::debug!(checked = report.checked, "Health scan finished, all consumers alive");
        }

        self.record_sizes();
        report
    }
}

impl Message<RemoveFactory> for ManagerActor {
    type Reply = Result<bool, Infallible>;

    async fn handle(&mut self, msg: RemoveFactory, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.metrics.command_handled();

        let removed = self.factories.remove(&msg.name).is_some();
        if removed {
            tracing::info!(factory = %msg.name, "Factory removed");
        }

        self.record_sizes();
        Ok(removed)
    }
}

impl Message<ListConsumers> for ManagerActor {
    type Reply = ConsumerSnapshot;

    async fn handle(&mut self, _msg: ListConsumers, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.metrics.command_handled();

        let mut consumers: Vec<ConsumerStatus> = self
            .consumers
            .iter()
            .map(|(name, entry)| entry.status(name))
            .collect();
        consumers.sort_by(|a, b| a.name.cmp(&b.name));

        ConsumerSnapshot { consumers }
    }
}
