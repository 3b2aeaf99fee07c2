use kameo::actor::WeakActorRef;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::metrics::Metrics;
use super::{ManagerActor, ScanAndHeal};

// ============================================================================
// Health Monitor - Periodic scan-and-heal trigger
// ============================================================================
//
// Runs on its own task and never touches the registries. Every tick it
// submits one ScanAndHeal command to the manager actor; if a scan is still
// queued or running the new one waits behind it in the mailbox.
//
// Holds only a weak reference, so the monitor does not keep the manager
// alive and exits once the actor is gone.
//
// ============================================================================

pub(crate) fn spawn_health_monitor(
    manager: WeakActorRef<ManagerActor>,
    interval: Duration,
    metrics: Arc<Metrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        ticker.tick().await;

        tracing::info!(?interval, "Health monitor started");

        loop {
            ticker.tick().await;

            let Some(manager) = manager.upgrade() else {
                tracing::debug!("Manager actor is gone, stopping health monitor");
                break;
            };

            metrics.command_submitted();
            if manager.tell(ScanAndHeal).send().await.is_err() {
                metrics.command_handled();
                tracing::warn!("Manager actor rejected health scan, stopping health monitor");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::test_support::MockFactory;
    use crate::{Factory, Manager};
    use std::sync::atomic::Ordering;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_ticks_replace_dead_consumer_without_manual_scan() {
        let manager = Manager::new(
            ManagerConfig::default().with_check_interval(Duration::from_millis(50)),
        )
        .unwrap();
        let factory = MockFactory::new("factory-a", &["c1"]);

        manager
            .start(vec![factory.clone() as Arc<dyn Factory>])
            .await
            .unwrap();
        factory.latest("c1").alive.store(false, Ordering::SeqCst);

        let mut replaced = false;
        for _ in 0..40 {
            sleep(Duration::from_millis(50)).await;
            if factory.instances("c1") == 2 {
                replaced = true;
                break;
            }
        }

        assert!(replaced, "health monitor never recreated c1");
        assert!(manager.metrics().health_scans_total.get() >= 1);
    }

    #[tokio::test]
    async fn test_monitor_exits_when_manager_dropped() {
        let manager = Manager::with_check_interval(Duration::from_millis(20)).unwrap();
        let metrics = Arc::clone(manager.metrics());
        drop(manager);

        sleep(Duration::from_millis(100)).await;
        let scans = metrics.health_scans_total.get();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(metrics.health_scans_total.get(), scans);
    }
}
