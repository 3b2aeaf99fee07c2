use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for the supervisor
// ============================================================================
//
// Each Manager owns its own registry so that several managers in one process
// never share counters. Covers:
// - Registry sizes (factories, consumers)
// - Command queue depth (submitted but not yet handled)
// - Health scans, recreations, recreation failures, kill failures
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Registry Metrics
    pub consumers_registered: IntGauge,
    pub factories_registered: IntGauge,

    // Command Queue Metrics
    pub command_queue_depth: IntGauge,

    // Health Metrics
    pub health_scans_total: IntCounter,
    pub consumers_recreated: IntCounterVec,
    pub recreation_failures: IntCounterVec,
    pub kill_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let consumers_registered = IntGauge::new(
            "supervisor_consumers_registered",
            "Consumers currently held in the registry",
        )?;
        registry.register(Box::new(consumers_registered.clone()))?;

        let factories_registered = IntGauge::new(
            "supervisor_factories_registered",
            "Factories currently held in the registry",
        )?;
        registry.register(Box::new(factories_registered.clone()))?;

        let command_queue_depth = IntGauge::new(
            "supervisor_command_queue_depth",
            "Commands submitted to the manager and not yet handled",
        )?;
        registry.register(Box::new(command_queue_depth.clone()))?;

        let health_scans_total = IntCounter::new(
            "supervisor_health_scans_total",
            "Scan-and-heal passes executed",
        )?;
        registry.register(Box::new(health_scans_total.clone()))?;

        let consumers_recreated = IntCounterVec::new(
            Opts::new(
                "supervisor_consumers_recreated_total",
                "Dead consumers replaced with a fresh instance",
            ),
            &["factory"],
        )?;
        registry.register(Box::new(consumers_recreated.clone()))?;

        let recreation_failures = IntCounterVec::new(
            Opts::new(
                "supervisor_recreation_failures_total",
                "Failed attempts to recreate a dead consumer",
            ),
            &["factory"],
        )?;
        registry.register(Box::new(recreation_failures.clone()))?;

        let kill_failures_total = IntCounter::new(
            "supervisor_kill_failures_total",
            "Kill calls that failed or timed out",
        )?;
        registry.register(Box::new(kill_failures_total.clone()))?;

        Ok(Self {
            registry,
            consumers_registered,
            factories_registered,
            command_queue_depth,
            health_scans_total,
            consumers_recreated,
            recreation_failures,
            kill_failures_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn record_registry_sizes(&self, factories: usize, consumers: usize) {
        self.factories_registered.set(factories as i64);
        self.consumers_registered.set(consumers as i64);
    }

    pub fn command_submitted(&self) {
        self.command_queue_depth.inc();
    }

    pub fn command_handled(&self) {
        self.command_queue_depth.dec();
    }

    pub fn record_recreation(&self, factory: &str, success: bool) {
        if success {
            self.consumers_recreated.with_label_values(&[factory]).inc();
        } else {
            self.recreation_failures.with_label_values(&[factory]).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_separate_instances_do_not_share_state() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_registry_sizes(2, 3);

        assert_eq!(first.consumers_registered.get(), 3);
        assert_eq!(second.consumers_registered.get(), 0);
    }

    #[test]
    fn test_record_recreation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_recreation("factory-a", true);
        metrics.record_recreation("factory-a", false);
        metrics.record_recreation("factory-b", false);

        let gathered = metrics.registry.gather();
        let recreated = gathered
            .iter()
            .find(|m| m.name() == "supervisor_consumers_recreated_total")
            .unwrap();
        assert_eq!(recreated.metric[0].counter.value, Some(1.0));

        let failures = gathered
            .iter()
            .find(|m| m.name() == "supervisor_recreation_failures_total")
            .unwrap();
        assert_eq!(failures.metric.len(), 2); // One series per factory
    }

    #[test]
    fn test_queue_depth_tracks_submissions() {
        let metrics = Metrics::new().unwrap();
        metrics.command_submitted();
        metrics.command_submitted();
        metrics.command_handled();

        assert_eq!(metrics.command_queue_depth.get(), 1);
    }

    #[test]
    fn test_encode_text() {
        let metrics = Metrics::new().unwrap();
        metrics.health_scans_total.inc();

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("supervisor_health_scans_total 1"));
    }
}
