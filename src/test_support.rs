use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::contracts::{Consumer, Factory};

// ============================================================================
// Scripted Factory / Consumer doubles
// ============================================================================

/// Shared state of one consumer instance, flipped by tests
pub(crate) struct InstanceState {
    pub alive: AtomicBool,
    pub runs: AtomicUsize,
    pub kills: AtomicUsize,
    pub fail_kill: AtomicBool,
    pub hang_kill: AtomicBool,
}

impl InstanceState {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            runs: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
            fail_kill: AtomicBool::new(false),
            hang_kill: AtomicBool::new(false),
        }
    }
}

pub(crate) struct MockConsumer {
    name: String,
    factory_name: String,
    state: Arc<InstanceState>,
}

#[async_trait]
impl Consumer for MockConsumer {
    fn run(&mut self) {
        self.state.runs.fetch_add(1, Ordering::SeqCst);
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        self.state.kills.fetch_add(1, Ordering::SeqCst);
        if self.state.hang_kill.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.state.fail_kill.load(Ordering::SeqCst) {
            anyhow::bail!("consumer {} refused to stop", self.name);
        }
        self.state.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn factory_name(&self) -> &str {
        &self.factory_name
    }
}

pub(crate) struct MockFactory {
    name: String,
    consumer_names: Vec<String>,
    instances: Mutex<HashMap<String, Vec<Arc<InstanceState>>>>,
    pub fail_bulk: AtomicBool,
    pub fail_single: AtomicBool,
    pub single_calls: AtomicUsize,
}

impl MockFactory {
    pub fn new(name: &str, consumers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            consumer_names: consumers.iter().map(|c| c.to_string()).collect(),
            instances: Mutex::new(HashMap::new()),
            fail_bulk: AtomicBool::new(false),
            fail_single: AtomicBool::new(false),
            single_calls: AtomicUsize::new(0),
        })
    }

    fn build(&self, name: &str) -> Box<dyn Consumer> {
        let state = Arc::new(InstanceState::new());
        self.instances
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(state.clone());

        Box::new(MockConsumer {
            name: name.to_string(),
            factory_name: self.name.clone(),
            state,
        })
    }

    /// State of the most recently created instance named `name`
    pub fn latest(&self, name: &str) -> Arc<InstanceState> {
        self.instances.lock().unwrap()[name]
            .last()
            .cloned()
            .unwrap()
    }

    /// How many instances named `name` this factory has created
    pub fn instances(&self, name: &str) -> usize {
        self.instances
            .lock()
            .unwrap()
            .get(name)
            .map_or(0, |instances| instances.len())
    }
}

#[async_trait]
impl Factory for MockFactory {
    async fn create_consumers(&self) -> anyhow::Result<Vec<Box<dyn Consumer>>> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            anyhow::bail!("factory {} cannot reach its broker", self.name);
        }
        Ok(self.consumer_names.iter().map(|name| self.build(name)).collect())
    }

    async fn create_consumer(&self, name: &str) -> anyhow::Result<Box<dyn Consumer>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_single.load(Ordering::SeqCst) {
            anyhow::bail!("factory {} cannot recreate {}", self.name, name);
        }
        if !self.consumer_names.iter().any(|c| c == name) {
            anyhow::bail!("factory {} has no consumer named {}", self.name, name);
        }
        Ok(self.build(name))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
