use async_trait::async_trait;

// ============================================================================
// Factory / Consumer Contracts
// ============================================================================
//
// Implemented outside this crate (transport bindings, test doubles). The
// supervisor only drives them; it never looks at payloads or connections.
//
// ============================================================================

/// Named producer of consumers.
#[async_trait]
pub trait Factory: Send + Sync {
    /// Create every consumer this factory is configured for.
    async fn create_consumers(&self) -> anyhow::Result<Vec<Box<dyn Consumer>>>;

    /// Create a single consumer by name.
    async fn create_consumer(&self, name: &str) -> anyhow::Result<Box<dyn Consumer>>;

    fn name(&self) -> &str;
}

/// Long-running worker owned by the supervisor.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Begin background processing. Must not block.
    fn run(&mut self);

    /// Ask the consumer to stop its internal work.
    async fn kill(&mut self) -> anyhow::Result<()>;

    /// Must answer promptly.
    fn alive(&self) -> bool;

    fn name(&self) -> &str;

    /// Name of the factory that produced this consumer.
    fn factory_name(&self) -> &str;
}
