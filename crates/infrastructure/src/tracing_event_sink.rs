//! Console event sink for development. Logs workflow events to tracing output.

use async_trait::async_trait;
use reportflow_application::{WorkflowEvent, WorkflowEventSink};
use reportflow_core::AppResult;
use tracing::info;

/// Development event sink that logs workflow events to the console.
#[derive(Clone)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Creates a new console event sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowEventSink for TracingEventSink {
    async fn publish(&self, event: WorkflowEvent) -> AppResult<()> {
        info!(event = ?event, "workflow event");
        Ok(())
    }
}
