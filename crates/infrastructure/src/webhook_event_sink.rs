use async_trait::async_trait;
use reportflow_application::{WorkflowEvent, WorkflowEventSink};
use reportflow_core::{AppError, AppResult};

/// HTTP event sink delivering workflow events to a webhook endpoint.
///
/// Delivery is best-effort; the caller treats failures as fire-and-forget.
pub struct WebhookEventSink {
    http_client: reqwest::Client,
    endpoint_url: String,
}

impl WebhookEventSink {
    /// Creates a sink posting to the given endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint_url: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint_url: endpoint_url.into(),
        }
    }
}

fn event_type(event: &WorkflowEvent) -> &'static str {
    match event {
        WorkflowEvent::WorkflowCreated { .. } => "workflow_created",
        WorkflowEvent::StepApproved { .. } => "step_approved",
        WorkflowEvent::StepRejected { .. } => "step_rejected",
        WorkflowEvent::StepSkipped { .. } => "step_skipped",
        WorkflowEvent::CommentAdded { .. } => "comment_added",
        WorkflowEvent::WorkflowFinalized { .. } => "workflow_finalized",
    }
}

#[async_trait]
impl WorkflowEventSink for WebhookEventSink {
    async fn publish(&self, event: WorkflowEvent) -> AppResult<()> {
        let response = self
            .http_client
            .post(self.endpoint_url.as_str())
            .header("X-Reportflow-Event", event_type(&event))
            .json(&event)
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to deliver workflow event: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "webhook endpoint answered {} for {} event",
                response.status(),
                event_type(&event)
            )));
        }

        Ok(())
    }
}
