//! Adapters for persistence, identity lookup and event delivery.

#![forbid(unsafe_code)]

mod in_memory_approval_repository;
mod in_memory_principal_directory;
mod postgres_approval_repository;
mod tracing_event_sink;
mod webhook_event_sink;

pub use in_memory_approval_repository::InMemoryApprovalRepository;
pub use in_memory_principal_directory::InMemoryPrincipalDirectory;
pub use postgres_approval_repository::PostgresApprovalRepository;
pub use tracing_event_sink::TracingEventSink;
pub use webhook_event_sink::WebhookEventSink;
