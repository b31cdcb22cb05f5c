//! Reportflow API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use reportflow_application::{
    ApprovalService, ApprovalWorkflowRepository, PermissionEvaluator, PrincipalDirectory,
    WorkflowEventSink,
};
use reportflow_core::AppError;
use reportflow_domain::{ApprovalChain, RoleCatalog};
use reportflow_infrastructure::{
    InMemoryApprovalRepository, InMemoryPrincipalDirectory, PostgresApprovalRepository,
    TracingEventSink, WebhookEventSink,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api_config::{ApiConfig, EventSinkConfig, WorkflowStoreConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    if config.migrate_only && matches!(config.workflow_store, WorkflowStoreConfig::Memory) {
        return Err(AppError::Validation(
            "the migrate command requires WORKFLOW_STORE=postgres".to_owned(),
        ));
    }

    let repository: Arc<dyn ApprovalWorkflowRepository> = match &config.workflow_store {
        WorkflowStoreConfig::Memory => Arc::new(InMemoryApprovalRepository::new()),
        WorkflowStoreConfig::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to run migrations: {error}"))
                })?;

            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            Arc::new(PostgresApprovalRepository::new(pool))
        }
    };

    let event_sink: Arc<dyn WorkflowEventSink> = match &config.event_sink {
        EventSinkConfig::Console => Arc::new(TracingEventSink::new()),
        EventSinkConfig::Webhook { endpoint_url } => Arc::new(WebhookEventSink::new(
            reqwest::Client::new(),
            endpoint_url.clone(),
        )),
    };

    let catalog = Arc::new(RoleCatalog::builtin());
    let permission_evaluator = PermissionEvaluator::new(Arc::clone(&catalog));
    let approval_service = ApprovalService::new(
        repository,
        event_sink,
        permission_evaluator.clone(),
        Arc::clone(&catalog),
        ApprovalChain::standard(),
    );

    let directory = Arc::new(InMemoryPrincipalDirectory::new());
    if config.seed_dev_principals {
        dev_seed::run(directory.as_ref(), catalog.as_ref()).await?;
    }
    let principal_directory: Arc<dyn PrincipalDirectory> = directory;

    let app_state = AppState {
        approval_service,
        permission_evaluator,
        principal_directory,
    };

    let protected_routes = Router::new()
        .route(
            "/api/workflows",
            post(handlers::workflows::create_workflow_handler),
        )
        .route(
            "/api/workflows/{workflow_id}",
            get(handlers::workflows::get_workflow_handler),
        )
        .route(
            "/api/workflows/{workflow_id}/steps/{step_id}/approve",
            post(handlers::workflows::approve_step_handler),
        )
        .route(
            "/api/workflows/{workflow_id}/steps/{step_id}/reject",
            post(handlers::workflows::reject_step_handler),
        )
        .route(
            "/api/workflows/{workflow_id}/steps/{step_id}/skip",
            post(handlers::workflows::skip_step_handler),
        )
        .route(
            "/api/workflows/{workflow_id}/steps/{step_id}/comments",
            post(handlers::workflows::add_comment_handler),
        )
        .route(
            "/api/permissions/evaluate",
            post(handlers::permissions::evaluate_permission_handler),
        )
        .route(
            "/api/permissions/accessible-projects",
            post(handlers::permissions::accessible_projects_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_principal,
        ));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&config.frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let app = Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "reportflow-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
