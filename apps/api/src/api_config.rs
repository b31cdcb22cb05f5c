use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use reportflow_core::AppError;
use tracing_subscriber::EnvFilter;

/// Backing store for approval workflow aggregates.
#[derive(Debug, Clone)]
pub enum WorkflowStoreConfig {
    /// Volatile in-process store for development and tests.
    Memory,
    /// PostgreSQL store.
    Postgres {
        /// Connection string passed to the pool.
        database_url: String,
    },
}

/// Destination for workflow transition events.
#[derive(Debug, Clone)]
pub enum EventSinkConfig {
    /// Log events to the console.
    Console,
    /// POST events to an external webhook endpoint.
    Webhook {
        /// Endpoint URL events are delivered to.
        endpoint_url: String,
    },
}

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub workflow_store: WorkflowStoreConfig,
    pub event_sink: EventSinkConfig,
    pub seed_dev_principals: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let workflow_store = match env::var("WORKFLOW_STORE")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "memory" => WorkflowStoreConfig::Memory,
            "postgres" => WorkflowStoreConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "WORKFLOW_STORE must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        let event_sink = match env::var("EVENT_SINK")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => EventSinkConfig::Console,
            "webhook" => EventSinkConfig::Webhook {
                endpoint_url: required_non_empty_env("EVENT_WEBHOOK_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "EVENT_SINK must be either 'console' or 'webhook', got '{other}'"
                )));
            }
        };

        let seed_dev_principals = env::var("DEV_SEED_PRINCIPALS")
            .unwrap_or_else(|_| "true".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            migrate_only,
            frontend_url,
            api_host,
            api_port,
            workflow_store,
            event_sink,
            seed_dev_principals,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value =
        env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
