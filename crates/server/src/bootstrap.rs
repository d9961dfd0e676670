use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::{info, warn};

use folio_agent::contact::ContactSink;
use folio_agent::documents::{source_from_config, DocumentCache, DocumentError};
use folio_agent::gemini::GeminiClient;
use folio_agent::llm::GenerationError;
use folio_agent::runtime::ChatRuntime;
use folio_core::config::{AppConfig, ConfigError, LoadOptions};
use folio_core::notification::{NotificationRenderer, RenderError};
use folio_core::prompt::{PromptAssembler, PromptError};
use folio_db::repositories::SqlNotificationRepository;
use folio_db::{connect_with_settings, migrations, DbPool};

use crate::{chat, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<ChatRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("document source setup failed: {0}")]
    Documents(#[from] DocumentError),
    #[error("generation client setup failed: {0}")]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Notification(#[from] RenderError),
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(chat::router(self.runtime.clone()))
            .merge(health::router(self.db_pool.clone(), self.runtime.clone()))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let source = source_from_config(&config.documents)?;
    let documents = Arc::new(DocumentCache::from_config(source, &config.documents));
    let prompt = PromptAssembler::new(config.contact.owner_name.clone(), config.prompt.timestamp)?;
    let generation = Arc::new(GeminiClient::from_config(&config.generation)?);
    let contact = ContactSink::new(
        NotificationRenderer::new(config.contact.recipient.clone())?,
        Arc::new(SqlNotificationRepository::new(db_pool.clone())),
    );

    if !config.generation.has_credential() {
        warn!(
            event_name = "system.bootstrap.generation_unconfigured",
            correlation_id = "bootstrap",
            "generation API key is not configured; chat requests will fail until it is set"
        );
    }

    let runtime = ChatRuntime::new(documents, prompt, generation, contact)
        .with_max_message_chars(config.chat.max_message_chars);

    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        model = %config.generation.model,
        document_source = ?config.documents.source,
        document_location = %config.documents.location,
        "chat runtime initialized"
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime) })
}
