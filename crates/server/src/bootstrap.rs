use std::sync::Arc;

use hourbot_chat::gateway::GatewayRunner;
use hourbot_chat::transport::{ChatClient, GatewayTransport, NoopChatClient, NoopGatewayTransport};
use hourbot_core::config::{AppConfig, ConfigError};
use hourbot_core::pending::PendingReplies;
use hourbot_db::{
    connect_with_settings, migrations, DbPool, SqlHoursRepository, SqlRosterRepository,
};
use hourbot_workflow::{WorkflowRuntime, WorkflowSettings};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: WorkflowRuntime,
    pub gateway: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Chat platform adapters handed to the gateway.
pub struct ChatAdapters {
    pub transport: Arc<dyn GatewayTransport>,
    pub client: Arc<dyn ChatClient>,
}

impl Default for ChatAdapters {
    fn default() -> Self {
        Self { transport: Arc::new(NoopGatewayTransport), client: Arc::new(NoopChatClient) }
    }
}

pub async fn bootstrap(
    config: AppConfig,
    adapters: ChatAdapters,
) -> Result<Application, BootstrapError> {
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

    let pending = Arc::new(PendingReplies::with_ttl(config.collection.pending_ttl()));
    let runtime = WorkflowRuntime::new(
        Arc::new(SqlRosterRepository::new(db_pool.clone())),
        Arc::new(SqlHoursRepository::new(db_pool.clone())),
        adapters.client.clone(),
        pending,
        WorkflowSettings::from_config(&config.collection),
    );
    let gateway = GatewayRunner::new(
        adapters.transport,
        adapters.client,
        runtime.dispatcher(&config.chat.command_prefix),
    );
    info!(
        event_name = "system.bootstrap.workflow_ready",
        correlation_id = "bootstrap",
        command_prefix = %config.chat.command_prefix,
        max_concurrency = config.collection.max_concurrency,
        pending_ttl_secs = config.collection.pending_ttl_secs,
        "broadcast-collect workflow wired"
    );

    Ok(Application { config, db_pool, runtime, gateway })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hourbot_chat::events::{ChatEnvelope, ChatEvent, MessageEvent};
    use hourbot_chat::transport::{RecordingChatClient, ScriptedGatewayTransport};
    use hourbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use hourbot_core::domain::conversation::{ConversationId, ConversationKind};
    use hourbot_core::domain::user::UserId;

    use crate::bootstrap::{bootstrap, BootstrapError, ChatAdapters};

    #[test]
    fn bootstrap_fails_fast_without_bot_token() {
        let result = load_config(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                bot_token: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("chat.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_exposes_roster_tables() {
        let config = load_config(valid_options("sqlite::memory:?cache=shared")).expect("config");
        let app = bootstrap(config, ChatAdapters::default())
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('registered_user', 'hours')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected roster tables after bootstrap");
        assert_eq!(table_count, 2);
        assert_eq!(app.config.chat.command_prefix, "!gobot");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn wired_gateway_answers_commands_through_the_injected_client() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        let client = Arc::new(RecordingChatClient::new());
        let transport = Arc::new(ScriptedGatewayTransport::new(vec![ChatEnvelope {
            envelope_id: "env-1".to_string(),
            event: ChatEvent::Message(MessageEvent {
                conversation_id: ConversationId::new("C-general"),
                kind: ConversationKind::Group,
                author_id: UserId::new("UA"),
                from_self: false,
                text: "!gobot add".to_string(),
            }),
        }]));

        let app = bootstrap(config, ChatAdapters { transport, client: client.clone() })
            .await
            .expect("bootstrap");
        app.gateway.start().await.expect("gateway session");

        assert_eq!(
            client.sent_to(&ConversationId::new("C-general")),
            vec!["Added <@UA> to the hours roster"]
        );
        app.db_pool.close().await;
    }

    fn load_config(options: LoadOptions) -> Result<AppConfig, BootstrapError> {
        Ok(AppConfig::load(options)?)
    }

    fn valid_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                bot_token: Some("test-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
