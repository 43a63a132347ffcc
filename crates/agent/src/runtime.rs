use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use concierge_core::config::AppConfig;
use concierge_db::repositories::{SqlConversationRepository, SqlProfileRepository};
use concierge_db::DbPool;

use crate::llm::{LlmClient, LlmError, OpenAiClient};
use crate::messaging::{EvolutionClient, MessagingError};
use crate::notify::{EmailNotifier, NotificationChannel, NotificationError, WhatsAppNotifier};
use crate::workflow::{WorkflowEngine, WorkflowSettings};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("messaging client setup failed: {0}")]
    Messaging(#[from] MessagingError),
    #[error("notification channel setup failed: {0}")]
    Notification(#[from] NotificationError),
}

/// Everything a transport needs: the workflow engine plus the messaging
/// client for instance administration.
pub struct AgentRuntime {
    engine: Arc<WorkflowEngine>,
    messaging: Option<Arc<EvolutionClient>>,
}

impl AgentRuntime {
    pub fn new(engine: Arc<WorkflowEngine>, messaging: Option<Arc<EvolutionClient>>) -> Self {
        Self { engine, messaging }
    }

    pub fn from_config(config: &AppConfig, pool: DbPool) -> Result<Self, RuntimeError> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let messaging = EvolutionClient::from_config(&config.messaging)?.map(Arc::new);

        let mut engine = WorkflowEngine::new(
            Arc::new(SqlProfileRepository::new(pool.clone())),
            Arc::new(SqlConversationRepository::new(pool)),
            llm,
        )
        .with_settings(WorkflowSettings::from(&config.workflow));

        if let Some(client) = &messaging {
            engine = engine.with_messenger(client.clone());
        }
        for notifier in notifiers(config, messaging.as_ref())? {
            engine = engine.with_notifier(notifier);
        }

        info!(
            event_name = "runtime.ready",
            model = %config.llm.model,
            messaging_enabled = messaging.is_some(),
            notifiers = ?engine.notifier_names(),
            "agent runtime assembled"
        );

        Ok(Self { engine: Arc::new(engine), messaging })
    }

    pub fn engine(&self) -> Arc<WorkflowEngine> {
        Arc::clone(&self.engine)
    }

    pub fn messaging(&self) -> Option<Arc<EvolutionClient>> {
        self.messaging.clone()
    }
}

fn notifiers(
    config: &AppConfig,
    messaging: Option<&Arc<EvolutionClient>>,
) -> Result<Vec<Arc<dyn NotificationChannel>>, RuntimeError> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(email) = EmailNotifier::from_config(&config.helpdesk)? {
        channels.push(Arc::new(email));
    }
    if let (Some(number), Some(client)) = (&config.helpdesk.escalation_number, messaging) {
        channels.push(Arc::new(WhatsAppNotifier::new(client.clone(), number.clone())));
    }

    Ok(channels)
}
