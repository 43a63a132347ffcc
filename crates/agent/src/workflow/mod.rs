//! Conversation workflows.
//!
//! Every variant runs the same pipeline: validate, load the profile, load
//! the bounded channel history, render the system prompt, request one
//! completion, persist the user and assistant turns together. Variants differ
//! in input shape, temperature, what the provider sees as the user message,
//! and what happens after persistence (outbound reply, escalation).

mod bridge;
mod onboarding;
mod simulation;
mod support;

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use concierge_core::config::WorkflowConfig;
use concierge_core::domain::conversation::{
    Channel, ConversationHistory, ConversationTurn, DEFAULT_HISTORY_LIMIT,
};
use concierge_core::domain::profile::{CustomerId, CustomerProfile};
use concierge_core::errors::ApplicationError;
use concierge_core::prompt::build_system_prompt;
use concierge_core::validation::ValidationError;
use concierge_db::repositories::{ConversationRepository, ProfileRepository, RepositoryError};

use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmError};
use crate::messaging::{MessageSender, MessagingError};
use crate::notify::NotificationChannel;

pub use bridge::BridgeOutcome;
pub use onboarding::OnboardingOutcome;
pub use simulation::SimulationOutcome;
pub use support::SupportOutcome;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("customer profile `{customer_id}` was not found")]
    ProfileNotFound { customer_id: CustomerId },
    #[error("completion provider failed")]
    Provider(#[source] LlmError),
    #[error("conversation persistence failed")]
    Persistence {
        #[source]
        source: RepositoryError,
        generated_response: Option<String>,
    },
    #[error("outbound message delivery failed")]
    Delivery(#[source] MessagingError),
}

impl WorkflowError {
    fn persistence(source: RepositoryError) -> Self {
        Self::Persistence { source, generated_response: None }
    }

    /// Completion text that was generated before the workflow failed, if any.
    pub fn generated_response(&self) -> Option<&str> {
        match self {
            Self::Persistence { generated_response, .. } => generated_response.as_deref(),
            _ => None,
        }
    }
}

impl From<WorkflowError> for ApplicationError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::Validation(error) => Self::Validation(error),
            WorkflowError::ProfileNotFound { customer_id } => {
                Self::NotFound(format!("customer profile {customer_id}"))
            }
            WorkflowError::Provider(error) => Self::Integration(error.to_string()),
            WorkflowError::Persistence { source, .. } => Self::Persistence(source.to_string()),
            WorkflowError::Delivery(error) => Self::Integration(error.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkflowSettings {
    pub history_limit: u32,
    pub simulation_temperature: f32,
    pub messaging_temperature: f32,
    pub support_temperature: f32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            simulation_temperature: 0.3,
            messaging_temperature: 0.4,
            support_temperature: 0.2,
        }
    }
}

impl From<&WorkflowConfig> for WorkflowSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            simulation_temperature: config.simulation_temperature,
            messaging_temperature: config.messaging_temperature,
            support_temperature: config.support_temperature,
        }
    }
}

/// Holds only shared handles; invocations never share mutable state.
pub struct WorkflowEngine {
    profiles: Arc<dyn ProfileRepository>,
    conversations: Arc<dyn ConversationRepository>,
    llm: Arc<dyn LlmClient>,
    messenger: Option<Arc<dyn MessageSender>>,
    notifiers: Vec<Arc<dyn NotificationChannel>>,
    settings: WorkflowSettings,
}

impl WorkflowEngine {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        conversations: Arc<dyn ConversationRepository>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            profiles,
            conversations,
            llm,
            messenger: None,
            notifiers: Vec::new(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn MessageSender>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationChannel>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn notifier_names(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|notifier| notifier.name()).collect()
    }

    async fn load_profile(&self, customer_id: &CustomerId) -> Result<CustomerProfile, WorkflowError> {
        self.profiles
            .find_by_id(customer_id)
            .await
            .map_err(WorkflowError::persistence)?
            .ok_or_else(|| WorkflowError::ProfileNotFound { customer_id: customer_id.clone() })
    }

    async fn load_history(
        &self,
        customer_id: &CustomerId,
        channel: Channel,
    ) -> Result<ConversationHistory, WorkflowError> {
        self.conversations
            .history(customer_id, channel, self.settings.history_limit)
            .await
            .map_err(WorkflowError::persistence)
    }

    /// Builds `[system, ...history, user]` and requests a single completion.
    async fn complete(
        &self,
        profile: &CustomerProfile,
        channel: Channel,
        history: &ConversationHistory,
        user_message: String,
        temperature: f32,
    ) -> Result<String, WorkflowError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(profile, channel)));
        messages.extend(history.turns().iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(user_message));

        self.llm
            .complete(CompletionRequest { messages, temperature })
            .await
            .map_err(WorkflowError::Provider)
    }

    async fn persist_exchange(
        &self,
        user_turn: ConversationTurn,
        assistant_turn: ConversationTurn,
    ) -> Result<(), WorkflowError> {
        let generated = assistant_turn.content.clone();
        let customer_id = user_turn.customer_id.clone();
        let channel = user_turn.channel;

        self.conversations.append_turns(&[user_turn, assistant_turn]).await.map_err(|source| {
            error!(
                event_name = "workflow.persist.failed",
                customer_id = %customer_id,
                channel = %channel,
                generated_response = %generated,
                error = %source,
                "failed to persist conversation turns"
            );
            WorkflowError::Persistence { source, generated_response: Some(generated) }
        })
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::profile::CustomerId;
    use concierge_core::errors::ApplicationError;
    use concierge_db::repositories::RepositoryError;

    use super::{WorkflowError, WorkflowSettings};
    use crate::llm::LlmError;

    #[test]
    fn default_settings_follow_channel_temperatures() {
        let settings = WorkflowSettings::default();
        assert_eq!(settings.history_limit, 20);
        assert!((settings.simulation_temperature - 0.3).abs() < f32::EPSILON);
        assert!((settings.messaging_temperature - 0.4).abs() < f32::EPSILON);
        assert!((settings.support_temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn workflow_errors_map_to_application_taxonomy() {
        let missing = ApplicationError::from(WorkflowError::ProfileNotFound {
            customer_id: CustomerId("c-9".to_string()),
        });
        assert_eq!(missing, ApplicationError::NotFound("customer profile c-9".to_string()));

        let provider = ApplicationError::from(WorkflowError::Provider(LlmError::EmptyCompletion));
        assert!(matches!(provider, ApplicationError::Integration(_)));

        let persistence = ApplicationError::from(WorkflowError::Persistence {
            source: RepositoryError::Decode("disk full".to_string()),
            generated_response: Some("hello".to_string()),
        });
        assert!(matches!(persistence, ApplicationError::Persistence(ref m) if m.contains("disk full")));
    }

    #[test]
    fn generated_response_is_exposed_only_for_persistence_failures() {
        let error = WorkflowError::Persistence {
            source: RepositoryError::Decode("locked".to_string()),
            generated_response: Some("We open at 7h.".to_string()),
        };
        assert_eq!(error.generated_response(), Some("We open at 7h."));
        assert_eq!(WorkflowError::Provider(LlmError::EmptyCompletion).generated_response(), None);
    }
}
