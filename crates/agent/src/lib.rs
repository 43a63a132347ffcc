//! Conversation runtime: completion provider, messaging bridge, escalation
//! notifications and the workflow engine that ties them to the stores.

pub mod llm;
pub mod messaging;
pub mod notify;
pub mod runtime;
pub mod workflow;

pub use llm::{ChatMessage, CompletionRequest, LlmClient, LlmError, OpenAiClient};
pub use messaging::{
    collect_statuses, translate_status, ConnectionState, EvolutionClient, InstanceStatusRecord,
    InstanceApi, MessageSender, MessagingError, OutboundMessage,
};
pub use notify::{
    dispatch_all, ChannelOutcome, DispatchReport, EmailNotifier, NotificationChannel,
    NotificationError, WhatsAppNotifier,
};
pub use runtime::{AgentRuntime, RuntimeError};
pub use workflow::{
    BridgeOutcome, OnboardingOutcome, SimulationOutcome, SupportOutcome, WorkflowEngine,
    WorkflowError, WorkflowSettings,
};
