pub mod config;
pub mod domain;
pub mod errors;
pub mod prompt;
pub mod validation;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::conversation::{
    Channel, ConversationHistory, ConversationId, ConversationTurn, Role, TurnId,
    DEFAULT_HISTORY_LIMIT,
};
pub use domain::escalation::{EscalationDecision, EscalationNotice, OriginChannel, SupportReply};
pub use domain::profile::{CustomerId, CustomerProfile, FaqEntry};
pub use errors::{ApplicationError, InterfaceError};
pub use prompt::build_system_prompt;
pub use validation::{FieldIssue, ValidationError};
