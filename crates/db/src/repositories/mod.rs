use async_trait::async_trait;
use thiserror::Error;

use concierge_core::domain::conversation::{Channel, ConversationHistory, ConversationTurn};
use concierge_core::domain::profile::{CustomerId, CustomerProfile};

pub mod conversation;
pub mod memory;
pub mod profile;

pub use conversation::SqlConversationRepository;
pub use memory::{InMemoryConversationRepository, InMemoryProfileRepository};
pub use profile::SqlProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError>;

    /// Inserts or fully replaces the profile with the same id.
    async fn upsert(&self, profile: CustomerProfile) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Returns at most `limit` of the most recent turns for the pair, ordered
    /// oldest-first.
    async fn history(
        &self,
        customer_id: &CustomerId,
        channel: Channel,
        limit: u32,
    ) -> Result<ConversationHistory, RepositoryError>;

    /// Appends every turn or none of them.
    async fn append_turns(&self, turns: &[ConversationTurn]) -> Result<(), RepositoryError>;
}
