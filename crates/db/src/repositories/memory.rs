use std::collections::HashMap;

use tokio::sync::RwLock;

use concierge_core::domain::conversation::{Channel, ConversationHistory, ConversationTurn};
use concierge_core::domain::profile::{CustomerId, CustomerProfile};

use super::{ConversationRepository, ProfileRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, CustomerProfile>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(id.as_str()).cloned())
    }

    async fn upsert(&self, profile: CustomerProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.id.0.clone(), profile);
        Ok(())
    }
}

/// Insertion-ordered turn log.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl InMemoryConversationRepository {
    pub async fn all_turns(&self) -> Vec<ConversationTurn> {
        self.turns.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn history(
        &self,
        customer_id: &CustomerId,
        channel: Channel,
        limit: u32,
    ) -> Result<ConversationHistory, RepositoryError> {
        let turns = self.turns.read().await;
        let mut matching: Vec<(usize, &ConversationTurn)> = turns
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.customer_id == *customer_id && turn.channel == channel)
            .collect();

        matching.sort_by(|(left_idx, left), (right_idx, right)| {
            right.created_at.cmp(&left.created_at).then(right_idx.cmp(left_idx))
        });

        let newest_first =
            matching.into_iter().take(limit as usize).map(|(_, turn)| turn.clone()).collect();
        Ok(ConversationHistory::from_newest_first(newest_first))
    }

    async fn append_turns(&self, batch: &[ConversationTurn]) -> Result<(), RepositoryError> {
        let mut turns = self.turns.write().await;
        if batch.iter().any(|candidate| turns.iter().any(|stored| stored.id == candidate.id)) {
            return Err(RepositoryError::Decode("duplicate turn id".to_string()));
        }
        turns.extend_from_slice(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use concierge_core::domain::conversation::{Channel, ConversationTurn, Role};
    use concierge_core::domain::profile::{CustomerId, CustomerProfile};

    use super::{InMemoryConversationRepository, InMemoryProfileRepository};
    use crate::repositories::{ConversationRepository, ProfileRepository};

    #[tokio::test]
    async fn in_memory_profile_upsert_replaces() {
        let repo = InMemoryProfileRepository::default();
        let id = CustomerId("c-1".to_string());

        repo.upsert(CustomerProfile::new(id.clone(), "First")).await.expect("upsert");
        repo.upsert(CustomerProfile::new(id.clone(), "Second")).await.expect("upsert");

        let found = repo.find_by_id(&id).await.expect("find").expect("present");
        assert_eq!(found.company_name, "Second");
    }

    #[tokio::test]
    async fn in_memory_history_matches_sql_ordering() {
        let repo = InMemoryConversationRepository::default();
        let customer = CustomerId("c-1".to_string());
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().expect("timestamp");

        let turns: Vec<_> = (0..5)
            .map(|i| {
                ConversationTurn::new(
                    customer.clone(),
                    Channel::Simulation,
                    Role::User,
                    format!("m{i}"),
                    base + Duration::seconds(i / 2),
                )
            })
            .collect();
        repo.append_turns(&turns).await.expect("append");

        let history = repo.history(&customer, Channel::Simulation, 3).await.expect("history");
        let contents: Vec<&str> = history.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }
}
