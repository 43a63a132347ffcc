use chrono::{DateTime, Utc};
use sqlx::Row;

use concierge_core::domain::conversation::{
    format_timestamp, Channel, ConversationHistory, ConversationTurn, Role, TurnId, TurnMetadata,
};
use concierge_core::domain::profile::CustomerId;

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let channel_str: String =
        row.try_get("channel").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_json: String =
        row.try_get("metadata_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let channel = Channel::parse(&channel_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown channel `{channel_str}`")))?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("turn {id} created_at: {e}")))?;
    let metadata: TurnMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| RepositoryError::Decode(format!("turn {id} metadata: {e}")))?;

    Ok(ConversationTurn {
        id: TurnId(id),
        customer_id: CustomerId(customer_id),
        channel,
        role,
        content,
        created_at,
        metadata,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn history(
        &self,
        customer_id: &CustomerId,
        channel: Channel,
        limit: u32,
    ) -> Result<ConversationHistory, RepositoryError> {
        if limit == 0 {
            return Ok(ConversationHistory::default());
        }

        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, customer_id, channel, role, content, created_at, metadata_json
             FROM conversation_turns
             WHERE customer_id = ? AND channel = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(customer_id.as_str())
        .bind(channel.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let newest_first = rows.iter().map(row_to_turn).collect::<Result<Vec<_>, _>>()?;
        Ok(ConversationHistory::from_newest_first(newest_first))
    }

    async fn append_turns(&self, turns: &[ConversationTurn]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for turn in turns {
            let metadata_json = serde_json::to_string(&turn.metadata)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;

            sqlx::query(
                "INSERT INTO conversation_turns
                     (id, customer_id, channel, role, content, created_at, metadata_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&turn.id.0)
            .bind(turn.customer_id.as_str())
            .bind(turn.channel.as_str())
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(format_timestamp(&turn.created_at))
            .bind(&metadata_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use concierge_core::domain::conversation::{Channel, ConversationTurn, Role};
    use concierge_core::domain::profile::CustomerId;

    use super::SqlConversationRepository;
    use crate::repositories::ConversationRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlConversationRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlConversationRepository::new(pool)
    }

    fn customer() -> CustomerId {
        CustomerId("c-1".to_string())
    }

    fn turn(channel: Channel, role: Role, content: &str, offset_secs: i64) -> ConversationTurn {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().expect("timestamp");
        ConversationTurn::new(customer(), channel, role, content, base + Duration::seconds(offset_secs))
    }

    fn contents(turns: &[ConversationTurn]) -> Vec<&str> {
        turns.iter().map(|turn| turn.content.as_str()).collect()
    }

    #[tokio::test]
    async fn history_returns_most_recent_window_oldest_first() {
        let repo = setup().await;
        let turns: Vec<_> = (0..25)
            .map(|i| turn(Channel::Simulation, Role::User, &format!("m{i}"), i))
            .collect();
        repo.append_turns(&turns).await.expect("append");

        let history = repo.history(&customer(), Channel::Simulation, 20).await.expect("history");

        assert_eq!(history.len(), 20);
        assert_eq!(history.turns()[0].content, "m5");
        assert_eq!(history.turns()[19].content, "m24");
    }

    #[tokio::test]
    async fn history_is_scoped_to_channel() {
        let repo = setup().await;
        repo.append_turns(&[
            turn(Channel::Simulation, Role::User, "sim", 0),
            turn(Channel::MessagingBridge, Role::User, "wa", 1),
            turn(Channel::Support, Role::User, "help", 2),
        ])
        .await
        .expect("append");

        let history =
            repo.history(&customer(), Channel::MessagingBridge, 20).await.expect("history");
        assert_eq!(contents(history.turns()), vec!["wa"]);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let repo = setup().await;
        repo.append_turns(&[
            turn(Channel::Simulation, Role::User, "question", 0),
            turn(Channel::Simulation, Role::Assistant, "answer", 0),
        ])
        .await
        .expect("append");

        let history = repo.history(&customer(), Channel::Simulation, 20).await.expect("history");
        assert_eq!(contents(history.turns()), vec!["question", "answer"]);
    }

    #[tokio::test]
    async fn metadata_survives_round_trip() {
        let repo = setup().await;
        let stored = turn(Channel::Support, Role::Assistant, "ok", 0)
            .with_metadata("escalate", true)
            .with_metadata("conversation_id", "conv-1");
        repo.append_turns(std::slice::from_ref(&stored)).await.expect("append");

        let history = repo.history(&customer(), Channel::Support, 5).await.expect("history");
        assert_eq!(history.turns(), &[stored]);
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_turns() {
        let repo = setup().await;
        let first = turn(Channel::Simulation, Role::User, "first", 0);
        let duplicate = first.clone();

        let result = repo.append_turns(&[first, duplicate]).await;
        assert!(result.is_err());

        let history = repo.history(&customer(), Channel::Simulation, 20).await.expect("history");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_returns_empty_history() {
        let repo = setup().await;
        repo.append_turns(&[turn(Channel::Simulation, Role::User, "x", 0)]).await.expect("append");

        let history = repo.history(&customer(), Channel::Simulation, 0).await.expect("history");
        assert!(history.is_empty());
    }
}
