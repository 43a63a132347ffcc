use crate::connection::DbPool;
use crate::repositories::RepositoryError;

pub const DEMO_CUSTOMER_ID: &str = "7f1e2d3c-4b5a-4697-8877-665544332211";
pub const DEMO_COMPANY_NAME: &str = "Padaria Central";

const SEED_TURN_IDS: &[&str] = &["sim-user_seed-0001", "sim-assistant_seed-0002"];

/// Deterministic demo tenant: one onboarded profile plus a short simulator
/// exchange. Loading twice leaves the same rows in place.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(SeedResult {
            customer_id: DEMO_CUSTOMER_ID,
            company_name: DEMO_COMPANY_NAME,
            turns_seeded: SEED_TURN_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let profile_exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM customer_profiles
                           WHERE id = ?1 AND company_name = ?2
                             AND onboarding_completed_at IS NOT NULL)",
        )
        .bind(DEMO_CUSTOMER_ID)
        .bind(DEMO_COMPANY_NAME)
        .fetch_one(pool)
        .await?;
        checks.push(("demo-profile", profile_exists == 1));

        let turn_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM conversation_turns WHERE id IN {}",
            sql_array_from_ids(SEED_TURN_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("demo-turns", turn_count == SEED_TURN_IDS.len() as i64));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM conversation_turns WHERE id IN {}",
            sql_array_from_ids(SEED_TURN_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM customer_profiles WHERE id = ?")
            .bind(DEMO_CUSTOMER_ID)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub customer_id: &'static str,
    pub company_name: &'static str,
    pub turns_seeded: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::conversation::Channel;
    use concierge_core::domain::profile::CustomerId;

    use super::*;
    use crate::repositories::{
        ConversationRepository, ProfileRepository, SqlConversationRepository, SqlProfileRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[test]
    fn sql_fixture_is_valid() {
        assert!(DemoSeedDataset::SQL.contains(DEMO_CUSTOMER_ID));
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifiable() {
        let pool = migrated_pool().await;

        DemoSeedDataset::load(&pool).await.expect("first load");
        let result = DemoSeedDataset::load(&pool).await.expect("second load");
        assert_eq!(result.turns_seeded, 2);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn seeded_rows_decode_through_repositories() {
        let pool = migrated_pool().await;
        DemoSeedDataset::load(&pool).await.expect("load");

        let customer = CustomerId(DEMO_CUSTOMER_ID.to_string());
        let profile = SqlProfileRepository::new(pool.clone())
            .find_by_id(&customer)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(profile.faqs.len(), 2);
        assert!(profile.is_onboarded());

        let history = SqlConversationRepository::new(pool)
            .history(&customer, Channel::Simulation, 20)
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].content, "Are you open on Sunday?");
    }

    #[tokio::test]
    async fn clean_removes_demo_rows() {
        let pool = migrated_pool().await;
        DemoSeedDataset::load(&pool).await.expect("load");
        DemoSeedDataset::clean(&pool).await.expect("clean");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
    }
}
