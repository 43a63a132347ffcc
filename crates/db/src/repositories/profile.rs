use chrono::{DateTime, Utc};
use sqlx::Row;

use concierge_core::domain::conversation::format_timestamp;
use concierge_core::domain::profile::{CustomerId, CustomerProfile, FaqEntry};

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<CustomerProfile, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let products_json: String = decode(row.try_get("products_json"))?;
    let faqs_json: String = decode(row.try_get("faqs_json"))?;
    let completed_at: Option<String> = decode(row.try_get("onboarding_completed_at"))?;

    let products: Vec<String> = serde_json::from_str(&products_json)
        .map_err(|e| RepositoryError::Decode(format!("products for {id}: {e}")))?;
    let faqs: Vec<FaqEntry> = serde_json::from_str(&faqs_json)
        .map_err(|e| RepositoryError::Decode(format!("faqs for {id}: {e}")))?;

    Ok(CustomerProfile {
        id: CustomerId(id),
        company_name: decode(row.try_get("company_name"))?,
        description: decode(row.try_get("description"))?,
        segment: decode(row.try_get("segment"))?,
        voice_tone: decode(row.try_get("voice_tone"))?,
        opening_hours: decode(row.try_get("opening_hours"))?,
        products,
        faqs,
        whatsapp_number: decode(row.try_get("whatsapp_number"))?,
        onboarding_completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company_name, description, segment, voice_tone, opening_hours,
                    products_json, faqs_json, whatsapp_number, onboarding_completed_at
             FROM customer_profiles WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, profile: CustomerProfile) -> Result<(), RepositoryError> {
        let products_json = serde_json::to_string(&profile.products)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let faqs_json = serde_json::to_string(&profile.faqs)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let completed_at = profile.onboarding_completed_at.as_ref().map(format_timestamp);
        let now = format_timestamp(&Utc::now());

        sqlx::query(
            "INSERT INTO customer_profiles (id, company_name, description, segment, voice_tone,
                                            opening_hours, products_json, faqs_json,
                                            whatsapp_number, onboarding_completed_at,
                                            created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 company_name = excluded.company_name,
                 description = excluded.description,
                 segment = excluded.segment,
                 voice_tone = excluded.voice_tone,
                 opening_hours = excluded.opening_hours,
                 products_json = excluded.products_json,
                 faqs_json = excluded.faqs_json,
                 whatsapp_number = excluded.whatsapp_number,
                 onboarding_completed_at = excluded.onboarding_completed_at,
                 updated_at = excluded.updated_at
             WHERE company_name IS NOT excluded.company_name
                OR description IS NOT excluded.description
                OR segment IS NOT excluded.segment
                OR voice_tone IS NOT excluded.voice_tone
                OR opening_hours IS NOT excluded.opening_hours
                OR products_json IS NOT excluded.products_json
                OR faqs_json IS NOT excluded.faqs_json
                OR whatsapp_number IS NOT excluded.whatsapp_number
                OR onboarding_completed_at IS NOT excluded.onboarding_completed_at",
        )
        .bind(profile.id.as_str())
        .bind(&profile.company_name)
        .bind(&profile.description)
        .bind(&profile.segment)
        .bind(&profile.voice_tone)
        .bind(&profile.opening_hours)
        .bind(&products_json)
        .bind(&faqs_json)
        .bind(&profile.whatsapp_number)
        .bind(&completed_at)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
