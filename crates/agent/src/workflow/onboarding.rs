use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use concierge_core::domain::profile::CustomerId;
use concierge_core::validation::OnboardingForm;

use super::{WorkflowEngine, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingOutcome {
    pub profile_id: CustomerId,
    pub synced_at: DateTime<Utc>,
}

impl WorkflowEngine {
    /// Stores the submitted profile, replacing any previous one, and marks
    /// onboarding complete.
    pub async fn run_onboarding(
        &self,
        form: OnboardingForm,
    ) -> Result<OnboardingOutcome, WorkflowError> {
        let mut profile = form.validate()?;
        let synced_at = Utc::now();
        profile.onboarding_completed_at = Some(synced_at);
        let profile_id = profile.id.clone();

        self.profiles.upsert(profile).await.map_err(WorkflowError::persistence)?;

        info!(
            event_name = "workflow.onboarding.synced",
            customer_id = %profile_id,
            "customer profile synced"
        );

        Ok(OnboardingOutcome { profile_id, synced_at })
    }
}
