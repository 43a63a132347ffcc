use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// Business profile collected during onboarding. Every prompt the assistant
/// sends is rendered from this record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub company_name: String,
    pub description: Option<String>,
    pub segment: Option<String>,
    pub voice_tone: Option<String>,
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub faqs: Vec<FaqEntry>,
    pub whatsapp_number: Option<String>,
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

impl CustomerProfile {
    pub fn new(id: CustomerId, company_name: impl Into<String>) -> Self {
        Self {
            id,
            company_name: company_name.into(),
            description: None,
            segment: None,
            voice_tone: None,
            opening_hours: None,
            products: Vec::new(),
            faqs: Vec::new(),
            whatsapp_number: None,
            onboarding_completed_at: None,
        }
    }

    pub fn is_onboarded(&self) -> bool {
        self.onboarding_completed_at.is_some()
    }
}
