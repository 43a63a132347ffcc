use chrono::Utc;
use serde::Serialize;
use tracing::info;

use concierge_core::domain::conversation::{Channel, ConversationId, ConversationTurn, Role};
use concierge_core::domain::escalation::{EscalationNotice, SupportReply, UNKNOWN_REQUESTER};
use concierge_core::validation::{SupportInput, SupportRequest};

use super::{WorkflowEngine, WorkflowError};
use crate::notify::{dispatch_all, DispatchReport};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportOutcome {
    pub response: String,
    pub escalated_to_human: bool,
    pub notifications: DispatchReport,
}

/// What the provider sees: the raw message plus where it came from.
fn provider_message(input: &SupportInput) -> String {
    format!(
        "Channel: {}. Requester: {}. Message: {}",
        input.origin,
        input.requester.as_deref().unwrap_or(UNKNOWN_REQUESTER),
        input.message
    )
}

impl WorkflowEngine {
    /// Answers a helpdesk request and escalates to humans when the model asks.
    pub async fn run_support(
        &self,
        request: SupportRequest,
    ) -> Result<SupportOutcome, WorkflowError> {
        let input = request.validate()?;
        let channel = Channel::Support;
        let received_at = Utc::now();

        let profile = self.load_profile(&input.customer_id).await?;
        let history = self.load_history(&input.customer_id, channel).await?;
        let completion = self
            .complete(
                &profile,
                channel,
                &history,
                provider_message(&input),
                self.settings.support_temperature,
            )
            .await?;

        let reply = SupportReply::parse(&completion);
        if !reply.is_structured() {
            info!(
                event_name = "workflow.support.unstructured_reply",
                customer_id = %input.customer_id,
                "support reply was not structured; treating as plain text"
            );
        }
        let decision = reply.into_decision();

        let conversation_id = ConversationId::generate().as_str().to_string();
        let user_turn = ConversationTurn::new(
            input.customer_id.clone(),
            channel,
            Role::User,
            input.message.clone(),
            received_at,
        )
        .with_metadata("conversation_id", conversation_id.clone())
        .with_metadata("channel", input.origin.as_str())
        .with_metadata(
            "requester",
            input.requester.clone().unwrap_or_else(|| UNKNOWN_REQUESTER.to_string()),
        );
        let assistant_turn = ConversationTurn::new(
            input.customer_id.clone(),
            channel,
            Role::Assistant,
            decision.response.clone(),
            Utc::now(),
        )
        .with_metadata("conversation_id", conversation_id)
        .with_metadata("escalate", decision.escalate);
        self.persist_exchange(user_turn, assistant_turn).await?;

        let notifications = if decision.escalate {
            let notice = EscalationNotice::compose(
                &profile,
                input.origin,
                input.requester.as_deref(),
                &input.message,
                &decision.response,
            );
            let report = dispatch_all(&self.notifiers, &notice).await;
            info!(
                event_name = "workflow.support.escalated",
                customer_id = %input.customer_id,
                channels = self.notifiers.len(),
                delivered = report.delivered(),
                "support request escalated to human operators"
            );
            report
        } else {
            DispatchReport::default()
        };

        Ok(SupportOutcome {
            response: decision.response,
            escalated_to_human: decision.escalate,
            notifications,
        })
    }
}
