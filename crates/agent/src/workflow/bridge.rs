use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use concierge_core::domain::conversation::{Channel, ConversationTurn, Role};
use concierge_core::domain::profile::CustomerId;
use concierge_core::validation::WebhookPayload;

use super::{WorkflowEngine, WorkflowError};
use crate::messaging::{MessagingError, OutboundMessage};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOutcome {
    pub response: String,
    pub customer_id: CustomerId,
    pub conversation_id: String,
}

impl WorkflowEngine {
    /// Answers one inbound WhatsApp message and replies through the instance.
    pub async fn run_messaging_bridge(
        &self,
        payload: WebhookPayload,
    ) -> Result<BridgeOutcome, WorkflowError> {
        let input = payload.validate()?;
        let Some(messenger) = self.messenger.clone() else {
            return Err(WorkflowError::Delivery(MessagingError::NotConfigured(
                "messaging.base_url".to_string(),
            )));
        };
        let channel = Channel::MessagingBridge;
        let customer_id = input.customer_id();
        let conversation_id = input.conversation_id().as_str().to_string();

        let profile = self.load_profile(&customer_id).await?;
        let history = self.load_history(&customer_id, channel).await?;
        let response = self
            .complete(
                &profile,
                channel,
                &history,
                input.text.clone(),
                self.settings.messaging_temperature,
            )
            .await?;

        let user_turn =
            ConversationTurn::new(customer_id.clone(), channel, Role::User, input.text, input.sent_at)
                .with_metadata("conversation_id", conversation_id.clone())
                .with_metadata("message_id", input.message_id.clone())
                .with_metadata("from", input.from.clone())
                .with_metadata("instance_id", input.instance_id.clone());
        let assistant_turn = ConversationTurn::new(
            customer_id.clone(),
            channel,
            Role::Assistant,
            response.clone(),
            Utc::now(),
        )
        .with_metadata("conversation_id", conversation_id.clone());
        self.persist_exchange(user_turn, assistant_turn).await?;

        messenger
            .send_message(OutboundMessage {
                to: input.from.clone(),
                message: response.clone(),
                reply_to_message_id: Some(input.message_id.clone()),
            })
            .await
            .map_err(|error| {
                warn!(
                    event_name = "workflow.bridge.reply_failed",
                    customer_id = %customer_id,
                    message_id = %input.message_id,
                    error = %error,
                    "reply was persisted but could not be delivered"
                );
                WorkflowError::Delivery(error)
            })?;

        info!(
            event_name = "workflow.bridge.completed",
            customer_id = %customer_id,
            conversation_id = %conversation_id,
            message_id = %input.message_id,
            "whatsapp reply delivered"
        );

        Ok(BridgeOutcome { response, customer_id, conversation_id })
    }
}
