use chrono::Utc;
use serde::Serialize;
use tracing::info;

use concierge_core::domain::conversation::{Channel, ConversationTurn, Role};
use concierge_core::domain::profile::CustomerId;
use concierge_core::validation::SimulationRequest;

use super::{WorkflowEngine, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub response: String,
    pub customer_id: CustomerId,
    pub conversation_id: String,
}

impl WorkflowEngine {
    /// Dashboard "try your assistant" conversation.
    pub async fn run_simulation(
        &self,
        request: SimulationRequest,
    ) -> Result<SimulationOutcome, WorkflowError> {
        let input = request.validate()?;
        let channel = Channel::Simulation;
        let received_at = Utc::now();

        let profile = self.load_profile(&input.customer_id).await?;
        let history = self.load_history(&input.customer_id, channel).await?;
        let response = self
            .complete(
                &profile,
                channel,
                &history,
                input.message.clone(),
                self.settings.simulation_temperature,
            )
            .await?;

        let conversation_id = input.conversation_id.as_str().to_string();
        let user_turn = ConversationTurn::new(
            input.customer_id.clone(),
            channel,
            Role::User,
            input.message,
            received_at,
        )
        .with_metadata("conversation_id", conversation_id.clone());
        let assistant_turn = ConversationTurn::new(
            input.customer_id.clone(),
            channel,
            Role::Assistant,
            response.clone(),
            Utc::now(),
        )
        .with_metadata("conversation_id", conversation_id.clone());
        self.persist_exchange(user_turn, assistant_turn).await?;

        info!(
            event_name = "workflow.simulation.completed",
            customer_id = %input.customer_id,
            conversation_id = %conversation_id,
            history_turns = history.len(),
            "simulation turn completed"
        );

        Ok(SimulationOutcome { response, customer_id: input.customer_id, conversation_id })
    }
}
