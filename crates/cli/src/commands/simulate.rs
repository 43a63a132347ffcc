use concierge_agent::runtime::AgentRuntime;
use concierge_agent::workflow::WorkflowError;
use concierge_core::validation::SimulationRequest;
use uuid::Uuid;

use crate::commands::{migrated_pool, prepare, CommandResult, Failure};

/// Runs one simulator turn against the configured database and provider.
pub fn run(customer: String, message: String, conversation: Option<String>) -> CommandResult {
    let (config, runtime) = match prepare("simulate") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let request = SimulationRequest {
        customer_id: Some(customer),
        message: Some(message),
        conversation_id: Some(conversation.unwrap_or_else(|| Uuid::new_v4().to_string())),
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let agent = AgentRuntime::from_config(&config, pool.clone())
            .map_err(|error| ("runtime_init", error.to_string(), 3u8))?;

        let outcome = agent.engine().run_simulation(request).await.map_err(classify);
        pool.close().await;
        outcome
    });

    match result {
        Ok(outcome) => CommandResult::success_with_data(
            "simulate",
            outcome.response.clone(),
            serde_json::to_value(&outcome).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("simulate", error_class, message, exit_code)
        }
    }
}

fn classify(error: WorkflowError) -> Failure {
    let error_class = match &error {
        WorkflowError::Validation(_) => "input_validation",
        WorkflowError::ProfileNotFound { .. } => "profile_not_found",
        WorkflowError::Provider(_) => "llm_provider",
        WorkflowError::Persistence { .. } => "persistence",
        WorkflowError::Delivery(_) => "delivery",
    };
    let exit_code = match error_class {
        "input_validation" => 7,
        "profile_not_found" => 8,
        _ => 9,
    };
    let mut message = error.to_string();
    if let Some(source) = std::error::Error::source(&error) {
        message = format!("{message}: {source}");
    }
    if let Some(generated) = error.generated_response() {
        message = format!("{message}; generated response: {generated}");
    }
    (error_class, message, exit_code)
}
