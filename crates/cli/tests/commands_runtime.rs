use std::env;
use std::sync::{Mutex, OnceLock};

use concierge_cli::commands::{doctor, migrate, seed, simulate};
use serde_json::Value;

const VALID_ENV: &[(&str, &str)] =
    &[("CONCIERGE_LLM_API_KEY", "sk-test"), ("CONCIERGE_DATABASE_URL", "sqlite::memory:")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_llm_key() {
    with_env(&[("CONCIERGE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("llm.api_key"));
    });
}

#[test]
fn seed_reports_demo_profile() {
    with_env(VALID_ENV, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "demo profile Padaria Central (7f1e2d3c-4b5a-4697-8877-665544332211) loaded with 2 conversation turns"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("seed.db").display());

    with_env(
        &[
            ("CONCIERGE_LLM_API_KEY", "sk-test"),
            ("CONCIERGE_DATABASE_URL", database_url.as_str()),
        ],
        || {
            let first = seed::run();
            assert_eq!(first.exit_code, 0, "expected first seed invocation success");
            let second = seed::run();
            assert_eq!(second.exit_code, 0, "expected second seed invocation success");

            assert_eq!(
                parse_payload(&first.output)["message"],
                parse_payload(&second.output)["message"]
            );
        },
    );
}

#[test]
fn doctor_passes_with_optional_integrations_skipped() {
    with_env(VALID_ENV, || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("llm_key_readiness"), "pass");
        assert_eq!(status_of("messaging_readiness"), "skipped");
        assert_eq!(status_of("database_connectivity"), "pass");
    });
}

#[test]
fn doctor_fails_when_config_invalid() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [skip] database_connectivity"));
    });
}

#[test]
fn simulate_rejects_non_uuid_customer_before_calling_provider() {
    with_env(VALID_ENV, || {
        let result = simulate::run("bakery".to_string(), "Hello".to_string(), None);
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "input_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("customerId"));
    });
}

#[test]
fn simulate_reports_missing_profile() {
    with_env(VALID_ENV, || {
        let result = simulate::run(
            "11111111-2222-4333-8444-555555555555".to_string(),
            "Hello".to_string(),
            None,
        );
        assert_eq!(result.exit_code, 8);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "simulate");
        assert_eq!(payload["error_class"], "profile_not_found");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CONCIERGE_DATABASE_URL",
        "CONCIERGE_DATABASE_MAX_CONNECTIONS",
        "CONCIERGE_DATABASE_TIMEOUT_SECS",
        "CONCIERGE_LLM_API_KEY",
        "OPENAI_API_KEY",
        "CONCIERGE_LLM_BASE_URL",
        "CONCIERGE_LLM_MODEL",
        "CONCIERGE_LLM_TIMEOUT_SECS",
        "CONCIERGE_LLM_MAX_TOKENS",
        "CONCIERGE_MESSAGING_BASE_URL",
        "CONCIERGE_MESSAGING_API_TOKEN",
        "CONCIERGE_MESSAGING_INSTANCE",
        "CONCIERGE_HELPDESK_EMAIL_FROM",
        "CONCIERGE_HELPDESK_EMAIL_TO",
        "CONCIERGE_HELPDESK_SMTP_URL",
        "CONCIERGE_HELPDESK_ESCALATION_NUMBER",
        "CONCIERGE_WORKFLOW_HISTORY_LIMIT",
        "CONCIERGE_SERVER_BIND_ADDRESS",
        "CONCIERGE_SERVER_PORT",
        "CONCIERGE_LOG_LEVEL",
        "CONCIERGE_LOG_FORMAT",
        "PORT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
