use concierge_core::config::{AppConfig, LoadOptions};
use concierge_db::connect_with_settings;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_key(&config));
            checks.push(check_messaging(&config));
            checks.push(check_notifications(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in
                ["llm_key_readiness", "messaging_readiness", "escalation_channels", "database_connectivity"]
            {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    // Optional integrations report `skipped`; only failures fail the run.
    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_key(config: &AppConfig) -> DoctorCheck {
    let present =
        config.llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty());
    if present {
        DoctorCheck {
            name: "llm_key_readiness",
            status: CheckStatus::Pass,
            details: format!("api key present for model `{}`", config.llm.model),
        }
    } else {
        DoctorCheck {
            name: "llm_key_readiness",
            status: CheckStatus::Fail,
            details: "llm.api_key is not set".to_string(),
        }
    }
}

fn check_messaging(config: &AppConfig) -> DoctorCheck {
    if !config.messaging.is_enabled() {
        return DoctorCheck {
            name: "messaging_readiness",
            status: CheckStatus::Skipped,
            details: "messaging base url or api token not configured".to_string(),
        };
    }
    let instance = config.messaging.instance.as_deref().unwrap_or("none");
    DoctorCheck {
        name: "messaging_readiness",
        status: CheckStatus::Pass,
        details: format!("messaging configured with default instance `{instance}`"),
    }
}

fn check_notifications(config: &AppConfig) -> DoctorCheck {
    let mut channels = Vec::new();
    if config.helpdesk.email_enabled() {
        channels.push("email");
    }
    if config.helpdesk.whatsapp_enabled() && config.messaging.is_enabled() {
        channels.push("whatsapp");
    }

    if channels.is_empty() {
        DoctorCheck {
            name: "escalation_channels",
            status: CheckStatus::Skipped,
            details: "no escalation channel configured; escalations are logged only".to_string(),
        }
    } else {
        DoctorCheck {
            name: "escalation_channels",
            status: CheckStatus::Pass,
            details: format!("escalations notify: {}", channels.join(", ")),
        }
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
