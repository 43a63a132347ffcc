use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::DEFAULT_HISTORY_LIMIT;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub messaging: MessagingConfig,
    pub helpdesk: HelpdeskConfig,
    pub workflow: WorkflowConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Evolution-style WhatsApp instance API. Absent `base_url` disables the
/// outbound bridge.
#[derive(Clone, Debug)]
pub struct MessagingConfig {
    pub base_url: Option<String>,
    pub api_token: Option<SecretString>,
    pub instance: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct HelpdeskConfig {
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub smtp_url: Option<SecretString>,
    pub escalation_number: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub history_limit: u32,
    pub simulation_temperature: f32,
    pub messaging_temperature: f32,
    pub support_temperature: f32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub messaging_base_url: Option<String>,
    pub messaging_api_token: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://concierge.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                max_tokens: 512,
                timeout_secs: 60,
            },
            messaging: MessagingConfig {
                base_url: None,
                api_token: None,
                instance: None,
                timeout_secs: 15,
            },
            helpdesk: HelpdeskConfig {
                email_from: None,
                email_to: None,
                smtp_url: None,
                escalation_number: None,
            },
            workflow: WorkflowConfig {
                history_limit: DEFAULT_HISTORY_LIMIT,
                simulation_temperature: 0.3,
                messaging_temperature: 0.4,
                support_temperature: 0.2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl MessagingConfig {
    pub fn is_enabled(&self) -> bool {
        self.base_url.as_deref().map(|url| !url.trim().is_empty()).unwrap_or(false)
    }
}

impl HelpdeskConfig {
    pub fn email_enabled(&self) -> bool {
        self.email_from.is_some() && self.email_to.is_some() && self.smtp_url.is_some()
    }

    pub fn whatsapp_enabled(&self) -> bool {
        self.escalation_number.is_some()
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(messaging) = patch.messaging {
            if let Some(base_url) = messaging.base_url {
                self.messaging.base_url = Some(base_url);
            }
            if let Some(api_token) = messaging.api_token {
                self.messaging.api_token = Some(secret_value(api_token));
            }
            if let Some(instance) = messaging.instance {
                self.messaging.instance = Some(instance);
            }
            if let Some(timeout_secs) = messaging.timeout_secs {
                self.messaging.timeout_secs = timeout_secs;
            }
        }

        if let Some(helpdesk) = patch.helpdesk {
            if let Some(email_from) = helpdesk.email_from {
                self.helpdesk.email_from = Some(email_from);
            }
            if let Some(email_to) = helpdesk.email_to {
                self.helpdesk.email_to = Some(email_to);
            }
            if let Some(smtp_url) = helpdesk.smtp_url {
                self.helpdesk.smtp_url = Some(secret_value(smtp_url));
            }
            if let Some(escalation_number) = helpdesk.escalation_number {
                self.helpdesk.escalation_number = Some(escalation_number);
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(history_limit) = workflow.history_limit {
                self.workflow.history_limit = history_limit;
            }
            if let Some(value) = workflow.simulation_temperature {
                self.workflow.simulation_temperature = value;
            }
            if let Some(value) = workflow.messaging_temperature {
                self.workflow.messaging_temperature = value;
            }
            if let Some(value) = workflow.support_temperature {
                self.workflow.support_temperature = value;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CONCIERGE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_value("CONCIERGE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_value("CONCIERGE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let llm_api_key = read_env("CONCIERGE_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_value("CONCIERGE_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("CONCIERGE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_MESSAGING_BASE_URL") {
            self.messaging.base_url = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_MESSAGING_API_TOKEN") {
            self.messaging.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_MESSAGING_INSTANCE") {
            self.messaging.instance = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_MESSAGING_TIMEOUT_SECS") {
            self.messaging.timeout_secs = parse_value("CONCIERGE_MESSAGING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_HELPDESK_EMAIL_FROM") {
            self.helpdesk.email_from = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_HELPDESK_EMAIL_TO") {
            self.helpdesk.email_to = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_HELPDESK_SMTP_URL") {
            self.helpdesk.smtp_url = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_HELPDESK_ESCALATION_NUMBER") {
            self.helpdesk.escalation_number = Some(value);
        }

        if let Some(value) = read_env("CONCIERGE_WORKFLOW_HISTORY_LIMIT") {
            self.workflow.history_limit = parse_value("CONCIERGE_WORKFLOW_HISTORY_LIMIT", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("CONCIERGE_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_value("CONCIERGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_value("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.messaging_base_url {
            self.messaging.base_url = Some(base_url);
        }
        if let Some(api_token) = overrides.messaging_api_token {
            self.messaging.api_token = Some(secret_value(api_token));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_messaging(&self.messaging)?;
        validate_helpdesk(&self.helpdesk, &self.messaging)?;
        validate_workflow(&self.workflow)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let missing_key =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set CONCIERGE_LLM_API_KEY or OPENAI_API_KEY)".to_string(),
        ));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_messaging(messaging: &MessagingConfig) -> Result<(), ConfigError> {
    if !messaging.is_enabled() {
        return Ok(());
    }

    let base_url = messaging.base_url.as_deref().unwrap_or_default();
    if !is_http_url(base_url) {
        return Err(ConfigError::Validation(
            "messaging.base_url must start with http:// or https://".to_string(),
        ));
    }

    let missing_token = messaging
        .api_token
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_token {
        return Err(ConfigError::Validation(
            "messaging.api_token is required when messaging.base_url is set".to_string(),
        ));
    }

    if messaging.timeout_secs == 0 || messaging.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "messaging.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_helpdesk(
    helpdesk: &HelpdeskConfig,
    messaging: &MessagingConfig,
) -> Result<(), ConfigError> {
    let email_fields =
        [helpdesk.email_from.is_some(), helpdesk.email_to.is_some(), helpdesk.smtp_url.is_some()];
    let configured = email_fields.iter().filter(|present| **present).count();
    if configured != 0 && configured != email_fields.len() {
        return Err(ConfigError::Validation(
            "helpdesk.email_from, helpdesk.email_to and helpdesk.smtp_url must be set together"
                .to_string(),
        ));
    }

    if let Some(smtp_url) = &helpdesk.smtp_url {
        let url = smtp_url.expose_secret();
        if !url.starts_with("smtp://") && !url.starts_with("smtps://") {
            return Err(ConfigError::Validation(
                "helpdesk.smtp_url must start with smtp:// or smtps://".to_string(),
            ));
        }
    }

    if helpdesk.escalation_number.is_some() && !messaging.is_enabled() {
        return Err(ConfigError::Validation(
            "helpdesk.escalation_number requires messaging.base_url to be configured".to_string(),
        ));
    }

    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.history_limit == 0 || workflow.history_limit > 200 {
        return Err(ConfigError::Validation(
            "workflow.history_limit must be in range 1..=200".to_string(),
        ));
    }

    let temperatures = [
        ("workflow.simulation_temperature", workflow.simulation_temperature),
        ("workflow.messaging_temperature", workflow.messaging_temperature),
        ("workflow.support_temperature", workflow.support_temperature),
    ];
    for (key, value) in temperatures {
        if !(0.0..=2.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0.0..=2.0")));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    messaging: Option<MessagingPatch>,
    helpdesk: Option<HelpdeskPatch>,
    workflow: Option<WorkflowPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagingPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    instance: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HelpdeskPatch {
    email_from: Option<String>,
    email_to: Option<String>,
    smtp_url: Option<String>,
    escalation_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    history_limit: Option<u32>,
    simulation_temperature: Option<f32>,
    messaging_temperature: Option<f32>,
    support_temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
