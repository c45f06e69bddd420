use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
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
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
    pub max_sessions: usize,
    pub max_transcript_turns: usize,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Deterministic phrasing from the status text; no network.
    Template,
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Per-invocation values that win over the file and the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
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
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Every settable key as written in `fellah.toml`. The matching environment
/// variable is `FELLAH_` followed by the key upper-cased with `.` as `_`.
const KEYS: &[&str] = &[
    "database.url",
    "database.max_connections",
    "database.timeout_secs",
    "llm.provider",
    "llm.api_key",
    "llm.base_url",
    "llm.model",
    "llm.timeout_secs",
    "llm.max_retries",
    "server.bind_address",
    "server.port",
    "server.graceful_shutdown_secs",
    "session.idle_ttl_secs",
    "session.max_sessions",
    "session.max_transcript_turns",
    "session.sweep_interval_secs",
    "logging.level",
    "logging.format",
];

/// Short spellings accepted for the logging keys; the long form wins when both are set.
const ENV_ALIASES: &[(&str, &str)] =
    &[("FELLAH_LOG_LEVEL", "logging.level"), ("FELLAH_LOG_FORMAT", "logging.format")];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://fellah.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Template,
                api_key: None,
                base_url: None,
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5001,
                graceful_shutdown_secs: 15,
            },
            session: SessionConfig {
                idle_ttl_secs: 3_600,
                max_sessions: 10_000,
                max_transcript_turns: 40,
                sweep_interval_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(Self::Template),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected template|openai|ollama)"
            ))),
        }
    }
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

impl LlmConfig {
    /// Base URL for the chat completion endpoint, defaulting per provider.
    pub fn effective_base_url(&self) -> Option<String> {
        match (&self.base_url, self.provider) {
            (Some(url), _) => Some(url.trim_end_matches('/').to_string()),
            (None, LlmProvider::OpenAi) => Some("https://api.openai.com".to_string()),
            (None, LlmProvider::Ollama) => Some("http://localhost:11434".to_string()),
            (None, LlmProvider::Template) => None,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            for (key, value) in read_file_entries(&path)? {
                config.set(&key, &key, &value)?;
            }
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fellah.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Assigns one dotted key from its textual form; `source` names the key in errors.
    fn set(&mut self, key: &str, source: &str, value: &str) -> Result<(), ConfigError> {
        let invalid =
            || ConfigError::InvalidValue { key: source.to_string(), value: value.to_string() };
        match key {
            "database.url" => self.database.url = value.to_string(),
            "database.max_connections" => {
                self.database.max_connections = value.parse().map_err(|_| invalid())?
            }
            "database.timeout_secs" => {
                self.database.timeout_secs = value.parse().map_err(|_| invalid())?
            }
            "llm.provider" => self.llm.provider = value.parse()?,
            "llm.api_key" => self.llm.api_key = Some(SecretString::from(value.to_string())),
            "llm.base_url" => self.llm.base_url = Some(value.to_string()),
            "llm.model" => self.llm.model = value.to_string(),
            "llm.timeout_secs" => self.llm.timeout_secs = value.parse().map_err(|_| invalid())?,
            "llm.max_retries" => self.llm.max_retries = value.parse().map_err(|_| invalid())?,
            "server.bind_address" => self.server.bind_address = value.to_string(),
            "server.port" => self.server.port = value.parse().map_err(|_| invalid())?,
            "server.graceful_shutdown_secs" => {
                self.server.graceful_shutdown_secs = value.parse().map_err(|_| invalid())?
            }
            "session.idle_ttl_secs" => {
                self.session.idle_ttl_secs = value.parse().map_err(|_| invalid())?
            }
            "session.max_sessions" => {
                self.session.max_sessions = value.parse().map_err(|_| invalid())?
            }
            "session.max_transcript_turns" => {
                self.session.max_transcript_turns = value.parse().map_err(|_| invalid())?
            }
            "session.sweep_interval_secs" => {
                self.session.sweep_interval_secs = value.parse().map_err(|_| invalid())?
            }
            "logging.level" => self.logging.level = value.to_string(),
            "logging.format" => self.logging.format = value.parse()?,
            _ => return Err(ConfigError::UnknownKey(source.to_string())),
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        for (alias, key) in ENV_ALIASES {
            if let Some(value) = read_env(alias) {
                self.set(key, alias, &value)?;
            }
        }
        for key in KEYS {
            let var = env_var_name(key);
            if let Some(value) = read_env(&var) {
                self.set(key, &var, &value)?;
            }
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
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn env_var_name(key: &str) -> String {
    format!("FELLAH_{}", key.replace('.', "_").to_ascii_uppercase())
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fellah.toml"), PathBuf::from("config/fellah.toml")]
        .into_iter()
        .find(|path| path.exists())
}

/// Flattens `[section] field = value` into `("section.field", value)` pairs.
fn read_file_entries(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    let table = toml::from_str::<toml::Table>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;

    let mut entries = Vec::new();
    for (section, fields) in table {
        let toml::Value::Table(fields) = fields else {
            return Err(ConfigError::UnknownKey(section));
        };
        for (field, value) in fields {
            let key = format!("{section}.{field}");
            let text = match value {
                toml::Value::String(text) => text,
                toml::Value::Integer(number) => number.to_string(),
                toml::Value::Float(number) => number.to_string(),
                toml::Value::Boolean(flag) => flag.to_string(),
                other => return Err(ConfigError::InvalidValue { key, value: other.to_string() }),
            };
            entries.push((key, text));
        }
    }
    Ok(entries)
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
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::Template => {}
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            if llm.model.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "llm.model is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
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

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.idle_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if session.max_sessions == 0 {
        return Err(ConfigError::Validation(
            "session.max_sessions must be greater than zero".to_string(),
        ));
    }
    if session.max_transcript_turns < 2 {
        return Err(ConfigError::Validation(
            "session.max_transcript_turns must be at least 2".to_string(),
        ));
    }
    if session.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "session.sweep_interval_secs must be greater than zero".to_string(),
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
