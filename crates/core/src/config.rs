use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub generation: GenerationConfig,
    pub documents: DocumentsConfig,
    pub contact: ContactConfig,
    pub prompt: PromptConfig,
    pub chat: ChatConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Generation capability settings. A missing `api_key` is not a startup
/// error: each chat request is rejected with a configuration error instead.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DocumentsConfig {
    pub source: DocumentSourceKind,
    pub location: String,
    pub resume_object: String,
    pub background_object: String,
}

#[derive(Clone, Debug)]
pub struct ContactConfig {
    pub recipient: String,
    pub owner_name: String,
}

#[derive(Clone, Debug)]
pub struct PromptConfig {
    pub timestamp: TimestampPolicy,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub max_message_chars: usize,
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
pub enum DocumentSourceKind {
    Http,
    Filesystem,
}

/// When the prompt's capture timestamp is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    ProcessStart,
    PerRequest,
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
    pub generation_api_key: Option<String>,
    pub generation_model: Option<String>,
    pub documents_source: Option<DocumentSourceKind>,
    pub documents_location: Option<String>,
    pub contact_recipient: Option<String>,
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
                url: "sqlite://folio.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            generation: GenerationConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-2.0-flash".to_string(),
                timeout_secs: 60,
            },
            documents: DocumentsConfig {
                source: DocumentSourceKind::Filesystem,
                location: "documents".to_string(),
                resume_object: "resume.pdf".to_string(),
                background_object: "background.txt".to_string(),
            },
            contact: ContactConfig {
                recipient: "owner@example.com".to_string(),
                owner_name: "the site owner".to_string(),
            },
            prompt: PromptConfig { timestamp: TimestampPolicy::ProcessStart },
            chat: ChatConfig { max_message_chars: 4000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl DocumentSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Filesystem => "filesystem",
        }
    }
}

impl TimestampPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProcessStart => "process_start",
            Self::PerRequest => "per_request",
        }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for DocumentSourceKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "filesystem" | "fs" => Ok(Self::Filesystem),
            other => Err(ConfigError::Validation(format!(
                "unsupported document source `{other}` (expected http|filesystem)"
            ))),
        }
    }
}

impl std::str::FromStr for TimestampPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "process_start" => Ok(Self::ProcessStart),
            "per_request" => Ok(Self::PerRequest),
            other => Err(ConfigError::Validation(format!(
                "unsupported prompt timestamp policy `{other}` (expected process_start|per_request)"
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

impl GenerationConfig {
    /// True when an API key is present and not blank.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("folio.toml"));
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

        if let Some(generation) = patch.generation {
            if let Some(api_key) = generation.api_key {
                self.generation.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = generation.base_url {
                self.generation.base_url = base_url;
            }
            if let Some(model) = generation.model {
                self.generation.model = model;
            }
            if let Some(timeout_secs) = generation.timeout_secs {
                self.generation.timeout_secs = timeout_secs;
            }
        }

        if let Some(documents) = patch.documents {
            if let Some(source) = documents.source {
                self.documents.source = source;
            }
            if let Some(location) = documents.location {
                self.documents.location = location;
            }
            if let Some(resume_object) = documents.resume_object {
                self.documents.resume_object = resume_object;
            }
            if let Some(background_object) = documents.background_object {
                self.documents.background_object = background_object;
            }
        }

        if let Some(contact) = patch.contact {
            if let Some(recipient) = contact.recipient {
                self.contact.recipient = recipient;
            }
            if let Some(owner_name) = contact.owner_name {
                self.contact.owner_name = owner_name;
            }
        }

        if let Some(prompt) = patch.prompt {
            if let Some(timestamp) = prompt.timestamp {
                self.prompt.timestamp = timestamp;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(max_message_chars) = chat.max_message_chars {
                self.chat.max_message_chars = max_message_chars;
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
        if let Some(value) = read_env("FOLIO_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FOLIO_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("FOLIO_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FOLIO_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FOLIO_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FOLIO_GENERATION_API_KEY") {
            self.generation.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FOLIO_GENERATION_BASE_URL") {
            self.generation.base_url = value;
        }
        if let Some(value) = read_env("FOLIO_GENERATION_MODEL") {
            self.generation.model = value;
        }
        if let Some(value) = read_env("FOLIO_GENERATION_TIMEOUT_SECS") {
            self.generation.timeout_secs = parse_u64("FOLIO_GENERATION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FOLIO_DOCUMENTS_SOURCE") {
            self.documents.source = value.parse()?;
        }
        if let Some(value) = read_env("FOLIO_DOCUMENTS_LOCATION") {
            self.documents.location = value;
        }
        if let Some(value) = read_env("FOLIO_DOCUMENTS_RESUME_OBJECT") {
            self.documents.resume_object = value;
        }
        if let Some(value) = read_env("FOLIO_DOCUMENTS_BACKGROUND_OBJECT") {
            self.documents.background_object = value;
        }

        if let Some(value) = read_env("FOLIO_CONTACT_RECIPIENT") {
            self.contact.recipient = value;
        }
        if let Some(value) = read_env("FOLIO_CONTACT_OWNER_NAME") {
            self.contact.owner_name = value;
        }

        if let Some(value) = read_env("FOLIO_PROMPT_TIMESTAMP") {
            self.prompt.timestamp = value.parse()?;
        }
        if let Some(value) = read_env("FOLIO_CHAT_MAX_MESSAGE_CHARS") {
            self.chat.max_message_chars = parse_usize("FOLIO_CHAT_MAX_MESSAGE_CHARS", &value)?;
        }

        if let Some(value) = read_env("FOLIO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FOLIO_SERVER_PORT") {
            self.server.port = parse_u16("FOLIO_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FOLIO_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FOLIO_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("FOLIO_LOGGING_LEVEL").or_else(|| read_env("FOLIO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("FOLIO_LOGGING_FORMAT").or_else(|| read_env("FOLIO_LOG_FORMAT"));
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
        if let Some(api_key) = overrides.generation_api_key {
            self.generation.api_key = Some(secret_value(api_key));
        }
        if let Some(model) = overrides.generation_model {
            self.generation.model = model;
        }
        if let Some(source) = overrides.documents_source {
            self.documents.source = source;
        }
        if let Some(location) = overrides.documents_location {
            self.documents.location = location;
        }
        if let Some(recipient) = overrides.contact_recipient {
            self.contact.recipient = recipient;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_generation(&self.generation)?;
        validate_documents(&self.documents)?;
        validate_contact(&self.contact)?;
        validate_chat(&self.chat)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The file `load` would read: the explicit path if it exists, else the first
/// of `folio.toml` and `config/folio.toml` found in the working directory.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("folio.toml"), PathBuf::from("config/folio.toml")]
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

fn validate_generation(generation: &GenerationConfig) -> Result<(), ConfigError> {
    if generation.timeout_secs == 0 || generation.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "generation.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let base_url = generation.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "generation.base_url must start with http:// or https://".to_string(),
        ));
    }

    if generation.model.trim().is_empty() {
        return Err(ConfigError::Validation("generation.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_documents(documents: &DocumentsConfig) -> Result<(), ConfigError> {
    let location = documents.location.trim();
    if location.is_empty() {
        return Err(ConfigError::Validation("documents.location must not be empty".to_string()));
    }

    if documents.source == DocumentSourceKind::Http
        && !location.starts_with("http://")
        && !location.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "documents.location must be an http(s) URL when documents.source = http".to_string(),
        ));
    }

    if documents.resume_object.trim().is_empty() || documents.background_object.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "documents.resume_object and documents.background_object must not be empty"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_contact(contact: &ContactConfig) -> Result<(), ConfigError> {
    let recipient = contact.recipient.trim();
    let well_formed = recipient
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "contact.recipient must be an email address".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.max_message_chars == 0 {
        return Err(ConfigError::Validation(
            "chat.max_message_chars must be greater than zero".to_string(),
        ));
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    generation: Option<GenerationPatch>,
    documents: Option<DocumentsPatch>,
    contact: Option<ContactPatch>,
    prompt: Option<PromptPatch>,
    chat: Option<ChatPatch>,
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
struct GenerationPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsPatch {
    source: Option<DocumentSourceKind>,
    location: Option<String>,
    resume_object: Option<String>,
    background_object: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContactPatch {
    recipient: Option<String>,
    owner_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptPatch {
    timestamp: Option<TimestampPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    max_message_chars: Option<usize>,
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
