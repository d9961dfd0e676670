use std::env;
use std::fs;
use std::path::Path;

use folio_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = if config.generation.has_credential() { "<redacted>" } else { "<unset>" };

    vec![
        Field {
            key_path: "database.url",
            value: config.database.url.clone(),
            env_keys: &["FOLIO_DATABASE_URL"],
        },
        Field {
            key_path: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["FOLIO_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key_path: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["FOLIO_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key_path: "generation.api_key",
            value: api_key.to_string(),
            env_keys: &["FOLIO_GENERATION_API_KEY"],
        },
        Field {
            key_path: "generation.base_url",
            value: config.generation.base_url.clone(),
            env_keys: &["FOLIO_GENERATION_BASE_URL"],
        },
        Field {
            key_path: "generation.model",
            value: config.generation.model.clone(),
            env_keys: &["FOLIO_GENERATION_MODEL"],
        },
        Field {
            key_path: "generation.timeout_secs",
            value: config.generation.timeout_secs.to_string(),
            env_keys: &["FOLIO_GENERATION_TIMEOUT_SECS"],
        },
        Field {
            key_path: "documents.source",
            value: config.documents.source.as_str().to_string(),
            env_keys: &["FOLIO_DOCUMENTS_SOURCE"],
        },
        Field {
            key_path: "documents.location",
            value: config.documents.location.clone(),
            env_keys: &["FOLIO_DOCUMENTS_LOCATION"],
        },
        Field {
            key_path: "documents.resume_object",
            value: config.documents.resume_object.clone(),
            env_keys: &["FOLIO_DOCUMENTS_RESUME_OBJECT"],
        },
        Field {
            key_path: "documents.background_object",
            value: config.documents.background_object.clone(),
            env_keys: &["FOLIO_DOCUMENTS_BACKGROUND_OBJECT"],
        },
        Field {
            key_path: "contact.recipient",
            value: config.contact.recipient.clone(),
            env_keys: &["FOLIO_CONTACT_RECIPIENT"],
        },
        Field {
            key_path: "contact.owner_name",
            value: config.contact.owner_name.clone(),
            env_keys: &["FOLIO_CONTACT_OWNER_NAME"],
        },
        Field {
            key_path: "prompt.timestamp",
            value: config.prompt.timestamp.as_str().to_string(),
            env_keys: &["FOLIO_PROMPT_TIMESTAMP"],
        },
        Field {
            key_path: "chat.max_message_chars",
            value: config.chat.max_message_chars.to_string(),
            env_keys: &["FOLIO_CHAT_MAX_MESSAGE_CHARS"],
        },
        Field {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["FOLIO_SERVER_BIND_ADDRESS"],
        },
        Field {
            key_path: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["FOLIO_SERVER_PORT"],
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["FOLIO_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["FOLIO_LOGGING_LEVEL", "FOLIO_LOG_LEVEL"],
        },
        Field {
            key_path: "logging.format",
            value: config.logging.format.as_str().to_string(),
            env_keys: &["FOLIO_LOGGING_FORMAT", "FOLIO_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
