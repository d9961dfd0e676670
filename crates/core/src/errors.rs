use thiserror::Error;

/// Request-level failures. Degraded paths (document fetch, safety block,
/// contact persistence) never produce one of these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("generation failure: {0}")]
    Generation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl ChatError {
    pub fn status(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid-argument",
            Self::Configuration(_) | Self::Generation(_) => "internal",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::InvalidArgument(message) => {
                InterfaceError::InvalidArgument { message, correlation_id }
            }
            Self::Configuration(message) | Self::Generation(message) => {
                InterfaceError::Internal { message, correlation_id }
            }
        }
    }
}

impl InterfaceError {
    pub fn status(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid-argument",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::InvalidArgument { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Text safe to return to the caller. Validation details are echoed,
    /// internal details are not.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArgument { message, .. } => message.clone(),
            Self::Internal { .. } => {
                "An internal error occurred while generating a response.".to_string()
            }
        }
    }
}
