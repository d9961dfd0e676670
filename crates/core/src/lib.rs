pub mod actions;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod notification;
pub mod prompt;

pub use actions::{ActionExtractor, ActionTag, ExtractedAction};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, TimestampPolicy};
pub use domain::chat::{ChatReply, ChatRequest, ConversationTurn, ProjectedTurn, TurnRole};
pub use domain::contact::ContactSubmission;
pub use domain::document::{DocumentKind, GroundingDocument};
pub use domain::notification::{NotificationId, NotificationRecord};
pub use errors::{ChatError, InterfaceError};
pub use notification::{NotificationRenderer, RenderError};
pub use prompt::{PromptAssembler, PromptError};
