use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(format!("MAIL-{}", Uuid::new_v4().simple()))
    }
}

/// Outbound notification handed to the mail delivery worker. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub created_at: DateTime<Utc>,
}
