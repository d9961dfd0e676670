//! Rendering of contact submissions into outbound notification records.

use chrono::{DateTime, Utc};
use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::contact::ContactSubmission;
use crate::domain::notification::{NotificationId, NotificationRecord};

// The `.html` suffix turns on tera's autoescaping for every substituted field.
const TEMPLATE_NAME: &str = "contact_notification.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("notification template failed: {0}")]
    Template(#[from] tera::Error),
}

pub struct NotificationRenderer {
    templates: Tera,
    recipient: String,
}

impl NotificationRenderer {
    pub fn new(recipient: impl Into<String>) -> Result<Self, RenderError> {
        let mut templates = Tera::default();
        templates.add_raw_template(
            TEMPLATE_NAME,
            include_str!("../../../templates/mail/contact_notification.html"),
        )?;
        Ok(Self { templates, recipient: recipient.into() })
    }

    pub fn render(
        &self,
        submission: &ContactSubmission,
        created_at: DateTime<Utc>,
    ) -> Result<NotificationRecord, RenderError> {
        let mut context = Context::new();
        context.insert("name", submission.name.trim());
        context.insert("email", submission.email.trim());
        context.insert("message", submission.message.trim());
        context.insert("received_at", &created_at.to_rfc3339());

        let html_body = self.templates.render(TEMPLATE_NAME, &context)?;

        Ok(NotificationRecord {
            id: NotificationId::generate(),
            recipients: vec![self.recipient.clone()],
            subject: subject_for(&submission.name),
            html_body,
            created_at,
        })
    }
}

/// Subject line for a submission. Control characters are dropped so the value
/// stays on a single header line.
pub fn subject_for(name: &str) -> String {
    let name: String = name.chars().filter(|ch| !ch.is_control()).collect();
    format!("New portfolio contact from {}", name.trim())
}
