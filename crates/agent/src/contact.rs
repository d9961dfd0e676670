use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use folio_core::domain::contact::ContactSubmission;
use folio_core::domain::notification::NotificationRecord;
use folio_core::notification::{NotificationRenderer, RenderError};
use folio_db::repositories::{NotificationRepository, RepositoryError};

/// Appended to the reply when a parsed contact could not be stored.
pub const SAVE_FAILED_NOTICE: &str =
    "(Note: your message could not be saved because of an internal error. Please try again later.)";

#[derive(Debug, Error)]
pub enum ContactSinkError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("could not store notification: {0}")]
    Repository(#[from] RepositoryError),
}

/// Turns a contact submission into exactly one queued notification.
pub struct ContactSink {
    renderer: NotificationRenderer,
    repository: Arc<dyn NotificationRepository>,
}

impl ContactSink {
    pub fn new(
        renderer: NotificationRenderer,
        repository: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self { renderer, repository }
    }

    pub async fn persist(
        &self,
        submission: &ContactSubmission,
    ) -> Result<NotificationRecord, ContactSinkError> {
        let record = self.renderer.render(submission, Utc::now())?;
        self.repository.append(record.clone()).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_core::domain::contact::ContactSubmission;
    use folio_core::notification::NotificationRenderer;
    use folio_db::repositories::{InMemoryNotificationRepository, NotificationRepository};

    use super::{ContactSink, ContactSinkError};

    fn submission() -> ContactSubmission {
        ContactSubmission {
            name: "Ann".to_string(),
            email: "a@x.com".to_string(),
            message: "Let's talk about a role.".to_string(),
        }
    }

    fn sink(repository: Arc<InMemoryNotificationRepository>) -> ContactSink {
        ContactSink::new(
            NotificationRenderer::new("owner@folio.dev").expect("renderer"),
            repository,
        )
    }

    #[tokio::test]
    async fn persist_appends_one_record() {
        let repository = Arc::new(InMemoryNotificationRepository::default());
        let record = sink(repository.clone()).persist(&submission()).await.expect("persist");

        assert_eq!(repository.len().await, 1);
        let stored = repository.list_recent(1).await.expect("list");
        assert_eq!(stored[0], record);
        assert_eq!(record.recipients, vec!["owner@folio.dev".to_string()]);
        assert_eq!(record.subject, "New portfolio contact from Ann");
    }

    #[tokio::test]
    async fn repository_failure_is_reported() {
        let repository = Arc::new(InMemoryNotificationRepository::failing());
        let result = sink(repository.clone()).persist(&submission()).await;

        assert!(matches!(result, Err(ContactSinkError::Repository(_))));
        assert!(repository.is_empty().await);
    }
}
