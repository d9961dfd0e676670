use async_trait::async_trait;
use thiserror::Error;

use folio_core::domain::notification::{NotificationId, NotificationRecord};

pub mod memory;
pub mod notification;

pub use memory::InMemoryNotificationRepository;
pub use notification::SqlNotificationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only store for outbound notifications. Rows are picked up by the
/// mail delivery worker, which owns `delivery_state` after insertion.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn append(&self, record: NotificationRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<NotificationRecord>, RepositoryError>;

    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepositoryError>;
}
