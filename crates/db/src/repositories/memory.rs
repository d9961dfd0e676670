use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use folio_core::domain::notification::{NotificationId, NotificationRecord};

use super::{NotificationRepository, RepositoryError};

/// Vec-backed store. `fail_appends` makes every append return a database
/// error, which lets callers exercise their failure path.
#[derive(Default)]
pub struct InMemoryNotificationRepository {
    records: RwLock<Vec<NotificationRecord>>,
    fail_appends: AtomicBool,
}

impl InMemoryNotificationRepository {
    pub fn failing() -> Self {
        let repo = Self::default();
        repo.set_fail_appends(true);
        repo
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn append(&self, record: NotificationRecord) -> Result<(), RepositoryError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolClosed));
        }

        let mut records = self.records.write().await;
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Decode(format!(
                "notification {} already exists",
                record.id.0
            )));
        }
        records.push(record);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<NotificationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|record| &record.id == id).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }
}
