use chrono::{DateTime, Utc};
use sqlx::Row;

use folio_core::domain::notification::{NotificationId, NotificationRecord};

use super::{NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<NotificationRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recipients_json: String =
        row.try_get("recipients_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subject: String =
        row.try_get("subject").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let html_body: String =
        row.try_get("html").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let recipients: Vec<String> = serde_json::from_str(&recipients_json)
        .map_err(|e| RepositoryError::Decode(format!("recipients for {id}: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at for {id}: {e}")))?;

    Ok(NotificationRecord { id: NotificationId(id), recipients, subject, html_body, created_at })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn append(&self, record: NotificationRecord) -> Result<(), RepositoryError> {
        let recipients_json = serde_json::to_string(&record.recipients)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO mail (id, recipients_json, subject, html, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(recipients_json)
        .bind(&record.subject)
        .bind(&record.html_body)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<NotificationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, recipients_json, subject, html, created_at FROM mail WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, recipients_json, subject, html, created_at
             FROM mail
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }
}
