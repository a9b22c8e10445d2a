use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_level, parse_optional_datetime, to_i64},
    models::{NewNotification, Notification},
};

const SELECT_COLUMNS: &str =
    "SELECT id, title, body, level, metric, value, reading_id, created_at, read_at FROM notifications";

fn row_to_notification(row: &Row) -> Result<Notification> {
    let level: String = row.get("level")?;
    let created_at: String = row.get("created_at")?;
    let read_at: Option<String> = row.get("read_at")?;

    Ok(Notification {
        id: row.get("id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        level: parse_level(&level)?,
        metric: row.get("metric")?,
        value: row.get("value")?,
        reading_id: row.get("reading_id")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        read_at: parse_optional_datetime(read_at, "read_at")?,
    })
}

impl Database {
    pub async fn insert_notification(&self, new: NewNotification) -> Result<Notification> {
        self.execute(move |conn| {
            let notification = Notification {
                id: Uuid::new_v4().to_string(),
                title: new.title,
                body: new.body,
                level: new.level,
                metric: new.metric,
                value: new.value,
                reading_id: new.reading_id,
                created_at: Utc::now(),
                read_at: None,
            };

            conn.execute(
                "INSERT INTO notifications (id, title, body, level, metric, value, reading_id, created_at, read_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                params![
                    notification.id,
                    notification.title,
                    notification.body,
                    notification.level.as_str(),
                    notification.metric,
                    notification.value,
                    notification.reading_id,
                    notification.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert notification")?;

            Ok(notification)
        })
        .await
    }

    /// Newest first.
    pub async fn list_notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        let limit = to_i64(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ))?;

            let mut rows = stmt.query(params![limit])?;
            let mut notifications = Vec::new();
            while let Some(row) = rows.next()? {
                notifications.push(row_to_notification(row)?);
            }

            Ok(notifications)
        })
        .await
    }

    pub async fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
            let mut rows = stmt.query(params![id])?;
            let notification = match rows.next()? {
                Some(row) => Some(row_to_notification(row)?),
                None => None,
            };
            Ok(notification)
        })
        .await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE notifications
                 SET read_at = COALESCE(read_at, ?1)
                 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("Notification not found"));
            }
            Ok(())
        })
        .await
    }

    /// Returns how many notifications changed state.
    pub async fn mark_all_notifications_read(&self) -> Result<usize> {
        self.execute(|conn| {
            let updated = conn
                .execute(
                    "UPDATE notifications SET read_at = ?1 WHERE read_at IS NULL",
                    params![Utc::now().to_rfc3339()],
                )
                .with_context(|| "failed to mark notifications read")?;
            Ok(updated)
        })
        .await
    }

    pub async fn unread_notification_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE read_at IS NULL",
                [],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    pub async fn clear_notifications(&self) -> Result<usize> {
        self.execute(|conn| {
            let deleted = conn
                .execute("DELETE FROM notifications", [])
                .with_context(|| "failed to clear notifications")?;
            Ok(deleted)
        })
        .await
    }
}
