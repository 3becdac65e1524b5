//! Coaching message persistence.
//!
//! The replacement contract: storing a new batch for a user deletes that
//! user's active messages first, then inserts the batch. The two steps are
//! not wrapped in a transaction — a reader racing a regeneration may briefly
//! observe zero messages, which downstream consumers tolerate
//! (at-least-once, eventually consistent). The expiry sweep is independent
//! and covers every user.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::model::CoachingMessageData;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CoachingMessageRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub priority: String,
    pub title: String,
    /// Full `CoachingMessageData` as JSON.
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct CoachingStorage {
    pool: SqlitePool,
}

impl CoachingStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the user's active batch with `messages`, each stamped with its
    /// kind-specific expiration. Idempotent per invocation: prior active
    /// messages are removed, never accumulated.
    pub async fn replace_active(
        &self,
        user_id: &str,
        messages: &[CoachingMessageData],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        sqlx::query("DELETE FROM coaching_messages WHERE user_id = ? AND status = 'active'")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("clearing active coaching messages")?;

        for msg in messages {
            let id = Uuid::new_v4().to_string();
            let content =
                serde_json::to_string(msg).context("serializing coaching message")?;
            let expires_at = now + msg.kind.ttl();
            sqlx::query(
                "INSERT INTO coaching_messages
                     (id, user_id, kind, priority, title, content, status, created_at, expires_at)
                 VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)",
            )
            .bind(&id)
            .bind(user_id)
            .bind(msg.kind.as_str())
            .bind(msg.priority.as_str())
            .bind(&msg.title)
            .bind(&content)
            .bind(now)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .context("inserting coaching message")?;
        }

        debug!(user_id, count = messages.len(), "coaching batch replaced");
        Ok(messages.len())
    }

    /// Active, unexpired messages for a user — high priority first, then
    /// newest.
    pub async fn active_messages(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CoachingMessageRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM coaching_messages
             WHERE user_id = ? AND status = 'active' AND expires_at > ?
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END,
                      created_at DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("fetching active coaching messages")?)
    }

    /// Delete every message past its expiration, for all users. Runs on a
    /// timer, independent of per-user replacement.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM coaching_messages WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("sweeping expired coaching messages")?;
        Ok(result.rows_affected())
    }

    /// Mark a message dismissed. Returns `false` when the id matched nothing.
    pub async fn dismiss(&self, message_id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE coaching_messages SET status = 'dismissed' WHERE id = ?")
                .bind(message_id)
                .execute(&self.pool)
                .await
                .context("dismissing coaching message")?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a message completed (the user acted on it).
    pub async fn complete(&self, message_id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE coaching_messages SET status = 'completed' WHERE id = ?")
                .bind(message_id)
                .execute(&self.pool)
                .await
                .context("completing coaching message")?;
        Ok(result.rows_affected() > 0)
    }
}
