//! SQLite-backed record store.
//!
//! All persisted entities are scoped by `user_id`; no cross-user shared
//! mutable state exists above this layer. Timestamps are stored as RFC 3339
//! TEXT and decoded straight into `DateTime<Utc>`.
//!
//! Schema bootstrap is idempotent: `CREATE TABLE IF NOT EXISTS` plus
//! tolerated `ALTER TABLE` column additions (SQLite has no
//! `ALTER TABLE IF NOT EXISTS`, so the "duplicate column" error is ignored).

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

// ─── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub grade: Option<String>,
    pub tz: String,
    pub tone: String,
    /// Weekly study goal in minutes.
    pub weekly_goal: i64,
    pub intel_enabled: bool,
    pub nudges_enabled: bool,
    pub coaching_enabled: bool,
    pub study_reminders: bool,
    pub created_at: DateTime<Utc>,
}

/// A logged study session. Immutable once written.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, serde::Serialize)]
pub struct StudySessionRow {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub topic: Option<String>,
    pub minutes: i64,
    /// Self-reported effectiveness, 1–10. Optional.
    pub effectiveness: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ExamRow {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub topic: Option<String>,
    pub date: DateTime<Utc>,
    pub weight: f64,
    pub target_grade: Option<String>,
    /// Cached copy of the last threat computation. Display-only — the
    /// calculator recomputes from scratch and overwrites these.
    pub days_remaining: Option<i64>,
    pub threat_level: Option<String>,
    pub progress: Option<i64>,
    pub prediction: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row per (user, subject, topic). Carries both the mastery score and the
/// spaced-repetition review schedule — two subsystems sharing the entity.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct TopicMasteryRow {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub topic: String,
    pub score: i64,
    pub confidence: i64,
    pub sessions_count: i64,
    pub total_minutes: i64,
    pub last_studied: DateTime<Utc>,
    pub easiness: f64,
    pub interval_days: i64,
    pub next_review: Option<DateTime<Utc>>,
    pub review_count: i64,
}

/// Free-text record (session note, reflection, generated briefing). Input to
/// the semantic thread extractor.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct MemoryEventRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ─── Store ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("studyd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            use sqlx::ConnectOptions as _;
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    /// Used to create CoachingStorage that shares the same SQLite connection.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Cheap connectivity probe for health reporting.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL DEFAULT '',
                grade           TEXT,
                tz              TEXT NOT NULL DEFAULT 'Europe/London',
                tone            TEXT NOT NULL DEFAULT 'balanced',
                weekly_goal     INTEGER NOT NULL DEFAULT 600,
                intel_enabled   INTEGER NOT NULL DEFAULT 1,
                nudges_enabled  INTEGER NOT NULL DEFAULT 1,
                coaching_enabled INTEGER NOT NULL DEFAULT 1,
                study_reminders INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS study_sessions (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                subject       TEXT NOT NULL,
                topic         TEXT,
                minutes       INTEGER NOT NULL,
                effectiveness INTEGER,
                notes         TEXT,
                created_at    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_created
                ON study_sessions(user_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS exams (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                subject        TEXT NOT NULL,
                topic          TEXT,
                date           TEXT NOT NULL,
                weight         REAL NOT NULL DEFAULT 100,
                target_grade   TEXT,
                days_remaining INTEGER,
                threat_level   TEXT,
                progress       INTEGER,
                prediction     TEXT,
                created_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exams_user_date ON exams(user_id, date ASC);

            CREATE TABLE IF NOT EXISTS topic_mastery (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL,
                subject        TEXT NOT NULL,
                topic          TEXT NOT NULL,
                score          INTEGER NOT NULL DEFAULT 0,
                confidence     INTEGER NOT NULL DEFAULT 50,
                sessions_count INTEGER NOT NULL DEFAULT 0,
                total_minutes  INTEGER NOT NULL DEFAULT 0,
                last_studied   TEXT NOT NULL,
                easiness       REAL NOT NULL DEFAULT 2.5,
                interval_days  INTEGER NOT NULL DEFAULT 0,
                next_review    TEXT,
                review_count   INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, subject, topic)
            );

            CREATE TABLE IF NOT EXISTS memory_events (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                kind       TEXT NOT NULL,
                text       TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_user_created
                ON memory_events(user_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS coaching_messages (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                kind       TEXT NOT NULL,
                priority   TEXT NOT NULL,
                title      TEXT NOT NULL,
                content    TEXT NOT NULL,
                status     TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_coaching_user_status
                ON coaching_messages(user_id, status);
            "#,
        )
        .execute(pool)
        .await
        .context("creating studyd tables")?;

        let alter_stmts = [
            "ALTER TABLE users ADD COLUMN tone TEXT NOT NULL DEFAULT 'balanced'",
            "ALTER TABLE exams ADD COLUMN target_grade TEXT",
        ];
        for stmt in alter_stmts {
            if let Err(e) = sqlx::query(stmt).execute(pool).await {
                let msg = e.to_string();
                if !msg.contains("duplicate column") {
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    // ─── Users ────────────────────────────────────────────────────────────────

    /// Create or update a user. Existing flag settings are preserved.
    pub async fn ensure_user(&self, id: &str, name: &str, weekly_goal: i64) -> Result<UserRow> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, name, weekly_goal, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 weekly_goal = excluded.weekly_goal",
        )
        .bind(id)
        .bind(name)
        .bind(weekly_goal)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("upserting user")?;

        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after upsert"))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_intel_users(&self) -> Result<Vec<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE intel_enabled = 1")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_nudge_users(&self) -> Result<Vec<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE nudges_enabled = 1")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_coaching_users(&self) -> Result<Vec<UserRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM users WHERE coaching_enabled = 1")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn list_reminder_users(&self) -> Result<Vec<UserRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM users WHERE study_reminders = 1")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?)
    }

    // ─── Study sessions ───────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn create_session(
        &self,
        user_id: &str,
        subject: &str,
        topic: Option<&str>,
        minutes: i64,
        effectiveness: Option<i64>,
        notes: Option<&str>,
    ) -> Result<StudySessionRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO study_sessions (id, user_id, subject, topic, minutes, effectiveness, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .bind(minutes)
        .bind(effectiveness)
        .bind(notes)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("inserting study session")?;

        self.get_session(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("session not found after insert"))
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<StudySessionRow>> {
        Ok(sqlx::query_as("SELECT * FROM study_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Sessions for a user within the trailing `days` days, newest first.
    pub async fn recent_sessions(&self, user_id: &str, days: i64) -> Result<Vec<StudySessionRow>> {
        let since = Utc::now() - Duration::days(days);
        Ok(sqlx::query_as(
            "SELECT * FROM study_sessions
             WHERE user_id = ? AND created_at >= ?
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?)
    }

    // ─── Exams ────────────────────────────────────────────────────────────────

    pub async fn create_exam(
        &self,
        user_id: &str,
        subject: &str,
        topic: Option<&str>,
        date: DateTime<Utc>,
        weight: f64,
        target_grade: Option<&str>,
    ) -> Result<ExamRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO exams (id, user_id, subject, topic, date, weight, target_grade, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .bind(date)
        .bind(weight)
        .bind(target_grade)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("inserting exam")?;

        self.get_exam(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("exam not found after insert"))
    }

    pub async fn get_exam(&self, id: &str) -> Result<Option<ExamRow>> {
        Ok(sqlx::query_as("SELECT * FROM exams WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// All exams for a user, soonest first.
    pub async fn list_exams(&self, user_id: &str) -> Result<Vec<ExamRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM exams WHERE user_id = ? ORDER BY date ASC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Exams across all users dated within the next `days` days (threshold
    /// alert scan).
    pub async fn upcoming_exams(&self, days: i64) -> Result<Vec<ExamRow>> {
        let now = Utc::now();
        let until = now + Duration::days(days);
        Ok(sqlx::query_as(
            "SELECT * FROM exams WHERE date >= ? AND date <= ? ORDER BY date ASC",
        )
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Partial update. Returns `false` when no exam matched (caller signals
    /// not-found).
    pub async fn update_exam(
        &self,
        id: &str,
        user_id: &str,
        subject: Option<&str>,
        topic: Option<&str>,
        date: Option<DateTime<Utc>>,
        weight: Option<f64>,
        target_grade: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE exams SET
                 subject = COALESCE(?, subject),
                 topic = COALESCE(?, topic),
                 date = COALESCE(?, date),
                 weight = COALESCE(?, weight),
                 target_grade = COALESCE(?, target_grade)
             WHERE id = ? AND user_id = ?",
        )
        .bind(subject)
        .bind(topic)
        .bind(date)
        .bind(weight)
        .bind(target_grade)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("updating exam")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_exam(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM exams WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("deleting exam")?;
        Ok(result.rows_affected() > 0)
    }

    /// Write the cached threat computation onto the exam row.
    pub async fn cache_exam_threat(
        &self,
        exam_id: &str,
        days_remaining: i64,
        threat_level: &str,
        progress: i64,
        prediction: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE exams SET days_remaining = ?, threat_level = ?, progress = ?, prediction = ?
             WHERE id = ?",
        )
        .bind(days_remaining)
        .bind(threat_level)
        .bind(progress)
        .bind(prediction)
        .bind(exam_id)
        .execute(&self.pool)
        .await
        .context("caching exam threat")?;
        Ok(())
    }

    // ─── Topic mastery ────────────────────────────────────────────────────────

    pub async fn mastery_rows(&self, user_id: &str) -> Result<Vec<TopicMasteryRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM topic_mastery WHERE user_id = ? ORDER BY score ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_mastery(
        &self,
        user_id: &str,
        subject: &str,
        topic: &str,
    ) -> Result<Option<TopicMasteryRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM topic_mastery WHERE user_id = ? AND subject = ? AND topic = ?",
        )
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Session-driven mastery write. A single conditional upsert so concurrent
    /// session completions for the same topic cannot lose updates: new rows
    /// take the initial values, existing rows apply the bounded delta with the
    /// clamp enforced inside the statement.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_mastery_session(
        &self,
        user_id: &str,
        subject: &str,
        topic: &str,
        initial_score: i64,
        initial_confidence: i64,
        score_delta: i64,
        minutes: i64,
        studied_at: DateTime<Utc>,
    ) -> Result<TopicMasteryRow> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO topic_mastery
                 (id, user_id, subject, topic, score, confidence, sessions_count, total_minutes, last_studied)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT(user_id, subject, topic) DO UPDATE SET
                 score = MAX(0, MIN(100, score + ?)),
                 sessions_count = sessions_count + 1,
                 total_minutes = total_minutes + ?,
                 last_studied = excluded.last_studied",
        )
        .bind(&id)
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .bind(initial_score)
        .bind(initial_confidence)
        .bind(minutes)
        .bind(studied_at)
        .bind(score_delta)
        .bind(minutes)
        .execute(&self.pool)
        .await
        .context("upserting topic mastery")?;

        self.get_mastery(user_id, subject, topic)
            .await?
            .ok_or_else(|| anyhow::anyhow!("mastery row not found after upsert"))
    }

    /// Direct assessment write: assigns the score outright (caller validates
    /// the range before this is reached).
    pub async fn set_mastery_score(
        &self,
        user_id: &str,
        subject: &str,
        topic: &str,
        score: i64,
        confidence: Option<i64>,
    ) -> Result<TopicMasteryRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO topic_mastery
                 (id, user_id, subject, topic, score, confidence, sessions_count, total_minutes, last_studied)
             VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?)
             ON CONFLICT(user_id, subject, topic) DO UPDATE SET
                 score = excluded.score,
                 confidence = COALESCE(?, confidence),
                 last_studied = excluded.last_studied",
        )
        .bind(&id)
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .bind(score)
        .bind(confidence.unwrap_or(50))
        .bind(now)
        .bind(confidence)
        .execute(&self.pool)
        .await
        .context("setting mastery score")?;

        self.get_mastery(user_id, subject, topic)
            .await?
            .ok_or_else(|| anyhow::anyhow!("mastery row not found after upsert"))
    }

    /// Persist a spaced-repetition review outcome.
    pub async fn update_mastery_review(
        &self,
        row_id: &str,
        easiness: f64,
        interval_days: i64,
        next_review: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE topic_mastery
             SET easiness = ?, interval_days = ?, next_review = ?, review_count = review_count + 1
             WHERE id = ?",
        )
        .bind(easiness)
        .bind(interval_days)
        .bind(next_review)
        .bind(row_id)
        .execute(&self.pool)
        .await
        .context("updating review schedule")?;
        Ok(())
    }

    // ─── Memory events ────────────────────────────────────────────────────────

    pub async fn record_event(&self, user_id: &str, kind: &str, text: &str) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO memory_events (id, user_id, kind, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(kind)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("recording memory event")?;
        Ok(())
    }

    /// Most recent free-text records for a user, newest first.
    pub async fn recent_memory_events(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<MemoryEventRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM memory_events WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
