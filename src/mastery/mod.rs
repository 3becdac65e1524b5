//! Topic mastery — the derived mastery map plus the two write paths that
//! mutate mastery rows.
//!
//! Two rules, one per write path: session completions apply a bounded
//! additive delta derived from the self-reported effectiveness; direct
//! assessments (quiz results, manual corrections) assign the score outright
//! after range validation. The spaced-repetition review schedule lives in
//! [`review`] and shares the row without touching the score.

pub mod review;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::{IntelError, IntelResult};
use crate::storage::{Storage, StudySessionRow, TopicMasteryRow};

/// Mastery below this is a weak topic.
pub const WEAK_THRESHOLD: i64 = 50;
/// Mastery above this is a strong topic.
pub const STRONG_THRESHOLD: i64 = 75;

// ─── Derived map ──────────────────────────────────────────────────────────────

/// A weak or strong topic with its score, used by coaching and prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicScore {
    pub subject: String,
    pub topic: String,
    pub score: i64,
}

impl TopicScore {
    /// Display form used across prompts and gap analyses.
    pub fn label(&self) -> String {
        format!("{} - {}", self.subject, self.topic)
    }
}

/// Read-only mastery view derived from the row set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasteryMap {
    /// `"Subject - Topic"` → score.
    pub topic_scores: HashMap<String, i64>,
    /// Topics under 50%, weakest first.
    pub weak_topics: Vec<TopicScore>,
    /// Topics over 75%, strongest first.
    pub strong_topics: Vec<TopicScore>,
    /// Topics studied 3+ times but still under 60% (≤5).
    pub stuck_topics: Vec<String>,
}

impl MasteryMap {
    pub fn from_rows(rows: &[TopicMasteryRow], sessions: &[StudySessionRow]) -> Self {
        let topic_scores = rows
            .iter()
            .map(|m| (format!("{} - {}", m.subject, m.topic), m.score))
            .collect();

        let mut weak_topics: Vec<TopicScore> = rows
            .iter()
            .filter(|m| m.score < WEAK_THRESHOLD)
            .map(|m| TopicScore {
                subject: m.subject.clone(),
                topic: m.topic.clone(),
                score: m.score,
            })
            .collect();
        weak_topics.sort_by_key(|t| t.score);

        let mut strong_topics: Vec<TopicScore> = rows
            .iter()
            .filter(|m| m.score > STRONG_THRESHOLD)
            .map(|m| TopicScore {
                subject: m.subject.clone(),
                topic: m.topic.clone(),
                score: m.score,
            })
            .collect();
        strong_topics.sort_by_key(|t| std::cmp::Reverse(t.score));

        let mut stuck_topics: Vec<String> = rows
            .iter()
            .filter(|m| {
                let attempts = sessions
                    .iter()
                    .filter(|s| {
                        s.subject == m.subject
                            && s.topic.as_deref().map_or(false, |t| {
                                t.to_lowercase().contains(&m.topic.to_lowercase())
                            })
                    })
                    .count();
                attempts >= 3 && m.score < 60
            })
            .map(|m| m.topic.clone())
            .collect();
        stuck_topics.truncate(5);

        Self {
            topic_scores,
            weak_topics,
            strong_topics,
            stuck_topics,
        }
    }

    /// Mean score across all topics; 0 with no data.
    pub fn average(&self) -> f64 {
        if self.topic_scores.is_empty() {
            return 0.0;
        }
        self.topic_scores.values().sum::<i64>() as f64 / self.topic_scores.len() as f64
    }
}

// ─── Session-driven updates ───────────────────────────────────────────────────

/// Outcome of a session-driven mastery write.
#[derive(Debug, Clone, Serialize)]
pub struct MasteryUpdate {
    pub subject: String,
    pub topic: String,
    pub old_score: Option<i64>,
    pub new_score: i64,
    pub sessions_count: i64,
}

/// Score delta for a rated session: `(effectiveness − 5) × 1.5`, rounded.
/// Unrated sessions earn a small default increase. The clamp to [0, 100]
/// happens at the update boundary in storage.
pub fn session_score_delta(effectiveness: Option<i64>) -> i64 {
    match effectiveness {
        Some(eff) => ((eff - 5) as f64 * 1.5).round() as i64,
        None => 2,
    }
}

/// Initial score for a topic's first session.
fn initial_score(effectiveness: Option<i64>) -> i64 {
    effectiveness.map(|e| e * 5).unwrap_or(25)
}

fn initial_confidence(effectiveness: Option<i64>) -> i64 {
    effectiveness.map(|e| e * 10).unwrap_or(50)
}

/// Apply a completed session to its topic's mastery row. Sessions without a
/// topic update nothing. Milestone crossings are recorded as memory events so
/// the semantic layer can surface them later.
pub async fn apply_session(
    storage: &Storage,
    session: &StudySessionRow,
) -> IntelResult<Option<MasteryUpdate>> {
    let Some(topic) = session.topic.as_deref() else {
        return Ok(None);
    };

    let existing = storage
        .get_mastery(&session.user_id, &session.subject, topic)
        .await?;
    let old_score = existing.as_ref().map(|m| m.score);

    let row = storage
        .upsert_mastery_session(
            &session.user_id,
            &session.subject,
            topic,
            initial_score(session.effectiveness),
            initial_confidence(session.effectiveness),
            session_score_delta(session.effectiveness),
            session.minutes,
            session.created_at,
        )
        .await?;

    if let Some(old) = old_score {
        if row.score >= STRONG_THRESHOLD && old < STRONG_THRESHOLD {
            storage
                .record_event(
                    &session.user_id,
                    "topic_mastered",
                    &format!("Mastered {} - {} at {}%", row.subject, row.topic, row.score),
                )
                .await?;
        } else if row.score < WEAK_THRESHOLD && row.sessions_count >= 3 {
            storage
                .record_event(
                    &session.user_id,
                    "weakness_identified",
                    &format!(
                        "{} - {} still weak at {}% after {} sessions",
                        row.subject, row.topic, row.score, row.sessions_count
                    ),
                )
                .await?;
        }
    }

    info!(
        user_id = %session.user_id,
        subject = %row.subject,
        topic = %row.topic,
        score = row.score,
        "mastery updated from session"
    );

    Ok(Some(MasteryUpdate {
        subject: row.subject,
        topic: row.topic,
        old_score,
        new_score: row.score,
        sessions_count: row.sessions_count,
    }))
}

/// Direct assessment write. Rejects out-of-range values before any mutation.
pub async fn set_score(
    storage: &Storage,
    user_id: &str,
    subject: &str,
    topic: &str,
    score: i64,
    confidence: Option<i64>,
) -> IntelResult<TopicMasteryRow> {
    if !(0..=100).contains(&score) {
        return Err(IntelError::InvalidRange {
            field: "score",
            min: 0,
            max: 100,
            value: score,
        });
    }
    if let Some(c) = confidence {
        if !(0..=100).contains(&c) {
            return Err(IntelError::InvalidRange {
                field: "confidence",
                min: 0,
                max: 100,
                value: c,
            });
        }
    }

    let row = storage
        .set_mastery_score(user_id, subject, topic, score, confidence)
        .await?;
    Ok(row)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
