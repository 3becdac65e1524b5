//! Spaced-repetition review scheduling on topic mastery rows.
//!
//! Simplified SM-2: the review interval and easiness factor live on the same
//! `topic_mastery` row as the score, but the two subsystems are independent —
//! a failing review resets the schedule without touching the mastery score.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{IntelError, IntelResult};
use crate::storage::{Storage, TopicMasteryRow};

/// Easiness never drops below this floor.
const MIN_EASINESS: f64 = 1.3;

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub subject: String,
    pub topic: String,
    pub interval_days: i64,
    pub easiness: f64,
    pub next_review: DateTime<Utc>,
}

/// New easiness factor after a quality-rated review (1–5 scale).
pub fn next_easiness(current: f64, quality: i64) -> f64 {
    let q = quality as f64;
    (current + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASINESS)
}

/// Next interval in days. A failing review (quality < 3) resets to 1 day
/// regardless of history; the first passing review seeds 1/3/6 days by
/// quality, later ones multiply by the easiness factor.
pub fn next_interval(current_interval: i64, quality: i64, easiness: f64) -> i64 {
    if quality < 3 {
        return 1;
    }
    if current_interval == 0 {
        return match quality {
            3 => 1,
            4 => 3,
            _ => 6,
        };
    }
    (current_interval as f64 * easiness).round() as i64
}

/// Record a review of a topic. Quality is validated before anything is
/// written; a missing mastery row is a not-found condition, not a silent
/// no-op.
pub async fn review_topic(
    storage: &Storage,
    user_id: &str,
    subject: &str,
    topic: &str,
    quality: i64,
) -> IntelResult<ReviewOutcome> {
    if !(1..=5).contains(&quality) {
        return Err(IntelError::InvalidRange {
            field: "quality",
            min: 1,
            max: 5,
            value: quality,
        });
    }

    let row: TopicMasteryRow = storage
        .get_mastery(user_id, subject, topic)
        .await?
        .ok_or_else(|| IntelError::NotFound {
            entity: "topic mastery",
            id: format!("{subject} - {topic}"),
        })?;

    let easiness = next_easiness(row.easiness, quality);
    let interval = next_interval(row.interval_days, quality, easiness);
    let next_review = Utc::now() + Duration::days(interval);

    storage
        .update_mastery_review(&row.id, easiness, interval, next_review)
        .await?;

    Ok(ReviewOutcome {
        subject: row.subject,
        topic: row.topic,
        interval_days: interval,
        easiness,
        next_review,
    })
}
