//! Exam threat calculation — converts exam dates and topic mastery into
//! threat levels, progress estimates, grade predictions, and recommended
//! study hours.
//!
//! Pure and recomputed on demand; the persisted exam row only carries a
//! cached copy of the last computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{ExamRow, TopicMasteryRow};

/// Mastery level an exam plan aims for.
const TARGET_MASTERY: f64 = 80.0;

/// Heuristic: one mastery point costs ~30 minutes of focused study.
const MINUTES_PER_POINT: f64 = 30.0;

// ─── Types ────────────────────────────────────────────────────────────────────

/// Categorical urgency for an upcoming exam. Ordered: `Low < Medium < High <
/// Critical`, so `max()` gives the most urgent level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

/// Aggregate urgency across all of a user's exams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamProximity {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "NONE")]
    None,
}

impl ExamProximity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamProximity::Critical => "CRITICAL",
            ExamProximity::High => "HIGH",
            ExamProximity::Medium => "MEDIUM",
            ExamProximity::None => "NONE",
        }
    }
}

/// Derived per-exam snapshot. Never stored as source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamThreatSnapshot {
    pub exam_id: String,
    pub subject: String,
    pub topic: Option<String>,
    pub date: DateTime<Utc>,
    /// Days until the exam, floored at 0 for display. Threshold comparisons
    /// happen on the signed value before flooring.
    pub days_remaining: i64,
    pub threat_level: ThreatLevel,
    /// Preparedness estimate, 0–100.
    pub current_progress: i64,
    /// Predicted grade band, e.g. `"B (70-79%)"`.
    pub prediction: String,
    /// Weak topics for this exam, rendered `"topic (NN%)"`.
    pub gap_analysis: Vec<String>,
    pub recommended_hours: i64,
}

// ─── Calculation ──────────────────────────────────────────────────────────────

/// Compute one threat snapshot per exam.
///
/// Mastery rows match an exam on equal subject; when the exam names a topic,
/// the row's topic must contain it (case-insensitive). No matching rows means
/// 0% mastery — missing data is not an error.
pub fn compute_exam_threats(
    exams: &[ExamRow],
    mastery: &[TopicMasteryRow],
    now: DateTime<Utc>,
) -> Vec<ExamThreatSnapshot> {
    exams
        .iter()
        .map(|exam| {
            let days = days_remaining_signed(exam.date, now);

            let relevant: Vec<&TopicMasteryRow> = mastery
                .iter()
                .filter(|m| {
                    m.subject == exam.subject
                        && exam.topic.as_deref().map_or(true, |t| {
                            m.topic.to_lowercase().contains(&t.to_lowercase())
                        })
                })
                .collect();

            let avg_mastery = if relevant.is_empty() {
                0.0
            } else {
                relevant.iter().map(|m| m.score as f64).sum::<f64>() / relevant.len() as f64
            };

            // More remaining time contributes a small "you still have room"
            // bonus, capped at 30 points and inversely proportional to days.
            let time_factor = if days > 0 {
                (30.0 / days as f64 * 10.0).min(30.0)
            } else {
                0.0
            };
            let progress = ((avg_mastery * 0.7 + time_factor).round() as i64).clamp(0, 100);

            let gap_analysis: Vec<String> = relevant
                .iter()
                .filter(|m| m.score < 60)
                .map(|m| format!("{} ({}%)", m.topic, m.score))
                .collect();

            ExamThreatSnapshot {
                exam_id: exam.id.clone(),
                subject: exam.subject.clone(),
                topic: exam.topic.clone(),
                date: exam.date,
                days_remaining: days.max(0),
                threat_level: threat_level(days, avg_mastery),
                current_progress: progress,
                prediction: predict_outcome(avg_mastery, days),
                gap_analysis,
                recommended_hours: recommended_hours(avg_mastery, days),
            }
        })
        .collect()
}

/// Signed days until the exam: `ceil((date - now) / 1 day)`. Negative for
/// past exams — callers exclude those from "upcoming" listings, but the
/// calculator itself does not fail on them.
pub fn days_remaining_signed(date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    ((date - now).num_seconds() as f64 / 86_400.0).ceil() as i64
}

/// First match wins, evaluated in this order.
fn threat_level(days_remaining: i64, avg_mastery: f64) -> ThreatLevel {
    if days_remaining <= 5 && avg_mastery < 60.0 {
        ThreatLevel::Critical
    } else if days_remaining <= 7 || avg_mastery < 50.0 {
        ThreatLevel::High
    } else if days_remaining <= 14 || avg_mastery < 70.0 {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

/// Grade-band prediction: current mastery, +10 with over two weeks left,
/// −5 under time pressure, clamped to [0, 100].
pub fn predict_outcome(avg_mastery: f64, days_remaining: i64) -> String {
    let mut predicted = avg_mastery;
    if days_remaining > 14 {
        predicted += 10.0;
    } else if days_remaining < 3 {
        predicted -= 5.0;
    }
    let predicted = predicted.clamp(0.0, 100.0);

    if predicted >= 90.0 {
        "A+ (90-100%)".to_string()
    } else if predicted >= 80.0 {
        "A (80-89%)".to_string()
    } else if predicted >= 70.0 {
        "B (70-79%)".to_string()
    } else if predicted >= 60.0 {
        "C (60-69%)".to_string()
    } else if predicted >= 50.0 {
        "D (50-59%)".to_string()
    } else {
        "F (<50%)".to_string()
    }
}

/// Hours per day needed to close the gap to the target mastery, spread across
/// the remaining days (total hours when the exam is today or past).
fn recommended_hours(avg_mastery: f64, days_remaining: i64) -> i64 {
    let gap = TARGET_MASTERY - avg_mastery;
    if gap <= 0.0 {
        return 0;
    }
    let total_hours = (gap * MINUTES_PER_POINT / 60.0).ceil();
    if days_remaining > 0 {
        (total_hours / days_remaining as f64).ceil() as i64
    } else {
        total_hours as i64
    }
}

/// Highest threat level present across all snapshots; `None` without exams.
pub fn exam_proximity(threats: &[ExamThreatSnapshot]) -> ExamProximity {
    match threats.iter().map(|t| t.threat_level).max() {
        Some(ThreatLevel::Critical) => ExamProximity::Critical,
        Some(ThreatLevel::High) => ExamProximity::High,
        Some(ThreatLevel::Medium) => ExamProximity::Medium,
        Some(ThreatLevel::Low) | None => ExamProximity::None,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn exam(subject: &str, topic: Option<&str>, days_out: i64, now: DateTime<Utc>) -> ExamRow {
        ExamRow {
            id: format!("exam-{subject}"),
            user_id: "u1".into(),
            subject: subject.into(),
            topic: topic.map(str::to_string),
            date: now + Duration::days(days_out),
            weight: 100.0,
            target_grade: None,
            days_remaining: None,
            threat_level: None,
            progress: None,
            prediction: None,
            created_at: now,
        }
    }

    fn mastery(subject: &str, topic: &str, score: i64, now: DateTime<Utc>) -> TopicMasteryRow {
        TopicMasteryRow {
            id: format!("m-{subject}-{topic}"),
            user_id: "u1".into(),
            subject: subject.into(),
            topic: topic.into(),
            score,
            confidence: 50,
            sessions_count: 1,
            total_minutes: 30,
            last_studied: now,
            easiness: 2.5,
            interval_days: 0,
            next_review: None,
            review_count: 0,
        }
    }

    #[test]
    fn chemistry_in_three_days_at_55_is_critical() {
        let now = Utc::now();
        let exams = vec![exam("Chemistry", None, 3, now)];
        let rows = vec![
            mastery("Chemistry", "Organic Reactions", 50, now),
            mastery("Chemistry", "Stoichiometry", 60, now),
        ];

        let threats = compute_exam_threats(&exams, &rows, now);
        assert_eq!(threats.len(), 1);
        let t = &threats[0];
        assert_eq!(t.threat_level, ThreatLevel::Critical);
        assert_eq!(t.prediction, "D (50-59%)");
        assert!(!t.gap_analysis.is_empty());
        assert!(t.gap_analysis[0].contains("Organic Reactions"));
    }

    #[test]
    fn missing_mastery_means_zero_not_error() {
        let now = Utc::now();
        let exams = vec![exam("Latin", None, 20, now)];
        let threats = compute_exam_threats(&exams, &[], now);
        // avg 0 → HIGH via the mastery branch even with plenty of time.
        assert_eq!(threats[0].threat_level, ThreatLevel::High);
        assert_eq!(threats[0].prediction, "F (<50%)");
        assert!(threats[0].gap_analysis.is_empty());
    }

    #[test]
    fn topic_filter_is_substring_case_insensitive() {
        let now = Utc::now();
        let exams = vec![exam("Maths", Some("algebra"), 10, now)];
        let rows = vec![
            mastery("Maths", "Linear Algebra", 90, now),
            mastery("Maths", "Geometry", 10, now),
        ];
        let threats = compute_exam_threats(&exams, &rows, now);
        // Only the algebra row matches, so avg is 90 and the gap list is empty.
        assert!(threats[0].gap_analysis.is_empty());
        assert_eq!(threats[0].recommended_hours, 0);
    }

    #[test]
    fn progress_stays_in_range() {
        let now = Utc::now();
        let exams = vec![exam("Physics", None, 1, now)];
        let rows = vec![mastery("Physics", "Waves", 100, now)];
        let threats = compute_exam_threats(&exams, &rows, now);
        assert!((0..=100).contains(&threats[0].current_progress));
        assert!(threats[0].days_remaining >= 0);
    }

    #[test]
    fn past_exam_floors_display_days_at_zero() {
        let now = Utc::now();
        let exams = vec![exam("History", None, -2, now)];
        let threats = compute_exam_threats(&exams, &[], now);
        assert_eq!(threats[0].days_remaining, 0);
    }

    #[test]
    fn threat_is_monotonic_in_time_pressure() {
        let order = |l: ThreatLevel| l as u8;
        for &avg in &[0.0, 45.0, 55.0, 65.0, 75.0, 100.0] {
            let mut prev = threat_level(60, avg);
            for days in (0..60).rev() {
                let level = threat_level(days, avg);
                assert!(
                    order(level) >= order(prev),
                    "threat dropped from {prev:?} to {level:?} at {days} days (avg {avg})"
                );
                prev = level;
            }
        }
    }

    #[test]
    fn prediction_rewards_runway_and_penalizes_cram() {
        assert_eq!(predict_outcome(75.0, 20), "A (80-89%)");
        assert_eq!(predict_outcome(75.0, 10), "B (70-79%)");
        assert_eq!(predict_outcome(52.0, 2), "F (<50%)");
    }

    #[test]
    fn recommended_hours_spread_across_days() {
        // Gap of 30 points → 900 minutes → 15 hours over 5 days → 3/day.
        assert_eq!(recommended_hours(50.0, 5), 3);
        // Exam today: the full total, not a division by zero.
        assert_eq!(recommended_hours(50.0, 0), 15);
        assert_eq!(recommended_hours(90.0, 5), 0);
    }

    #[test]
    fn proximity_is_highest_level_present() {
        let now = Utc::now();
        let exams = vec![exam("A", None, 30, now), exam("B", None, 6, now)];
        let rows = vec![
            mastery("A", "T1", 80, now),
            mastery("B", "T2", 80, now),
        ];
        let threats = compute_exam_threats(&exams, &rows, now);
        assert_eq!(exam_proximity(&threats), ExamProximity::High);
        assert_eq!(exam_proximity(&[]), ExamProximity::None);
    }
}
