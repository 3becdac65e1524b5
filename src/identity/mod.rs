//! Behavioral identity — classifies a learner's study habits into a discrete
//! archetype with confidence, trend direction, drivers, and a risk tag.
//!
//! The archetype decision is an ordered rule table evaluated first-match-wins
//! (see [`rules`]), never a blended score.

pub mod rules;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::mastery::MasteryMap;
use crate::patterns::StudyPatternSnapshot;
use crate::semantic::SemanticThreads;
use crate::storage::StudySessionRow;
use crate::threat::ExamThreatSnapshot;

pub use rules::Archetype;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionTrend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTag {
    #[serde(rename = "Safe")]
    Safe,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Red Zone Before Exam")]
    RedZoneBeforeExam,
}

impl RiskTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTag::Safe => "Safe",
            RiskTag::AtRisk => "At Risk",
            RiskTag::RedZoneBeforeExam => "Red Zone Before Exam",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentitySnapshot {
    pub archetype: Archetype,
    /// How much signal backs the classification, 0–100.
    pub confidence: i64,
    pub direction: String,
    pub direction_trend: DirectionTrend,
    /// Up to 3 human-readable behavioral drivers.
    pub drivers: Vec<String>,
    pub risk_tag: RiskTag,
}

/// Compute the full identity snapshot.
///
/// `_threads` is part of the contract surface (the classifier may consume
/// semantic signals in future rules) but no current rule reads it.
pub fn compute_identity(
    patterns: &StudyPatternSnapshot,
    threats: &[ExamThreatSnapshot],
    mastery: &MasteryMap,
    _threads: &SemanticThreads,
    sessions: &[StudySessionRow],
    now: DateTime<Utc>,
) -> UserIdentitySnapshot {
    let archetype = rules::detect_archetype(patterns, mastery, threats);
    let confidence = confidence(patterns, sessions);
    let (direction, direction_trend) = direction(patterns, sessions, now);
    let drivers = rules::extract_drivers(patterns);
    let risk_tag = rules::assign_risk_tag(threats, mastery, patterns);

    UserIdentitySnapshot {
        archetype,
        confidence,
        direction,
        direction_trend,
        drivers,
        risk_tag,
    }
}

/// Confidence in the classification. Forced to 50 with zero sessions — the
/// habits cannot be assessed yet, so the score is deliberately neutral.
pub fn confidence(patterns: &StudyPatternSnapshot, sessions: &[StudySessionRow]) -> i64 {
    if sessions.is_empty() {
        return 50;
    }

    let consistency_factor = patterns.consistency_score as f64 * 0.4;
    let frequency_factor = (sessions.len() as f64 / 30.0).min(1.0) * 30.0;
    let peak_bonus = if patterns.peak_study_windows.is_empty() {
        0.0
    } else {
        20.0
    };
    let drift_penalty = patterns.drift_windows.len() as f64 * 5.0;

    ((consistency_factor + frequency_factor + peak_bonus - drift_penalty).round() as i64)
        .clamp(0, 100)
}

/// Momentum direction over the trailing week.
pub fn direction(
    patterns: &StudyPatternSnapshot,
    sessions: &[StudySessionRow],
    now: DateTime<Utc>,
) -> (String, DirectionTrend) {
    let week_ago = now - Duration::days(7);
    let recent = sessions.iter().filter(|s| s.created_at > week_ago).count();

    if patterns.consistency_score > 70 && recent >= 5 {
        ("Becoming more consistent".to_string(), DirectionTrend::Up)
    } else if patterns.consistency_score < 40 || recent < 2 {
        ("Losing momentum".to_string(), DirectionTrend::Down)
    } else {
        ("Maintaining current pace".to_string(), DirectionTrend::Stable)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
