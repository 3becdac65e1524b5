//! Coaching data models — serialisable types persisted as message content.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Message urgency. Ordered so that sorting ascending yields high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// The four coaching generators, doubling as the persisted message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ExamPrep,
    DriftRecovery,
    Momentum,
    Consistency,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ExamPrep => "exam_prep",
            MessageKind::DriftRecovery => "drift_recovery",
            MessageKind::Momentum => "momentum",
            MessageKind::Consistency => "consistency",
        }
    }

    /// How long a stored message of this kind stays relevant. Momentum
    /// windows close fast; consistency habits span the week.
    pub fn ttl(&self) -> Duration {
        match self {
            MessageKind::Momentum => Duration::hours(2),
            MessageKind::ExamPrep => Duration::hours(24),
            MessageKind::DriftRecovery => Duration::hours(12),
            MessageKind::Consistency => Duration::days(7),
        }
    }
}

/// TTL for a persisted kind string; unrecognized kinds get the 24h default.
pub fn ttl_for_kind(kind: &str) -> Duration {
    match kind {
        "momentum" => Duration::hours(2),
        "exam_prep" => Duration::hours(24),
        "drift_recovery" => Duration::hours(12),
        "consistency" => Duration::days(7),
        _ => Duration::hours(24),
    }
}

/// A weak topic attached to a message, with its current mastery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakArea {
    pub topic: String,
    pub mastery: i64,
}

/// The actionable plan inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingPlan {
    pub description: String,
    /// Total invested time the plan asks for, in minutes.
    pub total_minutes: i64,
    /// Predicted mastery or consistency gain, percentage points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_gain: Option<i64>,
    /// Day-by-day topic breakdown (exam prep only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

/// A suggested action the frontend can execute. Opaque to this core — the
/// payload is handed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub payload: serde_json::Value,
}

/// One generated coaching message, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingMessageData {
    pub kind: MessageKind,
    pub priority: Priority,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weak_areas: Vec<WeakArea>,
    /// Kind-specific display context (decay estimates, window labels).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
    pub plan: CoachingPlan,
    pub actions: Vec<CoachingAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_sorts_high_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn ttls_match_message_half_life() {
        assert_eq!(MessageKind::Momentum.ttl(), Duration::hours(2));
        assert_eq!(MessageKind::Consistency.ttl(), Duration::days(7));
        assert_eq!(ttl_for_kind("drift_recovery"), Duration::hours(12));
        assert_eq!(ttl_for_kind("something_else"), Duration::hours(24));
    }

    #[test]
    fn message_roundtrips_through_json() {
        let msg = CoachingMessageData {
            kind: MessageKind::ExamPrep,
            priority: Priority::High,
            title: "Chemistry Exam in 3 Days".into(),
            weak_areas: vec![WeakArea {
                topic: "Organic Reactions".into(),
                mastery: 40,
            }],
            context: serde_json::Value::Null,
            plan: CoachingPlan {
                description: "20 min/day focused practice (3 days)".into(),
                total_minutes: 60,
                predicted_gain: Some(30),
                breakdown: Some(vec!["Days 1-3: Organic Reactions fundamentals".into()]),
                reasoning: None,
                urgency: None,
            },
            actions: vec![CoachingAction {
                kind: "quiz".into(),
                label: "Start Quiz".into(),
                payload: serde_json::json!({ "questions": 10 }),
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"quiz\""));
        let back: CoachingMessageData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
