//! The four coaching generators. All pure: the caller supplies the intel
//! state and the clock, so regeneration is reproducible.

use chrono::{DateTime, Timelike, Utc};
use serde_json::json;

use crate::intel::UserIntelState;
use crate::mastery::TopicScore;
use crate::threat::{ExamThreatSnapshot, ThreatLevel};

use super::model::{
    CoachingAction, CoachingMessageData, CoachingPlan, MessageKind, Priority, WeakArea,
};

/// Exam-prep plans aim for this mastery level.
const PREP_TARGET_MASTERY: f64 = 75.0;

/// Run every generator and return the combined list, highest priority first
/// (stable for ties, so generator order is preserved within a tier).
pub fn generate_coaching_plans(
    intel: &UserIntelState,
    now: DateTime<Utc>,
) -> Vec<CoachingMessageData> {
    let mut messages = Vec::new();
    messages.extend(exam_prep_messages(intel));
    messages.extend(drift_recovery_messages(intel, now));
    messages.extend(momentum_messages(intel, now));
    messages.extend(consistency_messages(intel));
    messages.sort_by_key(|m| m.priority);
    messages
}

fn subjects_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

// ─── Exam prep ────────────────────────────────────────────────────────────────

/// One message per exam within 14 days that has at least one weak topic in
/// its subject.
fn exam_prep_messages(intel: &UserIntelState) -> Vec<CoachingMessageData> {
    let mut messages = Vec::new();

    for exam in &intel.exams {
        if exam.days_remaining > 14 {
            continue;
        }

        let weak_areas: Vec<WeakArea> = intel
            .mastery
            .weak_topics
            .iter()
            .filter(|t| subjects_match(&exam.subject, &t.subject))
            .map(|t| WeakArea {
                topic: t.topic.clone(),
                mastery: t.score,
            })
            .collect();

        if weak_areas.is_empty() {
            continue;
        }

        let avg_mastery =
            weak_areas.iter().map(|a| a.mastery as f64).sum::<f64>() / weak_areas.len() as f64;
        let gain_needed = (PREP_TARGET_MASTERY - avg_mastery).max(0.0);
        // 10 focused minutes buy roughly 15 points of gain.
        let daily_minutes = ((gain_needed / 15.0 * 10.0).ceil() as i64).min(30);
        let total_minutes = daily_minutes * exam.days_remaining;
        let predicted_gain =
            (gain_needed.ceil() as i64).min((total_minutes as f64 / 10.0 * 15.0).ceil() as i64);

        let priority =
            if exam.threat_level == ThreatLevel::Critical || exam.days_remaining <= 3 {
                Priority::High
            } else {
                Priority::Medium
            };

        let plural = if exam.days_remaining == 1 { "" } else { "s" };
        let topics: Vec<String> = weak_areas.iter().map(|a| a.topic.clone()).collect();
        let difficulty = if avg_mastery < 50.0 { "easy" } else { "medium" };

        messages.push(CoachingMessageData {
            kind: MessageKind::ExamPrep,
            priority,
            title: format!(
                "{} Exam in {} Day{plural}",
                exam.subject, exam.days_remaining
            ),
            context: serde_json::Value::Null,
            plan: CoachingPlan {
                description: format!(
                    "{daily_minutes} min/day focused practice ({} days)",
                    exam.days_remaining
                ),
                total_minutes,
                predicted_gain: Some(predicted_gain),
                breakdown: Some(exam_breakdown(&weak_areas, exam.days_remaining)),
                reasoning: None,
                urgency: None,
            },
            actions: vec![
                CoachingAction {
                    kind: "flashcards".into(),
                    label: "Generate Flashcards".into(),
                    payload: json!({ "topics": topics, "count": 20, "difficulty": difficulty }),
                },
                CoachingAction {
                    kind: "quiz".into(),
                    label: "Start Quiz".into(),
                    payload: json!({ "topics": topics, "questions": 10, "adaptive": true }),
                },
                CoachingAction {
                    kind: "deep_dive".into(),
                    label: "Deep Dive Lesson".into(),
                    payload: json!({ "topic": weak_areas[0].topic }),
                },
            ],
            weak_areas,
        });
    }

    messages
}

/// Split the remaining days evenly across weak topics; remainder days go to
/// the first topics, any unallocated tail becomes mixed review.
fn exam_breakdown(weak_areas: &[WeakArea], days: i64) -> Vec<String> {
    if days <= 2 {
        return vec![format!(
            "Days 1-{}: Focus on all weak areas with mixed review",
            days.max(1)
        )];
    }

    let n = weak_areas.len() as i64;
    let days_per_topic = days / n;
    let remainder = days % n;

    let mut breakdown = Vec::new();
    let mut current = 1i64;
    for (i, area) in weak_areas.iter().enumerate() {
        let topic_days = days_per_topic + if (i as i64) < remainder { 1 } else { 0 };
        if topic_days == 0 {
            continue;
        }
        let end = current + topic_days - 1;
        let focus = if i == 0 { "fundamentals" } else { "practice" };
        breakdown.push(if current == end {
            format!("Day {current}: {} {focus}", area.topic)
        } else {
            format!("Days {current}-{end}: {} {focus}", area.topic)
        });
        current = end + 1;
    }

    if current <= days {
        breakdown.push(if current == days {
            format!("Day {days}: Mixed review")
        } else {
            format!("Days {current}-{days}: Mixed review")
        });
    }

    breakdown
}

// ─── Drift recovery ───────────────────────────────────────────────────────────

/// A recovery message per subject that has gone quiet for 3+ days while a
/// related exam sits within 30 days.
fn drift_recovery_messages(
    intel: &UserIntelState,
    now: DateTime<Utc>,
) -> Vec<CoachingMessageData> {
    // Most recent session per subject.
    let mut last_by_subject: std::collections::HashMap<&str, (DateTime<Utc>, i64)> =
        std::collections::HashMap::new();
    for s in &intel.recent_sessions {
        let entry = last_by_subject
            .entry(s.subject.as_str())
            .or_insert((s.created_at, s.minutes));
        if s.created_at > entry.0 {
            *entry = (s.created_at, s.minutes);
        }
    }

    let mut messages = Vec::new();
    for (subject, (last_date, last_minutes)) in last_by_subject {
        let days_stale = (now - last_date).num_days();
        if days_stale < 3 {
            continue;
        }

        let Some(exam) = intel
            .exams
            .iter()
            .find(|e| subjects_match(&e.subject, subject) && e.days_remaining <= 30)
        else {
            continue;
        };

        // Unrefreshed knowledge fades about 2% a day, flattening out at 15%.
        let mastery_decay = (days_stale * 2).min(15);

        messages.push(CoachingMessageData {
            kind: MessageKind::DriftRecovery,
            priority: if days_stale >= 5 {
                Priority::High
            } else {
                Priority::Medium
            },
            title: format!("{days_stale}-Day Drift on {subject}"),
            weak_areas: vec![],
            context: json!({
                "lastSessionDate": last_date.format("%Y-%m-%d").to_string(),
                "lastDuration": format!("{last_minutes} min"),
                "masteryDecay": format!("-{mastery_decay}%"),
                "examDays": exam.days_remaining,
            }),
            plan: CoachingPlan {
                description: "15 min recovery session today to stop decay".into(),
                total_minutes: 15,
                predicted_gain: None,
                breakdown: None,
                reasoning: None,
                urgency: Some("Recovery session - prevent further mastery loss".into()),
            },
            actions: vec![
                CoachingAction {
                    kind: "quick_review".into(),
                    label: "Quick Review".into(),
                    payload: json!({ "topic": subject, "duration": 15 }),
                },
                CoachingAction {
                    kind: "video".into(),
                    label: "Watch Explanation".into(),
                    payload: json!({ "topic": subject }),
                },
                CoachingAction {
                    kind: "flashcards".into(),
                    label: "Flashcard Review".into(),
                    payload: json!({ "topics": [subject], "count": 10, "difficulty": "easy" }),
                },
            ],
        });
    }

    messages
}

// ─── Momentum ─────────────────────────────────────────────────────────────────

/// A single high-priority push when the current hour sits inside a recorded
/// peak-performance window and there is a weakest topic to attack.
fn momentum_messages(intel: &UserIntelState, now: DateTime<Utc>) -> Vec<CoachingMessageData> {
    let current_hour = now.hour();
    let in_peak = intel
        .study_patterns
        .peak_study_windows
        .iter()
        .any(|w| w.hour == current_hour);
    if !in_peak {
        return vec![];
    }

    let Some(TopicScore { topic, score, .. }) = intel.mastery.weak_topics.first() else {
        return vec![];
    };

    let window_label = intel
        .study_patterns
        .peak_study_windows
        .iter()
        .find(|w| w.hour == current_hour)
        .map(|w| w.time.clone())
        .unwrap_or_default();

    vec![CoachingMessageData {
        kind: MessageKind::Momentum,
        priority: Priority::High,
        title: "Peak Performance Window".into(),
        weak_areas: vec![WeakArea {
            topic: topic.clone(),
            mastery: *score,
        }],
        context: json!({
            "peakWindow": window_label,
            "currentTopic": topic,
            "currentMastery": format!("{score}%"),
        }),
        plan: CoachingPlan {
            description: format!("Attack hardest topic now: {topic}"),
            total_minutes: 30,
            predicted_gain: None,
            breakdown: None,
            reasoning: Some(
                "Cognitive performance peak detected - optimal time for difficult material"
                    .into(),
            ),
            urgency: None,
        },
        actions: vec![
            CoachingAction {
                kind: "deep_dive".into(),
                label: "Start Deep Dive".into(),
                payload: json!({ "topic": topic }),
            },
            CoachingAction {
                kind: "scan".into(),
                label: "Scan Problems".into(),
                payload: json!({ "topic": topic }),
            },
            CoachingAction {
                kind: "quiz".into(),
                label: "Challenge Quiz".into(),
                payload: json!({ "topics": [topic], "questions": 5, "adaptive": true }),
            },
        ],
    }]
}

// ─── Consistency ──────────────────────────────────────────────────────────────

/// One low-priority habit builder when the consistency score is under 70.
fn consistency_messages(intel: &UserIntelState) -> Vec<CoachingMessageData> {
    let score = intel.study_patterns.consistency_score;
    if score >= 70 {
        return vec![];
    }

    vec![CoachingMessageData {
        kind: MessageKind::Consistency,
        priority: Priority::Low,
        title: "Build Study Consistency".into(),
        weak_areas: vec![],
        context: json!({
            "currentStreak": intel.streaks.current,
            "targetStreak": 7,
            "consistencyScore": format!("{score}%"),
        }),
        plan: CoachingPlan {
            description: "5 min daily check-ins for 7 days".into(),
            total_minutes: 35,
            predicted_gain: Some(25),
            breakdown: None,
            reasoning: Some("Small daily wins build long-term habits".into()),
            urgency: None,
        },
        actions: vec![
            CoachingAction {
                kind: "micro_session".into(),
                label: "Start 5-Min Session".into(),
                payload: json!({ "duration": 5 }),
            },
            CoachingAction {
                kind: "flashcards".into(),
                label: "Quick Flashcards".into(),
                payload: json!({ "count": 5, "difficulty": "easy" }),
            },
        ],
    }]
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DirectionTrend, RiskTag, UserIdentitySnapshot};
    use crate::identity::rules::Archetype;
    use crate::mastery::MasteryMap;
    use crate::patterns::{StudyPatternSnapshot, StudyStreaks, TimeWindow};
    use crate::semantic::SemanticThreads;
    use crate::storage::StudySessionRow;
    use crate::threat::ExamProximity;
    use chrono::Duration;

    fn base_state(now: DateTime<Utc>) -> UserIntelState {
        UserIntelState {
            user_id: "u1".into(),
            identity: UserIdentitySnapshot {
                archetype: Archetype::DriftCycler,
                confidence: 50,
                direction: "Maintaining current pace".into(),
                direction_trend: DirectionTrend::Stable,
                drivers: vec![],
                risk_tag: RiskTag::Safe,
            },
            exams: vec![],
            exam_proximity: ExamProximity::None,
            study_patterns: StudyPatternSnapshot {
                peak_study_windows: vec![],
                drift_windows: vec![],
                consistency_score: 80,
                procrastination_triggers: vec![],
                return_protocols: vec![],
                average_session_minutes: 40,
                best_subjects: vec![],
                struggle_subjects: vec![],
                optimal_session_length: 45,
                last_analyzed: now,
            },
            mastery: MasteryMap::default(),
            semantic_threads: SemanticThreads::default(),
            recent_sessions: vec![],
            today_minutes: 0,
            weekly_minutes: 0,
            weekly_target: 600,
            streaks: StudyStreaks::default(),
        }
    }

    fn threat(subject: &str, days: i64, level: ThreatLevel, now: DateTime<Utc>) -> ExamThreatSnapshot {
        ExamThreatSnapshot {
            exam_id: format!("e-{subject}"),
            subject: subject.into(),
            topic: None,
            date: now + Duration::days(days),
            days_remaining: days,
            threat_level: level,
            current_progress: 40,
            prediction: "C (60-69%)".into(),
            gap_analysis: vec![],
            recommended_hours: 2,
        }
    }

    fn weak(subject: &str, topic: &str, score: i64) -> TopicScore {
        TopicScore {
            subject: subject.into(),
            topic: topic.into(),
            score,
        }
    }

    #[test]
    fn exam_prep_skips_far_exams_and_covered_subjects() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.exams = vec![
            threat("Chemistry", 20, ThreatLevel::Low, now),
            threat("History", 5, ThreatLevel::Medium, now),
        ];
        state.mastery.weak_topics = vec![weak("Chemistry", "Organic", 40)];

        // Chemistry exam is >14 days out; History has no weak topics.
        assert!(exam_prep_messages(&state).is_empty());
    }

    #[test]
    fn exam_prep_builds_capped_daily_plan() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.exams = vec![threat("Chemistry", 5, ThreatLevel::Medium, now)];
        state.mastery.weak_topics = vec![
            weak("Chemistry", "Organic", 30),
            weak("Chemistry", "Acids", 40),
        ];

        let messages = exam_prep_messages(&state);
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.priority, Priority::Medium);
        assert_eq!(msg.title, "Chemistry Exam in 5 Days");
        // Gain needed 40 → ceil(40/15 × 10) = 27 min/day, under the 30 cap.
        assert_eq!(msg.plan.description, "27 min/day focused practice (5 days)");
        assert_eq!(msg.plan.total_minutes, 135);
        assert_eq!(msg.weak_areas.len(), 2);
        assert_eq!(msg.actions.len(), 3);

        let breakdown = msg.plan.breakdown.as_ref().unwrap();
        // 5 days over 2 topics → 3 + 2.
        assert_eq!(breakdown[0], "Days 1-3: Organic fundamentals");
        assert_eq!(breakdown[1], "Days 4-5: Acids practice");
    }

    #[test]
    fn critical_or_imminent_exams_are_high_priority() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.exams = vec![threat("Chemistry", 2, ThreatLevel::Medium, now)];
        state.mastery.weak_topics = vec![weak("Chemistry", "Organic", 30)];
        assert_eq!(exam_prep_messages(&state)[0].priority, Priority::High);

        state.exams = vec![threat("Chemistry", 6, ThreatLevel::Critical, now)];
        assert_eq!(exam_prep_messages(&state)[0].priority, Priority::High);
    }

    #[test]
    fn short_runway_collapses_breakdown() {
        let areas = vec![
            WeakArea { topic: "A".into(), mastery: 30 },
            WeakArea { topic: "B".into(), mastery: 40 },
        ];
        let lines = exam_breakdown(&areas, 2);
        assert_eq!(lines, vec!["Days 1-2: Focus on all weak areas with mixed review"]);
    }

    #[test]
    fn drift_recovery_needs_staleness_and_a_nearby_exam() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.exams = vec![threat("Chemistry", 10, ThreatLevel::Medium, now)];
        state.recent_sessions = vec![StudySessionRow {
            id: "s1".into(),
            user_id: "u1".into(),
            subject: "Chemistry".into(),
            topic: None,
            minutes: 40,
            effectiveness: Some(6),
            notes: None,
            created_at: now - Duration::days(4),
        }];

        let messages = drift_recovery_messages(&state, now);
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.priority, Priority::Medium);
        assert_eq!(msg.title, "4-Day Drift on Chemistry");
        assert_eq!(msg.context["masteryDecay"], "-8%");

        // Fresh activity clears the drift.
        state.recent_sessions[0].created_at = now - Duration::days(1);
        assert!(drift_recovery_messages(&state, now).is_empty());
    }

    #[test]
    fn long_drift_is_high_priority_and_decay_is_capped() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.exams = vec![threat("Chemistry", 10, ThreatLevel::Medium, now)];
        state.recent_sessions = vec![StudySessionRow {
            id: "s1".into(),
            user_id: "u1".into(),
            subject: "Chemistry".into(),
            topic: None,
            minutes: 40,
            effectiveness: None,
            notes: None,
            created_at: now - Duration::days(10),
        }];

        let messages = drift_recovery_messages(&state, now);
        assert_eq!(messages[0].priority, Priority::High);
        assert_eq!(messages[0].context["masteryDecay"], "-15%");
    }

    #[test]
    fn momentum_fires_only_inside_peak_window() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.mastery.weak_topics = vec![weak("Maths", "Algebra", 35)];
        state.study_patterns.peak_study_windows = vec![TimeWindow {
            hour: now.hour(),
            time: format!("{:02}:00", now.hour()),
            description: "High productivity (4 sessions, 8.0/10 avg)".into(),
            frequency: 4,
            effectiveness: Some(8.0),
        }];

        let messages = momentum_messages(&state, now);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].priority, Priority::High);
        assert!(messages[0].plan.description.contains("Algebra"));

        // Shift the window an hour away and nothing fires.
        state.study_patterns.peak_study_windows[0].hour = (now.hour() + 1) % 24;
        assert!(momentum_messages(&state, now).is_empty());
    }

    #[test]
    fn consistency_message_below_threshold_only() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.study_patterns.consistency_score = 50;
        let messages = consistency_messages(&state);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].priority, Priority::Low);
        assert_eq!(messages[0].plan.total_minutes, 35);
        assert_eq!(messages[0].plan.predicted_gain, Some(25));

        state.study_patterns.consistency_score = 70;
        assert!(consistency_messages(&state).is_empty());
    }

    #[test]
    fn combined_output_sorted_high_to_low() {
        let now = Utc::now();
        let mut state = base_state(now);
        state.study_patterns.consistency_score = 40;
        state.exams = vec![threat("Chemistry", 5, ThreatLevel::Medium, now)];
        state.mastery.weak_topics = vec![weak("Chemistry", "Organic", 30)];
        state.recent_sessions = vec![StudySessionRow {
            id: "s1".into(),
            user_id: "u1".into(),
            subject: "Chemistry".into(),
            topic: None,
            minutes: 40,
            effectiveness: None,
            notes: None,
            created_at: now - Duration::days(6),
        }];

        let messages = generate_coaching_plans(&state, now);
        assert!(messages.len() >= 3);
        for pair in messages.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
        assert_eq!(messages.last().unwrap().kind, MessageKind::Consistency);
    }
}
