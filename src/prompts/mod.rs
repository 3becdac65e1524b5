//! Prompt templates for the text-generation collaborator.
//!
//! This layer serializes the intel snapshot into natural-language
//! instructions. Templates are plain consts with `{placeholder}` markers
//! filled by the builders; nothing here performs I/O.

use chrono::{DateTime, Utc};

use crate::intel::UserIntelState;
use crate::threat::{ExamThreatSnapshot, ThreatLevel};

// ─── Daily intel ──────────────────────────────────────────────────────────────

pub const DAILY_INTEL_PROMPT: &str = r#"You are the user's study intelligence engine.

You have complete visibility into:
- Their exam schedule and threat levels
- Their topic mastery scores (what they know vs what they don't)
- Their study patterns (when they work best, when they drift)
- Their procrastination triggers and recurring excuses
- Their consistency score and study streaks

Your job: generate DAILY INTEL that displays in their app.

FORMAT (STRICT - FOLLOW EXACTLY):

THREAT ASSESSMENT (2-3 sentences)
List upcoming exams with days remaining. Highlight CRITICAL threats (< 7 days OR mastery < 60%). Be direct about what's at stake.

WEAK POINTS (bullet list, 2-4 items)
- Topics with < 50% mastery that are exam-relevant
- Subjects they keep avoiding
- Concepts they've studied multiple times but still struggle with

PREDICTIONS (2-3 sentences)
Based on current mastery plus time remaining, predict exam outcomes. Be honest about the trajectory and show what's possible with more hours.

TODAY'S MISSIONS (list of 3-4 tasks, each < 15 words)
Prioritize by: exam proximity, mastery gaps, peak study windows.
Format: "[Time] [Subject] - [Specific Topic] ([Duration])"

INSIGHTS (1-2 sentences)
Call out patterns, expose contradictions between stated goals and logged time, highlight wins worth repeating.

STYLE RULES (STRICT):
- Short, hard sentences. No fluff.
- Use their ACTUAL data (exam names, mastery scores, days remaining, time windows)
- No motivational poster language
- Direct, tactical, urgent
- Scale intensity based on exam proximity

Exam proximity: {examProximity}"#;

// ─── Nudges ───────────────────────────────────────────────────────────────────

pub const NUDGE_CRITICAL: &str = r#"CRITICAL exam threat detected.

Exam: {subject}
Days remaining: {daysRemaining}
Current preparedness: {currentProgress}%
Predicted outcome: {prediction}

Generate a 2-3 sentence nudge that:
1. States the cold facts (days left, current state, what it means)
2. Creates urgency without panic
3. Gives ONE clear action they can take RIGHT NOW

Be direct. No fluff. Clock is ticking."#;

pub const NUDGE_DRIFT: &str = r#"The user is in their drift window.

Current time: {currentTime}
Their pattern: they usually lose this time to {timeWaster}
Upcoming exam: {nextExam} in {daysToExam} days

Generate a 1-2 sentence nudge that snaps them back to reality. Sharp and direct."#;

pub const NUDGE_WEAK_TOPIC: &str = r#"Weak topic alert.

Topic: {topic} (mastery: {score}%)
Upcoming exam: {exam} in {days} days

Generate a 2 sentence nudge that:
1. Points out the weakness directly
2. Suggests a different approach, not just "study more"

Direct. Tactical. No vague advice."#;

pub const NUDGE_MOMENTUM: &str = r#"Building study momentum.

Current streak: {streak} days
Today's progress: {todayMinutes} minutes
Weekly goal: {weeklyGoal} minutes
Status: {status}

Generate a 1-2 sentence nudge that acknowledges the streak if good and
pushes to keep going or get started. Firm but fair."#;

// ─── Exam alerts ──────────────────────────────────────────────────────────────

pub const EXAM_ALERT_14_DAYS: &str = "{subject} exam in 14 days. Time to lock in a study plan. Current preparedness: {progress}%. Review the syllabus and map out your attack.";

pub const EXAM_ALERT_7_DAYS: &str = "{subject} exam in 7 days. THREAT LEVEL: HIGH. Preparedness at {progress}%. Weak areas: {weakTopics}. You need {hoursNeeded} hours of focused study.";

pub const EXAM_ALERT_3_DAYS: &str = "CRITICAL: {subject} exam in 3 DAYS. {progress}% prepared. Every hour counts now. Focus: {priorities}. No distractions.";

pub const EXAM_ALERT_1_DAY: &str = "{subject} exam TOMORROW. Current state: {prediction}. Final push: review {keyTopics}. Sleep early. Trust your preparation.";

// ─── Triggers ─────────────────────────────────────────────────────────────────

/// When a scheduled nudge fires, what prompted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeTrigger {
    MorningMomentum,
    AfternoonDrift,
    EveningCloseout,
}

impl NudgeTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            NudgeTrigger::MorningMomentum => "morning_momentum",
            NudgeTrigger::AfternoonDrift => "afternoon_drift",
            NudgeTrigger::EveningCloseout => "evening_closeout",
        }
    }
}

// ─── Builders ─────────────────────────────────────────────────────────────────

/// Full daily-intel prompt: the instruction block plus serialized context.
pub fn build_intel_prompt(state: &UserIntelState) -> String {
    format!(
        "{}\n\nEXAM DATA:\n{}\n\nMASTERY DATA:\n{}\n\nSTUDY PATTERNS:\n{}\n\nBEHAVIORAL THREADS:\n{}\n\nGenerate today's Intel now. Follow the format exactly.",
        DAILY_INTEL_PROMPT.replace("{examProximity}", state.exam_proximity.as_str()),
        exam_context(&state.exams),
        mastery_context(state),
        pattern_context(state),
        semantic_context(state),
    )
}

/// Nudge prompt for a scheduled trigger. A CRITICAL exam overrides the
/// trigger-specific template.
pub fn build_nudge_prompt(
    state: &UserIntelState,
    trigger: NudgeTrigger,
    now: DateTime<Utc>,
) -> String {
    if let Some(critical) = state
        .exams
        .iter()
        .find(|e| e.threat_level == ThreatLevel::Critical)
    {
        return NUDGE_CRITICAL
            .replace("{subject}", &critical.subject)
            .replace("{daysRemaining}", &critical.days_remaining.to_string())
            .replace("{currentProgress}", &critical.current_progress.to_string())
            .replace("{prediction}", &critical.prediction);
    }

    match trigger {
        NudgeTrigger::AfternoonDrift => {
            let time_waster = state
                .semantic_threads
                .time_wasters
                .first()
                .map(String::as_str)
                .unwrap_or("distractions");
            let (next_exam, days) = state
                .exams
                .first()
                .map(|e| (e.subject.as_str(), e.days_remaining.to_string()))
                .unwrap_or(("your exam", "several".to_string()));
            NUDGE_DRIFT
                .replace("{currentTime}", &now.format("%H:%M").to_string())
                .replace("{timeWaster}", time_waster)
                .replace("{nextExam}", next_exam)
                .replace("{daysToExam}", &days)
        }
        NudgeTrigger::MorningMomentum | NudgeTrigger::EveningCloseout => {
            let status = if state.weekly_minutes >= state.weekly_target {
                "ON TRACK"
            } else {
                "BEHIND"
            };
            NUDGE_MOMENTUM
                .replace("{streak}", &state.streaks.current.to_string())
                .replace("{todayMinutes}", &state.today_minutes.to_string())
                .replace("{weeklyGoal}", &state.weekly_target.to_string())
                .replace("{status}", status)
        }
    }
}

/// Weak-topic push text — deterministic, no model call involved.
pub fn build_weak_topic_push(
    topic_label: &str,
    mastery: i64,
    exam: &ExamThreatSnapshot,
) -> String {
    format!(
        "{topic_label} is still weak ({mastery}%). {} exam in {} days. Attack this today.",
        exam.subject, exam.days_remaining
    )
}

/// Threshold alert for the 14/7/3/1-day marks; a plain fallback otherwise.
pub fn build_exam_alert(exam: &ExamThreatSnapshot, threshold: i64) -> String {
    let weak_topics = exam
        .gap_analysis
        .iter()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    match threshold {
        14 => EXAM_ALERT_14_DAYS
            .replace("{subject}", &exam.subject)
            .replace("{progress}", &exam.current_progress.to_string()),
        7 => EXAM_ALERT_7_DAYS
            .replace("{subject}", &exam.subject)
            .replace("{progress}", &exam.current_progress.to_string())
            .replace(
                "{weakTopics}",
                if weak_topics.is_empty() {
                    "review all topics"
                } else {
                    weak_topics.as_str()
                },
            )
            .replace("{hoursNeeded}", &exam.recommended_hours.to_string()),
        3 => {
            let priorities = exam
                .gap_analysis
                .iter()
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            EXAM_ALERT_3_DAYS
                .replace("{subject}", &exam.subject)
                .replace("{progress}", &exam.current_progress.to_string())
                .replace(
                    "{priorities}",
                    if priorities.is_empty() {
                        "high-value topics"
                    } else {
                        priorities.as_str()
                    },
                )
        }
        1 => EXAM_ALERT_1_DAY
            .replace("{subject}", &exam.subject)
            .replace("{prediction}", &exam.prediction)
            .replace(
                "{keyTopics}",
                if weak_topics.is_empty() {
                    "key concepts"
                } else {
                    weak_topics.as_str()
                },
            ),
        _ => format!(
            "{} exam in {threshold} days. Current preparedness: {}%.",
            exam.subject, exam.current_progress
        ),
    }
}

// ─── Context sections ─────────────────────────────────────────────────────────

fn exam_context(exams: &[ExamThreatSnapshot]) -> String {
    if exams.is_empty() {
        return "No exams currently scheduled.".to_string();
    }

    let mut lines = Vec::new();
    for exam in exams.iter().take(5) {
        let topic = exam
            .topic
            .as_deref()
            .map(|t| format!(" ({t})"))
            .unwrap_or_default();
        lines.push(format!(
            "- {}{topic}: {} days, {} threat, {}% prepared, predicted: {}",
            exam.subject,
            exam.days_remaining,
            exam.threat_level.as_str(),
            exam.current_progress,
            exam.prediction
        ));
        if !exam.gap_analysis.is_empty() {
            lines.push(format!(
                "  Weak areas: {}",
                exam.gap_analysis
                    .iter()
                    .take(3)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
    lines.join("\n")
}

fn mastery_context(state: &UserIntelState) -> String {
    if state.mastery.topic_scores.is_empty() {
        return "No topic mastery data yet.".to_string();
    }

    let mut lines = Vec::new();
    if !state.mastery.weak_topics.is_empty() {
        lines.push("WEAK TOPICS (<50%):".to_string());
        for t in state.mastery.weak_topics.iter().take(5) {
            lines.push(format!("- {}: {}%", t.label(), t.score));
        }
    }
    if !state.mastery.strong_topics.is_empty() {
        lines.push("STRONG TOPICS (>75%):".to_string());
        for t in state.mastery.strong_topics.iter().take(3) {
            lines.push(format!("- {}: {}%", t.label(), t.score));
        }
    }
    if !state.mastery.stuck_topics.is_empty() {
        lines.push(format!(
            "STUCK (repeat attempts, little progress): {}",
            state.mastery.stuck_topics.join(", ")
        ));
    }
    lines.join("\n")
}

fn pattern_context(state: &UserIntelState) -> String {
    let p = &state.study_patterns;
    let mut lines = vec![
        format!("Consistency: {}%", p.consistency_score),
        format!("Avg session: {} min", p.average_session_minutes),
        format!("Optimal session length: {} min", p.optimal_session_length),
    ];

    if !p.peak_study_windows.is_empty() {
        lines.push("Peak study windows:".to_string());
        for w in &p.peak_study_windows {
            lines.push(format!("- {}: {}", w.time, w.description));
        }
    }
    if !p.drift_windows.is_empty() {
        lines.push("Drift windows (low productivity):".to_string());
        for w in &p.drift_windows {
            lines.push(format!("- {}: {}", w.time, w.description));
        }
    }
    if !p.best_subjects.is_empty() {
        lines.push(format!("Best subjects: {}", p.best_subjects.join(", ")));
    }
    if !p.struggle_subjects.is_empty() {
        lines.push(format!(
            "Struggle subjects: {}",
            p.struggle_subjects.join(", ")
        ));
    }
    if !p.return_protocols.is_empty() {
        lines.push("What works for them:".to_string());
        for protocol in &p.return_protocols {
            lines.push(format!("- {}", protocol.text));
        }
    }
    lines.join("\n")
}

fn semantic_context(state: &UserIntelState) -> String {
    let t = &state.semantic_threads;
    let mut lines = Vec::new();

    if !t.recurring_excuses.is_empty() {
        lines.push(format!(
            "Recurring excuses: {}",
            t.recurring_excuses.join(", ")
        ));
    }
    if !t.time_wasters.is_empty() {
        lines.push(format!("Time wasters: {}", t.time_wasters.join(", ")));
    }
    if !t.study_contradictions.is_empty() {
        lines.push("Contradictions:".to_string());
        for c in &t.study_contradictions {
            lines.push(format!("- {c}"));
        }
    }
    if !t.recent_breakthroughs.is_empty() {
        lines.push("Recent breakthroughs:".to_string());
        for b in &t.recent_breakthroughs {
            lines.push(format!("- {b}"));
        }
    }
    if !t.common_mistakes.is_empty() {
        lines.push("Common mistakes:".to_string());
        for m in &t.common_mistakes {
            lines.push(format!("- {m}"));
        }
    }

    if lines.is_empty() {
        "No behavioral patterns detected yet.".to_string()
    } else {
        lines.join("\n")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::rules::Archetype;
    use crate::identity::{DirectionTrend, RiskTag, UserIdentitySnapshot};
    use crate::mastery::MasteryMap;
    use crate::patterns::{StudyPatternSnapshot, StudyStreaks};
    use crate::semantic::SemanticThreads;
    use crate::threat::ExamProximity;
    use chrono::Duration;

    fn state_with_exam(level: ThreatLevel, days: i64) -> UserIntelState {
        let now = Utc::now();
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
            exams: vec![ExamThreatSnapshot {
                exam_id: "e1".into(),
                subject: "Chemistry".into(),
                topic: None,
                date: now + Duration::days(days),
                days_remaining: days,
                threat_level: level,
                current_progress: 48,
                prediction: "D (50-59%)".into(),
                gap_analysis: vec!["Organic Reactions (40%)".into()],
                recommended_hours: 3,
            }],
            exam_proximity: ExamProximity::High,
            study_patterns: StudyPatternSnapshot {
                peak_study_windows: vec![],
                drift_windows: vec![],
                consistency_score: 55,
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
            today_minutes: 20,
            weekly_minutes: 300,
            weekly_target: 600,
            streaks: StudyStreaks {
                current: 2,
                longest: 4,
                total_hours: 12,
            },
        }
    }

    #[test]
    fn intel_prompt_embeds_proximity_and_exam_data() {
        let state = state_with_exam(ThreatLevel::High, 6);
        let prompt = build_intel_prompt(&state);
        assert!(prompt.contains("Exam proximity: HIGH"));
        assert!(prompt.contains("Chemistry"));
        assert!(prompt.contains("Organic Reactions (40%)"));
        assert!(!prompt.contains("{examProximity}"));
    }

    #[test]
    fn critical_exam_overrides_nudge_trigger() {
        let state = state_with_exam(ThreatLevel::Critical, 3);
        let prompt = build_nudge_prompt(&state, NudgeTrigger::MorningMomentum, Utc::now());
        assert!(prompt.contains("CRITICAL exam threat detected"));
        assert!(prompt.contains("Days remaining: 3"));
    }

    #[test]
    fn momentum_nudge_reports_weekly_status() {
        let state = state_with_exam(ThreatLevel::Medium, 12);
        let prompt = build_nudge_prompt(&state, NudgeTrigger::EveningCloseout, Utc::now());
        assert!(prompt.contains("Status: BEHIND"));
        assert!(prompt.contains("Current streak: 2"));
    }

    #[test]
    fn drift_nudge_names_the_time_waster() {
        let mut state = state_with_exam(ThreatLevel::Medium, 12);
        state.semantic_threads.time_wasters = vec!["youtube".into()];
        let prompt = build_nudge_prompt(&state, NudgeTrigger::AfternoonDrift, Utc::now());
        assert!(prompt.contains("youtube"));
        assert!(prompt.contains("Chemistry"));
    }

    #[test]
    fn exam_alerts_per_threshold() {
        let state = state_with_exam(ThreatLevel::High, 7);
        let exam = &state.exams[0];
        assert!(build_exam_alert(exam, 14).contains("14 days"));
        let seven = build_exam_alert(exam, 7);
        assert!(seven.contains("THREAT LEVEL: HIGH"));
        assert!(seven.contains("Organic Reactions (40%)"));
        assert!(seven.contains("3 hours"));
        assert!(build_exam_alert(exam, 3).contains("3 DAYS"));
        assert!(build_exam_alert(exam, 1).contains("TOMORROW"));
        assert!(build_exam_alert(exam, 9).contains("9 days"));
    }

    #[test]
    fn empty_state_has_placeholder_sections() {
        let mut state = state_with_exam(ThreatLevel::Low, 30);
        state.exams.clear();
        let prompt = build_intel_prompt(&state);
        assert!(prompt.contains("No exams currently scheduled."));
        assert!(prompt.contains("No topic mastery data yet."));
        assert!(prompt.contains("No behavioral patterns detected yet."));
    }
}
