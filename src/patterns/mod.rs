//! Study pattern extraction — pure heuristics over a user's recent sessions.
//!
//! Everything here is deterministic given its inputs: the caller fetches the
//! session window and free-text derived inputs (procrastination triggers,
//! return protocols) up front and passes them in, so calling twice on the
//! same snapshot yields an identical result.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::storage::StudySessionRow;

/// Hours a learner is typically expected to study. Candidate set for drift
/// detection.
const EXPECTED_STUDY_HOURS: [u32; 7] = [9, 10, 14, 15, 16, 19, 20];

// ─── Types ────────────────────────────────────────────────────────────────────

/// An hour-of-day slot with observed activity stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Hour of day, 0–23.
    pub hour: u32,
    /// Display label, e.g. `"09:00"`.
    pub time: String,
    pub description: String,
    /// Session count observed in this hour.
    pub frequency: i64,
    /// Mean self-reported effectiveness for rated sessions in this hour.
    pub effectiveness: Option<f64>,
}

/// A refocus tactic that has worked before, mined from free-text records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnProtocol {
    pub text: String,
    pub worked_count: i64,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPatternSnapshot {
    /// Top hours by effectiveness (≤3).
    pub peak_study_windows: Vec<TimeWindow>,
    /// Expected-but-quiet hours (≤3).
    pub drift_windows: Vec<TimeWindow>,
    /// Actual vs. goal weekly minutes, 0–100.
    pub consistency_score: i64,
    pub procrastination_triggers: Vec<String>,
    pub return_protocols: Vec<ReturnProtocol>,
    pub average_session_minutes: i64,
    pub best_subjects: Vec<String>,
    pub struggle_subjects: Vec<String>,
    /// Recommended session length in minutes (25 / 45 / 90).
    pub optimal_session_length: i64,
    pub last_analyzed: DateTime<Utc>,
}

/// Day-streak stats derived from the session history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyStreaks {
    pub current: i64,
    pub longest: i64,
    pub total_hours: i64,
}

// ─── Extraction ───────────────────────────────────────────────────────────────

/// Build the full pattern snapshot for one user.
///
/// `triggers` and `protocols` come from the free-text scanning machinery
/// (see `semantic`); they are inputs here, not queries.
pub fn compute_study_patterns(
    sessions: &[StudySessionRow],
    weekly_goal_minutes: i64,
    triggers: Vec<String>,
    protocols: Vec<ReturnProtocol>,
    now: DateTime<Utc>,
) -> StudyPatternSnapshot {
    let avg_minutes = if sessions.is_empty() {
        0
    } else {
        let total: i64 = sessions.iter().map(|s| s.minutes).sum();
        (total as f64 / sessions.len() as f64).round() as i64
    };

    let (best_subjects, struggle_subjects) = subject_performance(sessions);

    StudyPatternSnapshot {
        peak_study_windows: peak_windows(sessions),
        drift_windows: drift_windows(sessions),
        consistency_score: consistency_score(sessions, weekly_goal_minutes, now),
        procrastination_triggers: triggers,
        return_protocols: protocols,
        average_session_minutes: avg_minutes,
        best_subjects,
        struggle_subjects,
        optimal_session_length: optimal_session_length(sessions),
        last_analyzed: now,
    }
}

/// Peak windows: hours with ≥2 sessions where the average effectiveness is
/// ≥7/10 or the hour saw ≥5 sessions. Top 3 by average effectiveness.
pub fn peak_windows(sessions: &[StudySessionRow]) -> Vec<TimeWindow> {
    let mut hours: HashMap<u32, (i64, Vec<i64>)> = HashMap::new();
    for s in sessions {
        let entry = hours.entry(s.created_at.hour()).or_default();
        entry.0 += 1;
        if let Some(eff) = s.effectiveness {
            entry.1.push(eff);
        }
    }

    let mut windows: Vec<TimeWindow> = hours
        .into_iter()
        .filter_map(|(hour, (total, ratings))| {
            if total < 2 {
                return None;
            }
            let avg = if ratings.is_empty() {
                0.0
            } else {
                ratings.iter().sum::<i64>() as f64 / ratings.len() as f64
            };
            if avg >= 7.0 || total >= 5 {
                Some(TimeWindow {
                    hour,
                    time: format!("{hour:02}:00"),
                    description: format!(
                        "High productivity ({total} sessions, {avg:.1}/10 avg)"
                    ),
                    frequency: total,
                    effectiveness: Some(avg),
                })
            } else {
                None
            }
        })
        .collect();

    windows.sort_by(|a, b| {
        b.effectiveness
            .unwrap_or(0.0)
            .partial_cmp(&a.effectiveness.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    windows.truncate(3);
    windows
}

/// Drift windows: expected study hours whose observed activity is less than
/// half the per-hour average across all observed hours.
pub fn drift_windows(sessions: &[StudySessionRow]) -> Vec<TimeWindow> {
    let mut hour_counts: HashMap<u32, i64> = HashMap::new();
    for s in sessions {
        *hour_counts.entry(s.created_at.hour()).or_default() += 1;
    }
    if hour_counts.is_empty() {
        return vec![];
    }

    let avg = hour_counts.values().sum::<i64>() as f64 / hour_counts.len() as f64;

    let mut drifts = Vec::new();
    for hour in EXPECTED_STUDY_HOURS {
        let count = *hour_counts.get(&hour).unwrap_or(&0);
        if (count as f64) < avg * 0.5 {
            drifts.push(TimeWindow {
                hour,
                time: format!("{hour:02}:00"),
                description: format!("Low study activity ({count} sessions vs {avg:.1} avg)"),
                frequency: count,
                effectiveness: None,
            });
        }
    }
    drifts.truncate(3);
    drifts
}

/// Actual weekly minutes vs. the weekly goal, clamped to [0, 100].
pub fn consistency_score(
    sessions: &[StudySessionRow],
    weekly_goal_minutes: i64,
    now: DateTime<Utc>,
) -> i64 {
    if sessions.is_empty() || weekly_goal_minutes <= 0 {
        return 0;
    }
    let observed = weekly_minutes(sessions, now);
    ((observed as f64 / weekly_goal_minutes as f64 * 100.0).round() as i64).clamp(0, 100)
}

/// Minutes logged within the trailing 7 days.
pub fn weekly_minutes(sessions: &[StudySessionRow], now: DateTime<Utc>) -> i64 {
    let week_ago = now - Duration::days(7);
    sessions
        .iter()
        .filter(|s| s.created_at >= week_ago)
        .map(|s| s.minutes)
        .sum()
}

/// Minutes logged since UTC midnight.
pub fn today_minutes(sessions: &[StudySessionRow], now: DateTime<Utc>) -> i64 {
    let today = now.date_naive();
    sessions
        .iter()
        .filter(|s| s.created_at.date_naive() == today)
        .map(|s| s.minutes)
        .sum()
}

/// Best session length by rated effectiveness: short (<30) → 25, medium
/// (30–60) → 45, long (>60) → 90. Defaults to 45 when nothing is rated.
pub fn optimal_session_length(sessions: &[StudySessionRow]) -> i64 {
    // (count, sum of ratings) per bucket: [short, medium, long]
    let mut buckets = [(0i64, 0i64); 3];
    for s in sessions {
        let Some(eff) = s.effectiveness else { continue };
        let idx = if s.minutes < 30 {
            0
        } else if s.minutes <= 60 {
            1
        } else {
            2
        };
        buckets[idx].0 += 1;
        buckets[idx].1 += eff;
    }

    if buckets.iter().all(|(count, _)| *count == 0) {
        return 45;
    }

    let avgs: Vec<f64> = buckets
        .iter()
        .map(|(count, sum)| {
            if *count == 0 {
                0.0
            } else {
                *sum as f64 / *count as f64
            }
        })
        .collect();

    let best = avgs
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(1);

    match best {
        0 => 25,
        2 => 90,
        _ => 45,
    }
}

/// Rank subjects by mean effectiveness (unrated sessions count as 5/10).
/// Returns (top 3 best, bottom 3 struggles — weakest first).
pub fn subject_performance(sessions: &[StudySessionRow]) -> (Vec<String>, Vec<String>) {
    let mut data: HashMap<&str, Vec<i64>> = HashMap::new();
    for s in sessions {
        data.entry(s.subject.as_str())
            .or_default()
            .push(s.effectiveness.unwrap_or(5));
    }

    let mut ranked: Vec<(String, f64)> = data
        .into_iter()
        .map(|(subject, ratings)| {
            let avg = ratings.iter().sum::<i64>() as f64 / ratings.len() as f64;
            (subject.to_string(), avg)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let best: Vec<String> = ranked.iter().take(3).map(|(s, _)| s.clone()).collect();
    let struggles: Vec<String> = ranked
        .iter()
        .rev()
        .take(3)
        .map(|(s, _)| s.clone())
        .collect();
    (best, struggles)
}

/// Consecutive-day streaks and total volume.
///
/// The longest streak is estimated from the observed window (full history is
/// not loaded here), floored by the current streak.
pub fn compute_streaks(sessions: &[StudySessionRow], now: DateTime<Utc>) -> StudyStreaks {
    if sessions.is_empty() {
        return StudyStreaks::default();
    }

    let total_minutes: i64 = sessions.iter().map(|s| s.minutes).sum();
    let session_dates: std::collections::HashSet<_> =
        sessions.iter().map(|s| s.created_at.date_naive()).collect();

    let mut current = 0i64;
    let mut check = now.date_naive();
    while session_dates.contains(&check) {
        current += 1;
        check = check - Duration::days(1);
    }

    let longest = current.max(sessions.len() as i64 / 7);

    StudyStreaks {
        current,
        longest,
        total_hours: (total_minutes as f64 / 60.0).round() as i64,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn session(hour: u32, minutes: i64, effectiveness: Option<i64>) -> StudySessionRow {
        session_on(Utc::now(), hour, minutes, effectiveness, "Maths")
    }

    fn session_on(
        base: DateTime<Utc>,
        hour: u32,
        minutes: i64,
        effectiveness: Option<i64>,
        subject: &str,
    ) -> StudySessionRow {
        let created = base
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .expect("valid time")
            .and_utc();
        StudySessionRow {
            id: format!("s-{hour}-{minutes}"),
            user_id: "u1".into(),
            subject: subject.into(),
            topic: None,
            minutes,
            effectiveness,
            notes: None,
            created_at: created,
        }
    }

    #[test]
    fn peak_window_needs_two_sessions() {
        let mut sessions = vec![session(22, 30, Some(3))];
        assert!(peak_windows(&sessions).is_empty());

        for _ in 0..10 {
            sessions.push(session(9, 45, Some(8)));
        }
        let peaks = peak_windows(&sessions);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].time, "09:00");
        assert_eq!(peaks[0].frequency, 10);
        assert!(peaks[0].description.contains("10 sessions"));
        assert!(peaks[0].description.contains("8.0/10"));
    }

    #[test]
    fn peak_windows_ranked_by_effectiveness() {
        let mut sessions = Vec::new();
        for _ in 0..3 {
            sessions.push(session(9, 30, Some(7)));
        }
        for _ in 0..3 {
            sessions.push(session(20, 30, Some(9)));
        }
        let peaks = peak_windows(&sessions);
        assert_eq!(peaks[0].hour, 20);
        assert_eq!(peaks[1].hour, 9);
    }

    #[test]
    fn unrated_busy_hour_still_qualifies() {
        let sessions: Vec<_> = (0..5).map(|_| session(14, 30, None)).collect();
        let peaks = peak_windows(&sessions);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].hour, 14);
    }

    #[test]
    fn drift_windows_flag_quiet_expected_hours() {
        // Heavy evening activity, nothing in the morning slots.
        let mut sessions = Vec::new();
        for _ in 0..6 {
            sessions.push(session(21, 30, Some(6)));
        }
        let drifts = drift_windows(&sessions);
        assert!(!drifts.is_empty());
        assert!(drifts.len() <= 3);
        assert!(drifts.iter().all(|w| w.frequency == 0));
    }

    #[test]
    fn no_sessions_no_drift() {
        assert!(drift_windows(&[]).is_empty());
    }

    #[test]
    fn consistency_clamps_at_100() {
        // 900 observed vs 600 goal → capped at 100, not 150.
        let sessions: Vec<_> = (0..9).map(|_| session(10, 100, None)).collect();
        assert_eq!(consistency_score(&sessions, 600, Utc::now()), 100);
    }

    #[test]
    fn consistency_zero_without_sessions() {
        assert_eq!(consistency_score(&[], 600, Utc::now()), 0);
    }

    #[test]
    fn optimal_length_prefers_best_rated_bucket() {
        let sessions = vec![
            session(9, 20, Some(9)),
            session(10, 25, Some(9)),
            session(11, 50, Some(5)),
            session(12, 90, Some(4)),
        ];
        assert_eq!(optimal_session_length(&sessions), 25);
    }

    #[test]
    fn optimal_length_defaults_without_ratings() {
        let sessions = vec![session(9, 20, None)];
        assert_eq!(optimal_session_length(&sessions), 45);
    }

    #[test]
    fn subject_ranking_orders_best_and_struggles() {
        let now = Utc::now();
        let sessions = vec![
            session_on(now, 9, 30, Some(9), "Maths"),
            session_on(now, 10, 30, Some(4), "History"),
            session_on(now, 11, 30, Some(6), "Biology"),
        ];
        let (best, struggles) = subject_performance(&sessions);
        assert_eq!(best[0], "Maths");
        assert_eq!(struggles[0], "History");
    }

    #[test]
    fn extraction_is_idempotent() {
        let now = Utc::now();
        let sessions = vec![
            session(9, 45, Some(8)),
            session(9, 50, Some(7)),
            session(15, 20, Some(4)),
        ];
        let a = compute_study_patterns(&sessions, 600, vec![], vec![], now);
        let b = compute_study_patterns(&sessions, 600, vec![], vec![], now);
        assert_eq!(a, b);
    }

    #[test]
    fn streaks_count_consecutive_days() {
        let now = Utc::now();
        let mut sessions = vec![session(9, 60, None)];
        sessions.push(session_on(now - Duration::days(1), 10, 60, None, "Maths"));
        sessions.push(session_on(now - Duration::days(2), 10, 60, None, "Maths"));
        // gap at day 3
        sessions.push(session_on(now - Duration::days(5), 10, 60, None, "Maths"));

        let streaks = compute_streaks(&sessions, now);
        assert_eq!(streaks.current, 3);
        assert_eq!(streaks.total_hours, 4);
    }
}
