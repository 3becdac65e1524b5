//! The aggregator — the only intelligence entry point that performs I/O.
//!
//! Fetch-then-compute: all raw inputs are loaded up front (concurrently
//! where independent) and every sub-computation observes that same
//! point-in-time set. Nothing re-queries mid-computation.

use chrono::Utc;
use tracing::debug;

use crate::error::{IntelError, IntelResult};
use crate::identity::compute_identity;
use crate::mastery::MasteryMap;
use crate::observability::LatencyTracker;
use crate::patterns::{compute_streaks, compute_study_patterns, today_minutes, weekly_minutes};
use crate::semantic::free_text_inputs;
use crate::storage::Storage;
use crate::threat::{compute_exam_threats, exam_proximity, ExamThreatSnapshot};

use super::types::UserIntelState;

/// Session window, in days, feeding the pattern and identity computations.
const SESSION_WINDOW_DAYS: i64 = 30;

/// Build the full snapshot for one user.
///
/// Core record fetches (user, exams, mastery, sessions) are issued
/// concurrently and are fatal on failure. The free-text fetch degrades to
/// empty enrichment instead.
pub async fn build_intel_state(storage: &Storage, user_id: &str) -> IntelResult<UserIntelState> {
    let tracker = LatencyTracker::start("intel.build");

    let (user, exams, mastery_rows, sessions) = tokio::try_join!(
        storage.get_user(user_id),
        storage.list_exams(user_id),
        storage.mastery_rows(user_id),
        storage.recent_sessions(user_id, SESSION_WINDOW_DAYS),
    )?;

    let user = user.ok_or_else(|| IntelError::NotFound {
        entity: "user",
        id: user_id.to_string(),
    })?;

    let (threads, triggers, protocols) = free_text_inputs(storage, user_id).await;

    let now = Utc::now();
    let patterns =
        compute_study_patterns(&sessions, user.weekly_goal, triggers, protocols, now);
    let threats = compute_exam_threats(&exams, &mastery_rows, now);
    let proximity = exam_proximity(&threats);
    let mastery = MasteryMap::from_rows(&mastery_rows, &sessions);
    let identity = compute_identity(&patterns, &threats, &mastery, &threads, &sessions, now);

    let state = UserIntelState {
        user_id: user_id.to_string(),
        identity,
        exam_proximity: proximity,
        exams: threats,
        study_patterns: patterns,
        mastery,
        semantic_threads: threads,
        today_minutes: today_minutes(&sessions, now),
        weekly_minutes: weekly_minutes(&sessions, now),
        weekly_target: user.weekly_goal,
        streaks: compute_streaks(&sessions, now),
        recent_sessions: sessions,
    };

    tracker.finish();
    debug!(
        user_id,
        exams = state.exams.len(),
        proximity = state.exam_proximity.as_str(),
        archetype = state.identity.archetype.as_str(),
        "intel state built"
    );
    Ok(state)
}

/// Recompute threats for a user and refresh the cached copy on each exam
/// row. Called after sessions complete or exams change.
pub async fn refresh_exam_threats(
    storage: &Storage,
    user_id: &str,
) -> IntelResult<Vec<ExamThreatSnapshot>> {
    let (exams, mastery_rows) = tokio::try_join!(
        storage.list_exams(user_id),
        storage.mastery_rows(user_id),
    )?;

    let threats = compute_exam_threats(&exams, &mastery_rows, Utc::now());
    for threat in &threats {
        storage
            .cache_exam_threat(
                &threat.exam_id,
                threat.days_remaining,
                threat.threat_level.as_str(),
                threat.current_progress,
                &threat.prediction,
            )
            .await?;
    }
    Ok(threats)
}
