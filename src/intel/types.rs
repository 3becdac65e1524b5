//! The aggregated snapshot type.

use serde::Serialize;

use crate::identity::UserIdentitySnapshot;
use crate::mastery::MasteryMap;
use crate::patterns::{StudyPatternSnapshot, StudyStreaks};
use crate::semantic::SemanticThreads;
use crate::storage::StudySessionRow;
use crate::threat::{ExamProximity, ExamThreatSnapshot};

/// Everything downstream consumers need about one user, computed from a
/// single point-in-time fetch. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct UserIntelState {
    pub user_id: String,
    pub identity: UserIdentitySnapshot,
    pub exams: Vec<ExamThreatSnapshot>,
    pub exam_proximity: ExamProximity,
    pub study_patterns: StudyPatternSnapshot,
    pub mastery: MasteryMap,
    pub semantic_threads: SemanticThreads,
    /// The fetched session window (newest first), passed through for
    /// consumers that need raw recency (drift detection, prompts).
    pub recent_sessions: Vec<StudySessionRow>,
    pub today_minutes: i64,
    pub weekly_minutes: i64,
    /// The user's weekly goal in minutes.
    pub weekly_target: i64,
    pub streaks: StudyStreaks,
}
