//! End-to-end aggregator tests against a temp-dir SQLite store.

use anyhow::Result;
use chrono::{Duration, Utc};

use studyd::error::IntelError;
use studyd::intel::{build_intel_state, refresh_exam_threats};
use studyd::mastery;
use studyd::storage::Storage;
use studyd::threat::{ExamProximity, ThreatLevel};

async fn fresh_storage() -> Result<(tempfile::TempDir, Storage)> {
    let dir = tempfile::tempdir()?;
    let storage = Storage::new(dir.path()).await?;
    Ok((dir, storage))
}

#[tokio::test]
async fn new_user_gets_degenerate_but_valid_snapshot() -> Result<()> {
    let (_dir, storage) = fresh_storage().await?;
    storage.ensure_user("u1", "Avery", 600).await?;

    let state = build_intel_state(&storage, "u1").await?;

    assert_eq!(state.study_patterns.consistency_score, 0);
    assert!(state.study_patterns.peak_study_windows.is_empty());
    assert!(state.study_patterns.drift_windows.is_empty());
    assert!(state.exams.is_empty());
    assert_eq!(state.exam_proximity, ExamProximity::None);
    assert_eq!(state.identity.archetype.as_str(), "Drift Cycler");
    assert_eq!(state.identity.confidence, 50);
    assert_eq!(state.weekly_target, 600);
    assert_eq!(state.streaks.current, 0);
    Ok(())
}

#[tokio::test]
async fn missing_user_is_not_found() -> Result<()> {
    let (_dir, storage) = fresh_storage().await?;
    let err = build_intel_state(&storage, "nobody").await.unwrap_err();
    assert!(matches!(err, IntelError::NotFound { entity: "user", .. }));
    Ok(())
}

#[tokio::test]
async fn seeded_user_gets_threats_and_weak_topics() -> Result<()> {
    let (_dir, storage) = fresh_storage().await?;
    storage.ensure_user("u1", "Avery", 600).await?;

    storage
        .create_exam(
            "u1",
            "Chemistry",
            None,
            Utc::now() + Duration::days(3),
            100.0,
            None,
        )
        .await?;
    mastery::set_score(&storage, "u1", "Chemistry", "Organic Reactions", 50, None).await?;
    mastery::set_score(&storage, "u1", "Chemistry", "Stoichiometry", 60, None).await?;

    storage
        .create_session("u1", "Chemistry", Some("Organic Reactions"), 45, Some(6), None)
        .await?;
    storage
        .record_event("u1", "reflection", "I want to revise organics but didn't start")
        .await?;

    let state = build_intel_state(&storage, "u1").await?;

    assert_eq!(state.exams.len(), 1);
    let threat = &state.exams[0];
    assert_eq!(threat.days_remaining, 3);
    assert_eq!(threat.threat_level, ThreatLevel::Critical);
    assert_eq!(threat.prediction, "D (50-59%)");
    assert!(!threat.gap_analysis.is_empty());
    assert_eq!(state.exam_proximity, ExamProximity::Critical);

    // Neither row sits under the 50% weak threshold.
    assert!(state.mastery.weak_topics.is_empty());
    assert!(state.mastery.topic_scores.contains_key("Chemistry - Organic Reactions"));
    assert_eq!(
        state.semantic_threads.study_contradictions.len(),
        1,
        "intent+failure reflection should register"
    );
    assert!(state.weekly_minutes >= 45);
    Ok(())
}

#[tokio::test]
async fn exam_cache_is_refreshed_on_demand() -> Result<()> {
    let (_dir, storage) = fresh_storage().await?;
    storage.ensure_user("u1", "Avery", 600).await?;
    let exam = storage
        .create_exam(
            "u1",
            "Physics",
            None,
            Utc::now() + Duration::days(10),
            100.0,
            None,
        )
        .await?;
    assert!(exam.threat_level.is_none());

    let threats = refresh_exam_threats(&storage, "u1").await?;
    assert_eq!(threats.len(), 1);

    let cached = storage.get_exam(&exam.id).await?.expect("exam exists");
    assert_eq!(cached.threat_level.as_deref(), Some("HIGH"));
    assert_eq!(cached.days_remaining, Some(10));
    assert!(cached.prediction.is_some());
    Ok(())
}
