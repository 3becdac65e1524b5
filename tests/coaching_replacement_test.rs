//! Coaching persistence contract: replace-active batches, expiry sweep,
//! status transitions.

use anyhow::Result;
use chrono::{Duration, Utc};

use studyd::coaching::{
    CoachingAction, CoachingMessageData, CoachingPlan, CoachingStorage, MessageKind, Priority,
};
use studyd::storage::Storage;

async fn fresh() -> Result<(tempfile::TempDir, Storage, CoachingStorage)> {
    let dir = tempfile::tempdir()?;
    let storage = Storage::new(dir.path()).await?;
    let coaching = CoachingStorage::new(storage.pool());
    Ok((dir, storage, coaching))
}

fn message(kind: MessageKind, title: &str) -> CoachingMessageData {
    CoachingMessageData {
        kind,
        priority: Priority::Medium,
        title: title.to_string(),
        weak_areas: vec![],
        context: serde_json::Value::Null,
        plan: CoachingPlan {
            description: "15 min recovery session today to stop decay".into(),
            total_minutes: 15,
            predicted_gain: None,
            breakdown: None,
            reasoning: None,
            urgency: None,
        },
        actions: vec![CoachingAction {
            kind: "quick_review".into(),
            label: "Quick Review".into(),
            payload: serde_json::json!({ "duration": 15 }),
        }],
    }
}

#[tokio::test]
async fn second_batch_replaces_the_first() -> Result<()> {
    let (_dir, _storage, coaching) = fresh().await?;
    let now = Utc::now();

    let first = vec![
        message(MessageKind::ExamPrep, "Chemistry Exam in 5 Days"),
        message(MessageKind::Consistency, "Build Study Consistency"),
    ];
    coaching.replace_active("u1", &first, now).await?;

    let second = vec![message(MessageKind::DriftRecovery, "4-Day Drift on Maths")];
    coaching.replace_active("u1", &second, now).await?;

    let active = coaching.active_messages("u1", now).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].title, "4-Day Drift on Maths");
    assert_eq!(active[0].kind, "drift_recovery");
    Ok(())
}

#[tokio::test]
async fn replacement_is_scoped_per_user() -> Result<()> {
    let (_dir, _storage, coaching) = fresh().await?;
    let now = Utc::now();

    coaching
        .replace_active("u1", &[message(MessageKind::ExamPrep, "u1 message")], now)
        .await?;
    coaching
        .replace_active("u2", &[message(MessageKind::ExamPrep, "u2 message")], now)
        .await?;

    assert_eq!(coaching.active_messages("u1", now).await?.len(), 1);
    assert_eq!(coaching.active_messages("u2", now).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn expiry_follows_message_kind() -> Result<()> {
    let (_dir, _storage, coaching) = fresh().await?;
    let now = Utc::now();

    coaching
        .replace_active(
            "u1",
            &[
                message(MessageKind::Momentum, "Peak Performance Window"),
                message(MessageKind::Consistency, "Build Study Consistency"),
            ],
            now,
        )
        .await?;

    // Three hours on, the 2h momentum message has lapsed but the 7d
    // consistency message is still live.
    let later = now + Duration::hours(3);
    let active = coaching.active_messages("u1", later).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind, "consistency");

    let removed = coaching.sweep_expired(later).await?;
    assert_eq!(removed, 1);
    Ok(())
}

#[tokio::test]
async fn sweep_covers_all_users() -> Result<()> {
    let (_dir, _storage, coaching) = fresh().await?;
    let now = Utc::now();

    coaching
        .replace_active("u1", &[message(MessageKind::Momentum, "m1")], now)
        .await?;
    coaching
        .replace_active("u2", &[message(MessageKind::Momentum, "m2")], now)
        .await?;

    let removed = coaching.sweep_expired(now + Duration::hours(3)).await?;
    assert_eq!(removed, 2);
    Ok(())
}

#[tokio::test]
async fn dismissed_messages_leave_the_active_list() -> Result<()> {
    let (_dir, _storage, coaching) = fresh().await?;
    let now = Utc::now();

    coaching
        .replace_active("u1", &[message(MessageKind::ExamPrep, "to dismiss")], now)
        .await?;
    let active = coaching.active_messages("u1", now).await?;
    assert!(coaching.dismiss(&active[0].id).await?);
    assert!(coaching.active_messages("u1", now).await?.is_empty());

    // Unknown ids report false instead of silently succeeding.
    assert!(!coaching.dismiss("no-such-id").await?);
    Ok(())
}

#[tokio::test]
async fn active_list_orders_high_priority_first() -> Result<()> {
    let (_dir, _storage, coaching) = fresh().await?;
    let now = Utc::now();

    let mut low = message(MessageKind::Consistency, "low");
    low.priority = Priority::Low;
    let mut high = message(MessageKind::ExamPrep, "high");
    high.priority = Priority::High;
    let mut medium = message(MessageKind::DriftRecovery, "medium");
    medium.priority = Priority::Medium;

    coaching
        .replace_active("u1", &[low, medium, high], now)
        .await?;

    let active = coaching.active_messages("u1", now).await?;
    let priorities: Vec<&str> = active.iter().map(|m| m.priority.as_str()).collect();
    assert_eq!(priorities, vec!["high", "medium", "low"]);
    Ok(())
}
