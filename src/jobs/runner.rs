//! Job handlers, the single worker loop, and the periodic tickers that feed
//! the queue.

use chrono::{Datelike, Timelike, Utc, Weekday};
use std::sync::Arc;
use tracing::{info, warn};

use crate::coaching::generate_coaching_plans;
use crate::error::{IntelError, IntelResult};
use crate::intel::{build_intel_state, refresh_exam_threats};
use crate::mastery;
use crate::prompts::{
    build_exam_alert, build_intel_prompt, build_nudge_prompt, build_weak_topic_push, NudgeTrigger,
};
use crate::threat::days_remaining_signed;
use crate::AppContext;

use super::{Job, SharedJobQueue};

/// Exact day marks that fire an exam alert.
const ALERT_THRESHOLDS: [i64; 4] = [14, 7, 3, 1];

/// Drain the queue forever, one job at a time.
///
/// Call this in a `tokio::spawn` during startup. Errors are logged, never
/// fatal to the loop.
pub async fn run_worker(ctx: AppContext, queue: SharedJobQueue) {
    info!("job worker started (concurrency 1)");
    loop {
        match queue.dequeue().await {
            Some(job) => {
                let key = job.identity_key();
                if let Err(e) = process(&ctx, &job).await {
                    warn!(job = %key, err = %e, "job failed");
                }
            }
            None => tokio::time::sleep(std::time::Duration::from_secs(1)).await,
        }
    }
}

/// Handle one job.
pub async fn process(ctx: &AppContext, job: &Job) -> IntelResult<()> {
    match job {
        Job::DailyIntel { user_id } => run_daily_intel(ctx, user_id).await,
        Job::StudyNudge { user_id, trigger } => run_study_nudge(ctx, user_id, *trigger).await,
        Job::CoachingRefresh { user_id } => run_coaching_refresh(ctx, user_id).await,
        Job::AnalyzeSession { session_id } => run_analyze_session(ctx, session_id).await,
        Job::ExamThresholds => check_exam_thresholds(ctx).await,
        Job::WeakTopicPush => push_weak_topics(ctx).await,
        Job::WeeklyConsolidation => run_weekly_consolidation(ctx).await,
        Job::SweepExpired => {
            let removed = ctx.coaching.sweep_expired(Utc::now()).await?;
            if removed > 0 {
                info!(removed, "expired coaching messages swept");
            }
            Ok(())
        }
    }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// Generate and store the daily briefing. A generation failure propagates as
/// an external-service error and leaves the previous briefing intact.
async fn run_daily_intel(ctx: &AppContext, user_id: &str) -> IntelResult<()> {
    let state = build_intel_state(&ctx.storage, user_id).await?;
    let prompt = build_intel_prompt(&state);
    let text = ctx.generator.generate(&prompt).await.map_err(IntelError::from)?;

    ctx.storage.record_event(user_id, "daily_intel", &text).await?;
    info!(user_id, chars = text.len(), "daily intel stored");
    Ok(())
}

async fn run_study_nudge(
    ctx: &AppContext,
    user_id: &str,
    trigger: NudgeTrigger,
) -> IntelResult<()> {
    let state = build_intel_state(&ctx.storage, user_id).await?;
    let prompt = build_nudge_prompt(&state, trigger, Utc::now());
    let text = ctx.generator.generate(&prompt).await.map_err(IntelError::from)?;

    ctx.storage.record_event(user_id, "study_nudge", &text).await?;
    info!(user_id, trigger = trigger.as_str(), "study nudge stored");
    Ok(())
}

/// Regenerate the coaching batch. Replace-then-insert; a failure before the
/// insert leaves the user briefly without active messages (accepted race).
async fn run_coaching_refresh(ctx: &AppContext, user_id: &str) -> IntelResult<()> {
    let state = build_intel_state(&ctx.storage, user_id).await?;
    let now = Utc::now();
    let messages = generate_coaching_plans(&state, now);
    let stored = ctx.coaching.replace_active(user_id, &messages, now).await?;
    info!(user_id, stored, "coaching messages regenerated");
    Ok(())
}

async fn run_analyze_session(ctx: &AppContext, session_id: &str) -> IntelResult<()> {
    let session = ctx
        .storage
        .get_session(session_id)
        .await?
        .ok_or_else(|| IntelError::NotFound {
            entity: "study session",
            id: session_id.to_string(),
        })?;

    mastery::apply_session(&ctx.storage, &session).await?;
    refresh_exam_threats(&ctx.storage, &session.user_id).await?;
    Ok(())
}

/// Fire alerts for exams sitting exactly at a threshold day mark.
async fn check_exam_thresholds(ctx: &AppContext) -> IntelResult<()> {
    let now = Utc::now();
    let exams = ctx.storage.upcoming_exams(14).await?;

    let mut alerts_sent = 0usize;
    for exam in exams {
        let days = days_remaining_signed(exam.date, now);
        if !ALERT_THRESHOLDS.contains(&days) {
            continue;
        }

        let state = build_intel_state(&ctx.storage, &exam.user_id).await?;
        let Some(threat) = state.exams.iter().find(|t| t.exam_id == exam.id) else {
            continue;
        };

        let alert = build_exam_alert(threat, days);
        ctx.storage
            .record_event(&exam.user_id, "exam_alert", &alert)
            .await?;
        alerts_sent += 1;
    }

    if alerts_sent > 0 {
        info!(alerts_sent, "exam threshold alerts recorded");
    }
    Ok(())
}

/// For each opted-in user with weak topics and a related exam inside 30
/// days, record one weak-topic push.
async fn push_weak_topics(ctx: &AppContext) -> IntelResult<()> {
    let users = ctx.storage.list_reminder_users().await?;

    let mut pushes = 0usize;
    for user in users {
        let state = match build_intel_state(&ctx.storage, &user.id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(user_id = %user.id, err = %e, "weak-topic push skipped");
                continue;
            }
        };

        let Some(weakest) = state.mastery.weak_topics.first() else {
            continue;
        };
        let subject = weakest.subject.to_lowercase();
        let Some(exam) = state.exams.iter().find(|e| {
            e.days_remaining < 30 && e.subject.to_lowercase().contains(&subject)
        }) else {
            continue;
        };

        let text = build_weak_topic_push(&weakest.label(), weakest.score, exam);
        ctx.storage
            .record_event(&user.id, "mastery_alert", &text)
            .await?;
        pushes += 1;
    }

    if pushes > 0 {
        info!(pushes, "weak topic alerts recorded");
    }
    Ok(())
}

/// Refresh every user's cached exam threats once a week.
async fn run_weekly_consolidation(ctx: &AppContext) -> IntelResult<()> {
    let users = ctx.storage.list_users().await?;
    for user in &users {
        if let Err(e) = refresh_exam_threats(&ctx.storage, &user.id).await {
            warn!(user_id = %user.id, err = %e, "weekly consolidation failed for user");
        }
    }
    info!(users = users.len(), "weekly consolidation complete");
    Ok(())
}

// ─── Tickers ──────────────────────────────────────────────────────────────────

/// Spawn the periodic enqueue loops. Returns immediately; the loops run for
/// the life of the process.
pub fn spawn_tickers(ctx: AppContext, queue: SharedJobQueue) {
    // Expiry sweep.
    {
        let queue = Arc::clone(&queue);
        let period = std::time::Duration::from_secs(ctx.config.jobs.sweep_interval_mins * 60);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                queue.enqueue(Job::SweepExpired).await;
            }
        });
    }

    // Hourly scans: exam thresholds + per-user coaching refresh.
    {
        let ctx = ctx.clone();
        let queue = Arc::clone(&queue);
        let period =
            std::time::Duration::from_secs(ctx.config.jobs.coaching_interval_mins * 60);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                queue.enqueue(Job::ExamThresholds).await;
                match ctx.storage.list_coaching_users().await {
                    Ok(users) => {
                        for user in users {
                            queue.enqueue(Job::CoachingRefresh { user_id: user.id }).await;
                        }
                    }
                    Err(e) => warn!(err = %e, "coaching user scan failed"),
                }
            }
        });
    }

    // Time-of-day jobs: daily intel, the three nudges, weekly consolidation.
    {
        let ctx = ctx.clone();
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            let mut last_fired_hour: Option<String> = None;
            loop {
                interval.tick().await;
                let now = Utc::now();
                if now.minute() != 0 {
                    continue;
                }
                let hour_key = now.format("%Y-%m-%d %H").to_string();
                if last_fired_hour.as_deref() == Some(hour_key.as_str()) {
                    continue;
                }
                last_fired_hour = Some(hour_key);

                if let Err(e) = enqueue_hourly_jobs(&ctx, &queue, now.hour(), now.weekday()).await
                {
                    warn!(err = %e, "scheduled job scan failed");
                }
            }
        });
    }
}

/// Enqueue whatever is due at `hour`. Nudge triggers mirror the fixed
/// morning / afternoon / evening cadence.
async fn enqueue_hourly_jobs(
    ctx: &AppContext,
    queue: &SharedJobQueue,
    hour: u32,
    weekday: Weekday,
) -> anyhow::Result<()> {
    if hour == ctx.config.jobs.intel_hour {
        for user in ctx.storage.list_intel_users().await? {
            queue.enqueue(Job::DailyIntel { user_id: user.id }).await;
        }
    }

    let trigger = match hour {
        h if h == ctx.config.jobs.nudge_morning_hour => Some(NudgeTrigger::MorningMomentum),
        h if h == ctx.config.jobs.nudge_afternoon_hour => Some(NudgeTrigger::AfternoonDrift),
        h if h == ctx.config.jobs.nudge_evening_hour => Some(NudgeTrigger::EveningCloseout),
        _ => None,
    };
    if let Some(trigger) = trigger {
        for user in ctx.storage.list_nudge_users().await? {
            queue
                .enqueue(Job::StudyNudge {
                    user_id: user.id,
                    trigger,
                })
                .await;
        }
    }

    if weekday == Weekday::Sun && hour == 0 {
        queue.enqueue(Job::WeeklyConsolidation).await;
        queue.enqueue(Job::WeakTopicPush).await;
    }

    Ok(())
}
