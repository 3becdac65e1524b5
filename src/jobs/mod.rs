//! Background work — the single-worker job queue and its periodic triggers.
//!
//! This is deliberately not a general scheduler: no cron expressions, no
//! persistence. Jobs carry identity keys; enqueueing a job replaces any
//! pending instance with the same key, so recurring triggers never pile up
//! duplicates. One worker drains the queue (concurrency = 1), which
//! guarantees a user is never processed twice concurrently for the same job
//! type.

pub mod runner;

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::prompts::NudgeTrigger;

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Morning briefing for one user.
    DailyIntel { user_id: String },
    /// Scheduled motivational push for one user.
    StudyNudge {
        user_id: String,
        trigger: NudgeTrigger,
    },
    /// Regenerate and replace the user's coaching message batch.
    CoachingRefresh { user_id: String },
    /// Post-session analysis: mastery update + threat cache refresh.
    AnalyzeSession { session_id: String },
    /// Scan all upcoming exams for the 14/7/3/1-day alert marks.
    ExamThresholds,
    /// Push the single weakest exam-relevant topic per opted-in user.
    WeakTopicPush,
    /// Weekly cache refresh across all users.
    WeeklyConsolidation,
    /// Purge expired coaching messages for every user.
    SweepExpired,
}

impl Job {
    /// Deduplication key: a pending job with the same key is replaced when
    /// this one is enqueued.
    pub fn identity_key(&self) -> String {
        match self {
            Job::DailyIntel { user_id } => format!("daily-intel:{user_id}"),
            Job::StudyNudge { user_id, trigger } => {
                format!("study-nudge:{}:{user_id}", trigger.as_str())
            }
            Job::CoachingRefresh { user_id } => format!("coaching:{user_id}"),
            Job::AnalyzeSession { session_id } => format!("analyze-session:{session_id}"),
            Job::ExamThresholds => "exam-thresholds".to_string(),
            Job::WeakTopicPush => "weak-topic-push".to_string(),
            Job::WeeklyConsolidation => "weekly-consolidation".to_string(),
            Job::SweepExpired => "sweep-expired".to_string(),
        }
    }
}

/// FIFO queue with identity-key replacement.
pub struct JobQueue {
    inner: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue, replacing any pending job with the same identity key.
    pub async fn enqueue(&self, job: Job) {
        let mut queue = self.inner.lock().await;
        let key = job.identity_key();
        queue.retain(|pending| pending.identity_key() != key);
        queue.push_back(job);
    }

    pub async fn dequeue(&self) -> Option<Job> {
        self.inner.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle shared between tickers and the worker.
pub type SharedJobQueue = Arc<JobQueue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_replaces_same_identity_key() {
        let queue = JobQueue::new();
        queue
            .enqueue(Job::DailyIntel {
                user_id: "u1".into(),
            })
            .await;
        queue
            .enqueue(Job::DailyIntel {
                user_id: "u1".into(),
            })
            .await;
        queue
            .enqueue(Job::DailyIntel {
                user_id: "u2".into(),
            })
            .await;

        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn nudge_triggers_dedupe_independently() {
        let queue = JobQueue::new();
        queue
            .enqueue(Job::StudyNudge {
                user_id: "u1".into(),
                trigger: NudgeTrigger::MorningMomentum,
            })
            .await;
        queue
            .enqueue(Job::StudyNudge {
                user_id: "u1".into(),
                trigger: NudgeTrigger::AfternoonDrift,
            })
            .await;
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let queue = JobQueue::new();
        queue.enqueue(Job::SweepExpired).await;
        queue.enqueue(Job::ExamThresholds).await;
        assert_eq!(queue.dequeue().await, Some(Job::SweepExpired));
        assert_eq!(queue.dequeue().await, Some(Job::ExamThresholds));
        assert!(queue.is_empty().await);
    }
}
