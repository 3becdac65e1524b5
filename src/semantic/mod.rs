//! Semantic thread extraction — recurring keyword patterns over a bounded
//! window of free-text records (session notes, reflections, chat).
//!
//! This layer is enrichment, not a core input: a failed fetch degrades to an
//! all-empty `SemanticThreads` and never propagates.

pub mod vocab;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::patterns::ReturnProtocol;
use crate::storage::{MemoryEventRow, Storage};

/// How many recent free-text records to scan.
pub const MEMORY_WINDOW: i64 = 30;

/// A phrase must recur this often to count.
const MIN_RECURRENCE: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticThreads {
    pub recurring_excuses: Vec<String>,
    pub time_wasters: Vec<String>,
    pub study_contradictions: Vec<String>,
    pub recent_breakthroughs: Vec<String>,
    pub common_mistakes: Vec<String>,
}

/// Extract all threads from a window of texts. Pure.
pub fn extract_semantic_threads(texts: &[String]) -> SemanticThreads {
    if texts.is_empty() {
        return SemanticThreads::default();
    }
    SemanticThreads {
        recurring_excuses: recurring_phrases(texts, vocab::EXCUSE_TERMS),
        time_wasters: recurring_phrases(texts, vocab::TIME_WASTER_TERMS),
        study_contradictions: contradictions(texts),
        recent_breakthroughs: snippets_matching(texts, vocab::BREAKTHROUGH_TERMS, 100),
        common_mistakes: snippets_matching(texts, vocab::MISTAKE_TERMS, 100),
    }
}

/// Vocabulary terms occurring in ≥2 texts-worth of mentions, most frequent
/// first, top 5.
pub fn recurring_phrases(texts: &[String], terms: &[&str]) -> Vec<String> {
    let mut found: HashMap<&str, usize> = HashMap::new();
    for text in texts {
        let lower = text.to_lowercase();
        for term in terms {
            if lower.contains(term) {
                *found.entry(term).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<(&str, usize)> = found
        .into_iter()
        .filter(|(_, count)| *count >= MIN_RECURRENCE)
        .collect();
    // Count descending, term ascending for a stable order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(5)
        .map(|(term, _)| term.to_string())
        .collect()
}

/// Procrastination triggers for the pattern extractor.
pub fn procrastination_triggers(texts: &[String]) -> Vec<String> {
    recurring_phrases(texts, vocab::TRIGGER_TERMS)
}

/// Texts stating an intent and a failure in the same breath. Up to 3
/// truncated snippets.
fn contradictions(texts: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for text in texts {
        let lower = text.to_lowercase();
        let has_intent = vocab::INTENT_TERMS.iter().any(|t| lower.contains(t));
        let has_failure = vocab::FAILURE_TERMS.iter().any(|t| lower.contains(t));
        if has_intent && has_failure {
            out.push(truncate_ellipsis(text, 80));
            if out.len() >= 3 {
                break;
            }
        }
    }
    out
}

/// Up to 3 truncated snippets of texts containing any vocabulary term.
fn snippets_matching(texts: &[String], terms: &[&str], max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    for text in texts {
        let lower = text.to_lowercase();
        if terms.iter().any(|t| lower.contains(t)) {
            out.push(truncate(text, max_len));
            if out.len() >= 3 {
                break;
            }
        }
    }
    out
}

/// Return protocols: refocus tactics mentioned in events, newest first, ≤5.
pub fn extract_return_protocols(events: &[MemoryEventRow]) -> Vec<ReturnProtocol> {
    let mut protocols: Vec<ReturnProtocol> = events
        .iter()
        .filter(|e| {
            let lower = e.text.to_lowercase();
            vocab::PROTOCOL_TERMS.iter().any(|t| lower.contains(t))
        })
        .map(|e| ReturnProtocol {
            text: truncate(&e.text, 100),
            worked_count: 1,
            last_used: e.created_at,
        })
        .collect();
    protocols.truncate(5);
    protocols
}

/// Fetch a user's memory window and derive the free-text inputs: semantic
/// threads, procrastination triggers, return protocols.
///
/// On fetch failure every output is empty — this enrichment must never sink
/// the surrounding computation.
pub async fn free_text_inputs(
    storage: &Storage,
    user_id: &str,
) -> (SemanticThreads, Vec<String>, Vec<ReturnProtocol>) {
    match storage.recent_memory_events(user_id, MEMORY_WINDOW).await {
        Ok(events) => {
            let texts: Vec<String> = events.iter().map(|e| e.text.clone()).collect();
            (
                extract_semantic_threads(&texts),
                procrastination_triggers(&texts),
                extract_return_protocols(&events),
            )
        }
        Err(e) => {
            warn!(user_id, err = %e, "memory fetch failed — semantic threads degraded to empty");
            (SemanticThreads::default(), Vec::new(), Vec::new())
        }
    }
}

/// Char-boundary-safe prefix.
fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Prefix with a trailing marker when something was cut.
fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", truncate(s, max_chars))
    } else {
        s.to_string()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
