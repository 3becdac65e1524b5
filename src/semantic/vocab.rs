//! Vocabulary tables for free-text scanning.
//!
//! Kept as configuration data, separate from the matching algorithm, so the
//! term lists can be tested and extended independently. All matching is
//! case-insensitive substring search — deliberately simple, not NLP.

/// Phrases that show up when a session was skipped or cut short.
pub const EXCUSE_TERMS: &[&str] = &[
    "didn't understand",
    "too hard",
    "too difficult",
    "confused",
    "not enough time",
    "will do later",
    "tomorrow",
    "didn't feel like it",
    "wasn't in the mood",
];

/// Attention sinks mentioned in reflections.
pub const TIME_WASTER_TERMS: &[&str] = &[
    "scroll",
    "scrolling",
    "youtube",
    "tiktok",
    "instagram",
    "social media",
    "netflix",
    "gaming",
    "game",
    "binge",
    "doom",
    "wasted time",
    "distracted",
];

/// Subset of time wasters that act as procrastination triggers.
pub const TRIGGER_TERMS: &[&str] = &[
    "youtube",
    "tiktok",
    "instagram",
    "social media",
    "gaming",
    "netflix",
    "scrolling",
    "phone",
    "distracted",
];

/// Stated intent, for contradiction detection.
pub const INTENT_TERMS: &[&str] = &["want", "need", "goal"];

/// Stated failure, for contradiction detection.
pub const FAILURE_TERMS: &[&str] = &["but", "didn't", "missed"];

/// Phrases that mark something clicking into place.
pub const BREAKTHROUGH_TERMS: &[&str] = &[
    "finally understood",
    "clicked",
    "makes sense now",
    "breakthrough",
    "got it",
    "aha",
];

/// Phrases that mark a repeating error.
pub const MISTAKE_TERMS: &[&str] = &[
    "keep getting wrong",
    "same mistake",
    "always forget",
    "confused about",
    "can't remember",
];

/// Refocus tactics worth surfacing as return protocols.
pub const PROTOCOL_TERMS: &[&str] = &[
    "pomodoro",
    "timer",
    "music",
    "library",
    "coffee shop",
    "study group",
];
