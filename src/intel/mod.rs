//! Unified intelligence state — one consistent, fully-computed snapshot per
//! user, consumed by prompt builders, coaching, and background jobs.

mod builder;
mod types;

pub use builder::{build_intel_state, refresh_exam_threats};
pub use types::UserIntelState;
