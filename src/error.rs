//! Error taxonomy for the intelligence core.
//!
//! Pure computations (patterns, threats, identity, semantic threads,
//! coaching generation) never fail on in-range input — they produce
//! degenerate-but-valid output for empty inputs. These variants cover the
//! I/O-performing entry points and the validated mutation paths.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntelError {
    /// A required record does not exist. Entry points that address a single
    /// named entity ("update this exam") signal this instead of no-opping.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A numeric input fell outside its expected domain. Nothing was written.
    #[error("{field} must be between {min} and {max} (got {value})")]
    InvalidRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    /// A collaborator (text generation, free-text record fetch) failed.
    /// Callers decide whether to degrade or surface this.
    #[error("{service} unavailable: {message}")]
    External {
        service: &'static str,
        message: String,
    },

    /// Record-store failure on a core fetch or write. Always propagates.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type IntelResult<T> = Result<T, IntelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_range_names_the_constraint() {
        let err = IntelError::InvalidRange {
            field: "quality",
            min: 1,
            max: 5,
            value: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("quality"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = IntelError::NotFound {
            entity: "exam",
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "exam 'abc' not found");
    }
}
