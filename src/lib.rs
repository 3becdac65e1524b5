pub mod coaching;
pub mod config;
pub mod error;
pub mod generation;
pub mod identity;
pub mod intel;
pub mod jobs;
pub mod mastery;
pub mod observability;
pub mod patterns;
pub mod prompts;
pub mod semantic;
pub mod storage;
pub mod threat;

use std::sync::Arc;

use coaching::CoachingStorage;
use config::StudydConfig;
use generation::TextGenerator;
use storage::Storage;

/// Shared application state passed to CLI handlers and background jobs.
///
/// Engines themselves are stateless functions; this carries only the
/// injected collaborators (store, generator) and process-wide config.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<StudydConfig>,
    pub storage: Arc<Storage>,
    pub coaching: Arc<CoachingStorage>,
    /// The opaque text-generation collaborator.
    pub generator: Arc<dyn TextGenerator>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(
        config: StudydConfig,
        storage: Storage,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let coaching = CoachingStorage::new(storage.pool());
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            coaching: Arc::new(coaching),
            generator,
            started_at: std::time::Instant::now(),
        }
    }
}
