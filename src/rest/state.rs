//! API state management for the REST server.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::engine::WorkflowEngine;
use crate::store::Journal;
use crate::templates::TemplateRegistry;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    /// The workflow engine; already recovered from its journal
    pub engine: Arc<WorkflowEngine>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl ApiState {
    /// Build the full engine stack from config: template catalog, journal,
    /// and recovery replay.
    pub fn new(config: Config) -> Result<Self> {
        let mut registry = TemplateRegistry::new();
        registry.load_builtins();

        if let Err(e) = registry.load_user_templates(&config.templates_path()) {
            tracing::warn!("Failed to load user templates: {e}");
        }

        let journal = Journal::open(config.journal_path())?;
        let engine = WorkflowEngine::recover(registry, journal)?;

        Ok(Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        })
    }

    /// Wrap an already-built engine (used by tests)
    pub fn with_engine(engine: WorkflowEngine, config: Config) -> Self {
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_api_state_new() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state = temp.path().to_string_lossy().to_string();

        let state = ApiState::new(config).unwrap();
        assert_eq!(state.engine.templates().len(), 3);
    }
}
