//! Immutable catalog of workflow templates.
//!
//! The registry is built once at startup from builtins plus user template
//! files and is never mutated by the engine; instances reference templates
//! by id.

pub mod builtin;
pub mod loader;
pub mod schema;

pub use schema::{StepLink, StepSpec, WorkflowTemplate};

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

/// Catalog of workflow templates, keyed by id
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<Uuid, WorkflowTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in templates
    pub fn load_builtins(&mut self) {
        for template in builtin::builtin_templates() {
            self.templates.insert(template.id, template);
        }
        info!("Loaded {} builtin templates", self.templates.len());
    }

    /// Load user templates from a directory; user templates with a builtin's
    /// id override it
    pub fn load_user_templates(&mut self, path: &Path) -> Result<()> {
        let loaded = loader::load_user_templates(path)?;
        let count = loaded.len();

        for template in loaded {
            if self.templates.contains_key(&template.id) {
                warn!(
                    "User template '{}' overrides existing template {}",
                    template.name, template.id
                );
            }
            self.templates.insert(template.id, template);
        }

        if count > 0 {
            info!("Loaded {count} user templates");
        }
        Ok(())
    }

    /// Register a single template after validating it
    pub fn register(&mut self, template: WorkflowTemplate) -> Result<()> {
        template.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Invalid template '{}': {}", template.name, msgs.join("; "))
        })?;
        self.templates.insert(template.id, template);
        Ok(())
    }

    /// Look up a template by id
    pub fn get(&self, id: Uuid) -> Option<&WorkflowTemplate> {
        self.templates.get(&id)
    }

    /// All templates for a category, sorted by name
    pub fn by_category(&self, category: &str) -> Vec<&WorkflowTemplate> {
        let mut matches: Vec<&WorkflowTemplate> = self
            .templates
            .values()
            .filter(|t| t.category == category)
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches
    }

    /// All templates, sorted by category then name
    pub fn all(&self) -> Vec<&WorkflowTemplate> {
        let mut all: Vec<&WorkflowTemplate> = self.templates.values().collect();
        all.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        all
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
