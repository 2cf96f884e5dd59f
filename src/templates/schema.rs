//! Schema definitions for workflow templates.
//!
//! Templates are immutable step sequences with per-step time estimates,
//! authored outside this service and only ever read by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step within a workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name (e.g., "Reproduce Bug")
    pub name: String,
    /// Detailed description of what to do
    pub description: String,
    /// Estimated time in seconds; zero means no estimate
    #[serde(default)]
    pub estimated_seconds: i64,
}

/// A link attached to a finished step (e.g., a test run or a ticket)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLink {
    pub title: String,
    pub url: String,
}

/// Source of a template definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSource {
    /// Built into the tempo binary
    #[default]
    Builtin,
    /// User-defined JSON file under the state directory
    User,
}

/// An immutable workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Unique identifier
    pub id: Uuid,
    /// Template name
    pub name: String,
    /// What this template is for
    #[serde(default)]
    pub description: String,
    /// Work-item category this template applies to (e.g., "bug", "feature")
    pub category: String,
    /// Ordered steps
    pub steps: Vec<StepSpec>,
    /// Where the template came from
    #[serde(default)]
    pub source: TemplateSource,
    /// When the template was authored
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowTemplate {
    /// Parse a template from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step at the given index, if any
    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.steps.get(index)
    }

    /// Sum of all step estimates in seconds
    pub fn total_estimated_seconds(&self) -> i64 {
        self.steps.iter().map(|s| s.estimated_seconds).sum()
    }

    /// Validate the template for consistency
    pub fn validate(&self) -> Result<(), Vec<TemplateValidationError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(TemplateValidationError::EmptyName);
        }

        if self.category.trim().is_empty() {
            errors.push(TemplateValidationError::EmptyCategory);
        }

        if self.steps.is_empty() {
            errors.push(TemplateValidationError::NoSteps);
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                errors.push(TemplateValidationError::UnnamedStep(index));
            }
            if step.estimated_seconds < 0 {
                errors.push(TemplateValidationError::NegativeEstimate(step.name.clone()));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                errors.push(TemplateValidationError::DuplicateStep(step.name.clone()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validation errors for workflow templates
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValidationError {
    /// Template name is empty
    EmptyName,
    /// Category is empty
    EmptyCategory,
    /// Template has no steps
    NoSteps,
    /// Step at this index has no name
    UnnamedStep(usize),
    /// Two steps share the same name
    DuplicateStep(String),
    /// Step estimate is negative
    NegativeEstimate(String),
}

impl std::fmt::Display for TemplateValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateValidationError::EmptyName => {
                write!(f, "Template name must not be empty")
            }
            TemplateValidationError::EmptyCategory => {
                write!(f, "Template category must not be empty")
            }
            TemplateValidationError::NoSteps => {
                write!(f, "Template must have at least one step")
            }
            TemplateValidationError::UnnamedStep(index) => {
                write!(f, "Step at index {index} has no name")
            }
            TemplateValidationError::DuplicateStep(name) => {
                write!(f, "Duplicate step name '{name}'")
            }
            TemplateValidationError::NegativeEstimate(name) => {
                write!(f, "Step '{name}' has a negative estimate")
            }
        }
    }
}

impl std::error::Error for TemplateValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(steps: Vec<StepSpec>) -> WorkflowTemplate {
        WorkflowTemplate {
            id: Uuid::new_v4(),
            name: "Bug Fix Workflow".to_string(),
            description: "Guided workflow for bug fixes".to_string(),
            category: "bug".to_string(),
            steps,
            source: TemplateSource::User,
            created_at: Utc::now(),
        }
    }

    fn step(name: &str, estimated_seconds: i64) -> StepSpec {
        StepSpec {
            name: name.to_string(),
            description: format!("{name} description"),
            estimated_seconds,
        }
    }

    #[test]
    fn test_valid_template() {
        let t = template(vec![step("Reproduce", 600), step("Fix", 900)]);
        assert!(t.validate().is_ok());
        assert_eq!(t.step_count(), 2);
        assert_eq!(t.total_estimated_seconds(), 1500);
    }

    #[test]
    fn test_empty_steps_rejected() {
        let t = template(vec![]);
        let errors = t.validate().unwrap_err();
        assert!(errors.contains(&TemplateValidationError::NoSteps));
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let t = template(vec![step("Verify", 300), step("Verify", 600)]);
        let errors = t.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, TemplateValidationError::DuplicateStep(_))));
    }

    #[test]
    fn test_negative_estimate_rejected() {
        let t = template(vec![step("Verify", -5)]);
        let errors = t.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, TemplateValidationError::NegativeEstimate(_))));
    }

    #[test]
    fn test_from_json_roundtrip() {
        let t = template(vec![step("Reproduce", 600)]);
        let json = serde_json::to_string(&t).unwrap();
        let parsed = WorkflowTemplate::from_json(&json).unwrap();
        assert_eq!(parsed.id, t.id);
        assert_eq!(parsed.steps[0].estimated_seconds, 600);
    }

    #[test]
    fn test_validation_error_display() {
        let err = TemplateValidationError::DuplicateStep("Verify".to_string());
        assert_eq!(err.to_string(), "Duplicate step name 'Verify'");
    }
}
