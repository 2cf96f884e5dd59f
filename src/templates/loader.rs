//! Filesystem loading for user-defined templates.
//!
//! Scans a directory for `*.json` template files. Invalid files are logged
//! as warnings and skipped so one bad template never takes the service down.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::schema::{TemplateSource, WorkflowTemplate};

/// Load user-defined templates from a directory
pub fn load_user_templates(path: &Path) -> Result<Vec<WorkflowTemplate>> {
    let mut templates = Vec::new();

    if !path.exists() {
        debug!("Template directory does not exist: {}", path.display());
        return Ok(templates);
    }

    let entries = fs::read_dir(path)
        .with_context(|| format!("Failed to read template directory: {}", path.display()))?;

    for entry in entries {
        let entry = entry?;
        let file_path = entry.path();

        if file_path.is_dir() || file_path.extension().is_none_or(|e| e != "json") {
            continue;
        }

        match load_template_file(&file_path) {
            Ok(mut template) => {
                template.source = TemplateSource::User;
                debug!(
                    "Loaded template '{}' from {}",
                    template.name,
                    file_path.display()
                );
                templates.push(template);
            }
            Err(e) => {
                warn!("Failed to load template from {}: {}", file_path.display(), e);
            }
        }
    }

    Ok(templates)
}

/// Load and validate a single template file
fn load_template_file(path: &Path) -> Result<WorkflowTemplate> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let template = WorkflowTemplate::from_json(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    template.validate().map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("Invalid template: {}", msgs.join("; "))
    })?;

    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::schema::StepSpec;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn write_template(dir: &Path, filename: &str, template: &WorkflowTemplate) {
        let json = serde_json::to_string_pretty(template).unwrap();
        fs::write(dir.join(filename), json).unwrap();
    }

    fn sample_template() -> WorkflowTemplate {
        WorkflowTemplate {
            id: Uuid::new_v4(),
            name: "Hotfix Workflow".to_string(),
            description: "Fast path for urgent fixes".to_string(),
            category: "hotfix".to_string(),
            steps: vec![StepSpec {
                name: "Patch".to_string(),
                description: "Apply and verify the patch".to_string(),
                estimated_seconds: 600,
            }],
            source: TemplateSource::User,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let templates = load_user_templates(&temp.path().join("nope")).unwrap();
        assert!(templates.is_empty());
    }

    #[test]
    fn test_loads_valid_templates() {
        let temp = TempDir::new().unwrap();
        write_template(temp.path(), "hotfix.json", &sample_template());

        let templates = load_user_templates(temp.path()).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Hotfix Workflow");
        assert_eq!(templates[0].source, TemplateSource::User);
    }

    #[test]
    fn test_skips_invalid_json() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.json"), "{ not json").unwrap();
        write_template(temp.path(), "ok.json", &sample_template());

        let templates = load_user_templates(temp.path()).unwrap();
        assert_eq!(templates.len(), 1);
    }

    #[test]
    fn test_skips_invalid_template() {
        let temp = TempDir::new().unwrap();
        let mut bad = sample_template();
        bad.steps.clear();
        write_template(temp.path(), "bad.json", &bad);

        let templates = load_user_templates(temp.path()).unwrap();
        assert!(templates.is_empty());
    }

    #[test]
    fn test_ignores_non_json_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "not a template").unwrap();

        let templates = load_user_templates(temp.path()).unwrap();
        assert!(templates.is_empty());
    }
}
