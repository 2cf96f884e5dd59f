//! Built-in workflow templates.
//!
//! These ship with the binary so the engine is usable before any user
//! templates exist. Ids are fixed so journal records keep resolving across
//! restarts and upgrades.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use super::schema::{StepSpec, TemplateSource, WorkflowTemplate};

/// Stable id of the built-in bug fix template
pub const BUG_FIX_TEMPLATE_ID: Uuid = Uuid::from_u128(0x7d3f_1a02_94b6_4c11_8e5a_0d2c_31f7_a001);

/// Stable id of the built-in feature test template
pub const FEATURE_TEST_TEMPLATE_ID: Uuid =
    Uuid::from_u128(0x7d3f_1a02_94b6_4c11_8e5a_0d2c_31f7_a002);

/// Stable id of the built-in regression test template
pub const REGRESSION_TEMPLATE_ID: Uuid =
    Uuid::from_u128(0x7d3f_1a02_94b6_4c11_8e5a_0d2c_31f7_a003);

fn step(name: &str, description: &str, estimated_seconds: i64) -> StepSpec {
    StepSpec {
        name: name.to_string(),
        description: description.to_string(),
        estimated_seconds,
    }
}

fn builtin(id: Uuid, name: &str, description: &str, category: &str, steps: Vec<StepSpec>) -> WorkflowTemplate {
    WorkflowTemplate {
        id,
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        steps,
        source: TemplateSource::Builtin,
        // Fixed authoring date keeps builtins byte-stable across restarts
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Bug fix workflow steps
pub fn bug_fix_steps() -> Vec<StepSpec> {
    vec![
        step(
            "Reproduce Bug",
            "Follow the steps in the ticket to reproduce the bug. Document exact steps, environment, and any variations observed.",
            900,
        ),
        step(
            "Investigate Root Cause",
            "Analyze logs, code, and related components to identify the root cause. Note any related issues or dependencies.",
            1200,
        ),
        step(
            "Test Fix",
            "Verify the fix resolves the original issue. Test with the same steps used to reproduce, plus variations.",
            1800,
        ),
        step(
            "Regression Check",
            "Ensure the fix doesn't break existing functionality. Run related test cases and check impacted areas.",
            1200,
        ),
        step(
            "Document Findings",
            "Update the ticket with test results, any issues found, and recommendations. Link related test cases.",
            600,
        ),
    ]
}

/// Feature test workflow steps
pub fn feature_test_steps() -> Vec<StepSpec> {
    vec![
        step(
            "Review Requirements",
            "Read the feature requirements, acceptance criteria, and design documents. Identify testable scenarios.",
            900,
        ),
        step(
            "Exploratory Testing",
            "Explore the feature freely to understand its behavior. Note unexpected behaviors and potential edge cases.",
            2700,
        ),
        step(
            "Happy Path Testing",
            "Test the main user flows with valid inputs. Verify all acceptance criteria are met.",
            1800,
        ),
        step(
            "Edge Case Testing",
            "Test boundary conditions, invalid inputs, error handling, and unusual scenarios.",
            1800,
        ),
        step(
            "Document Test Cases",
            "Record test cases executed, results, and any bugs found. Update test documentation.",
            900,
        ),
    ]
}

/// Regression test workflow steps
pub fn regression_steps() -> Vec<StepSpec> {
    vec![
        step(
            "Setup Test Environment",
            "Prepare the test environment with correct version, data, and configurations. Verify environment health.",
            1200,
        ),
        step(
            "Run Test Suite",
            "Execute the regression test suite. Monitor for failures and performance issues.",
            3600,
        ),
        step(
            "Analyze Failures",
            "Investigate any test failures. Determine if failures are bugs, test issues, or environment problems.",
            1800,
        ),
        step(
            "Generate Report",
            "Create a summary report with pass/fail rates, identified issues, and recommendations.",
            900,
        ),
    ]
}

/// All built-in templates
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        builtin(
            BUG_FIX_TEMPLATE_ID,
            "Bug Fix Workflow",
            "Guided workflow for testing bug fixes. Covers reproduction, investigation, fix verification, and regression testing.",
            "bug",
            bug_fix_steps(),
        ),
        builtin(
            FEATURE_TEST_TEMPLATE_ID,
            "Feature Test Workflow",
            "Comprehensive workflow for testing new features. Includes requirements review, exploratory testing, and edge case coverage.",
            "feature",
            feature_test_steps(),
        ),
        builtin(
            REGRESSION_TEMPLATE_ID,
            "Regression Test Workflow",
            "Workflow for regression testing. Guides through environment setup, test execution, failure analysis, and reporting.",
            "regression",
            regression_steps(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bug_fix_template_has_5_steps() {
        let steps = bug_fix_steps();
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0].name, "Reproduce Bug");
        assert_eq!(steps[4].name, "Document Findings");
    }

    #[test]
    fn test_feature_test_template_has_5_steps() {
        let steps = feature_test_steps();
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0].name, "Review Requirements");
        assert_eq!(steps[4].name, "Document Test Cases");
    }

    #[test]
    fn test_regression_template_has_4_steps() {
        let steps = regression_steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].name, "Setup Test Environment");
        assert_eq!(steps[3].name, "Generate Report");
    }

    #[test]
    fn test_all_builtins_validate() {
        for template in builtin_templates() {
            assert!(
                template.validate().is_ok(),
                "builtin '{}' failed validation",
                template.name
            );
            assert_eq!(template.source, TemplateSource::Builtin);
        }
    }

    #[test]
    fn test_builtin_ids_are_distinct_and_stable() {
        let templates = builtin_templates();
        let again = builtin_templates();
        for (a, b) in templates.iter().zip(again.iter()) {
            assert_eq!(a.id, b.id);
        }
        assert_ne!(BUG_FIX_TEMPLATE_ID, FEATURE_TEST_TEMPLATE_ID);
        assert_ne!(FEATURE_TEST_TEMPLATE_ID, REGRESSION_TEMPLATE_ID);
    }

    #[test]
    fn test_total_estimates() {
        // Bug fix: 900 + 1200 + 1800 + 1200 + 600 = 5700 seconds
        let total: i64 = bug_fix_steps().iter().map(|s| s.estimated_seconds).sum();
        assert_eq!(total, 5700);

        // Regression: 1200 + 3600 + 1800 + 900 = 7500 seconds
        let total: i64 = regression_steps().iter().map(|s| s.estimated_seconds).sum();
        assert_eq!(total, 7500);
    }
}
