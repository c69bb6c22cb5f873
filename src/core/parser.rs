//! Recipe YAML parsing and validation.
//!
//! Parses recipe files and resolves each step's content kind exactly once.
//! Key precedence when several content keys are present: render, then
//! include, then include_step. A step with none of them, or with a selector
//! of unusable shape, becomes [`StepBody::Invalid`] rather than a parse
//! failure, so the rest of the recipe stays usable.

use crate::core::selector::StepSelector;
use crate::core::types::{OutputFormat, Recipe, Step, StepBody, VarSpec};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// On-disk recipe schema before step-kind resolution.
#[derive(Debug, serde::Deserialize)]
struct RawRecipe {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    vars: IndexMap<String, VarSpec>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, serde::Deserialize)]
struct RawStep {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    next: Vec<String>,

    #[serde(default)]
    render: Option<IndexMap<String, String>>,
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    include_step: Option<String>,

    /// Step selector for include_step: integer or name.
    #[serde(default)]
    step: Option<serde_yaml_ng::Value>,
    /// Single variant filter for include_step.
    #[serde(default)]
    variant: Option<String>,
    /// Variable overrides for include / include_step.
    #[serde(default)]
    vars: IndexMap<String, String>,
    /// Output format override for include / include_step.
    #[serde(default)]
    format: Option<String>,
}

/// Parse a recipe from a YAML file.
pub fn parse_recipe_file(path: &Path) -> Result<Recipe, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read recipe {}: {}", path.display(), e))?;
    parse_recipe(&content)
}

/// Parse a recipe from a YAML string.
pub fn parse_recipe(yaml: &str) -> Result<Recipe, String> {
    let raw: RawRecipe =
        serde_yaml_ng::from_str(yaml).map_err(|e| format!("recipe parse error: {}", e))?;

    let title = raw.title.unwrap_or_else(|| raw.id.clone());
    Ok(Recipe {
        id: raw.id,
        title,
        tags: raw.tags,
        vars: raw.vars,
        steps: raw.steps.into_iter().map(resolve_step).collect(),
    })
}

/// Resolve a raw step into its single content kind.
fn resolve_step(raw: RawStep) -> Step {
    let format = raw.format.as_deref().map(OutputFormat::parse);

    let body = if let Some(variants) = raw.render {
        StepBody::Render { variants }
    } else if let Some(recipe) = raw.include {
        StepBody::Include {
            recipe,
            vars: raw.vars,
            format,
        }
    } else if let Some(recipe) = raw.include_step {
        match raw.step {
            Some(ref value) => match StepSelector::from_value(value) {
                Ok(selector) => StepBody::IncludeStep {
                    recipe,
                    selector,
                    variant: raw.variant,
                    vars: raw.vars,
                    format,
                },
                Err(reason) => StepBody::Invalid { reason },
            },
            None => StepBody::Invalid {
                reason: format!("include_step '{}' is missing a 'step' selector", recipe),
            },
        }
    } else {
        StepBody::Invalid {
            reason: "step has no render, include, or include_step".to_string(),
        }
    };

    Step {
        name: raw.name,
        hint: raw.hint,
        next: raw.next,
        body,
    }
}

/// Validate a parsed recipe. Returns a list of errors (empty = valid).
pub fn validate_recipe(recipe: &Recipe) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if recipe.id.trim().is_empty() {
        errors.push(ValidationError {
            message: "id must not be empty".to_string(),
        });
    }

    if recipe.steps.is_empty() {
        errors.push(ValidationError {
            message: format!("recipe '{}' has no steps", recipe.id),
        });
    }

    for (i, step) in recipe.steps.iter().enumerate() {
        let n = i + 1;
        match &step.body {
            StepBody::Render { variants } => {
                if variants.is_empty() {
                    errors.push(ValidationError {
                        message: format!(
                            "recipe '{}' step {} has an empty render block",
                            recipe.id, n
                        ),
                    });
                }
                for (variant, template) in variants {
                    if template.trim().is_empty() {
                        errors.push(ValidationError {
                            message: format!(
                                "recipe '{}' step {} variant '{}' has an empty template",
                                recipe.id, n, variant
                            ),
                        });
                    }
                }
            }
            StepBody::Include { recipe: target, .. }
            | StepBody::IncludeStep { recipe: target, .. } => {
                if target.trim().is_empty() {
                    errors.push(ValidationError {
                        message: format!(
                            "recipe '{}' step {} includes an empty recipe id",
                            recipe.id, n
                        ),
                    });
                }
            }
            StepBody::Invalid { reason } => {
                errors.push(ValidationError {
                    message: format!("recipe '{}' step {}: {}", recipe.id, n, reason),
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_recipe() {
        let recipe = parse_recipe(
            r#"
id: windows/process/list
title: Process list and triage
tags: [windows, process]
steps:
  - name: Snapshot
    render:
      pwsh: "Get-Process | Sort-Object CPU -Descending"
      cmd: "tasklist /v"
    hint: "Look for unsigned binaries in user-writable paths"
    next: [windows/process/triage]
"#,
        )
        .unwrap();

        assert_eq!(recipe.id, "windows/process/list");
        assert_eq!(recipe.title, "Process list and triage");
        assert_eq!(recipe.tags, vec!["windows", "process"]);
        assert_eq!(recipe.steps.len(), 1);

        let step = &recipe.steps[0];
        assert_eq!(step.hint.as_deref(), Some("Look for unsigned binaries in user-writable paths"));
        assert_eq!(step.next, vec!["windows/process/triage"]);
        match &step.body {
            StepBody::Render { variants } => {
                let keys: Vec<_> = variants.keys().collect();
                assert_eq!(keys, vec!["pwsh", "cmd"]);
            }
            other => panic!("expected render step, got {:?}", other),
        }
    }

    #[test]
    fn test_title_defaults_to_id() {
        let recipe = parse_recipe("id: linux/process/list\nsteps: []\n").unwrap();
        assert_eq!(recipe.title, "linux/process/list");
    }

    #[test]
    fn test_parse_include_step_kinds() {
        let recipe = parse_recipe(
            r#"
id: incident/host/baseline
steps:
  - include: windows/process/list
    vars:
      pid: "{{suspect_pid}}"
    format: md
  - include_step: windows/network/connections
    step: 2
    variant: pwsh
  - include_step: linux/process/list
    step: Snapshot
"#,
        )
        .unwrap();

        match &recipe.steps[0].body {
            StepBody::Include {
                recipe: target,
                vars,
                format,
            } => {
                assert_eq!(target, "windows/process/list");
                assert_eq!(vars["pid"], "{{suspect_pid}}");
                assert_eq!(*format, Some(OutputFormat::Md));
            }
            other => panic!("expected include, got {:?}", other),
        }

        match &recipe.steps[1].body {
            StepBody::IncludeStep {
                selector, variant, ..
            } => {
                assert_eq!(*selector, StepSelector::Index(2));
                assert_eq!(variant.as_deref(), Some("pwsh"));
            }
            other => panic!("expected include_step, got {:?}", other),
        }

        match &recipe.steps[2].body {
            StepBody::IncludeStep { selector, .. } => {
                assert_eq!(*selector, StepSelector::Name("Snapshot".to_string()));
            }
            other => panic!("expected include_step, got {:?}", other),
        }
    }

    #[test]
    fn test_step_with_no_content_is_invalid_not_fatal() {
        let recipe = parse_recipe(
            r#"
id: t
steps:
  - name: Broken
    hint: "authoring mistake"
  - render:
      bash: "uname -a"
"#,
        )
        .unwrap();

        assert!(matches!(recipe.steps[0].body, StepBody::Invalid { .. }));
        assert!(matches!(recipe.steps[1].body, StepBody::Render { .. }));
    }

    #[test]
    fn test_render_wins_over_include() {
        let recipe = parse_recipe(
            r#"
id: t
steps:
  - render:
      bash: "w"
    include: other/recipe
"#,
        )
        .unwrap();
        assert!(matches!(recipe.steps[0].body, StepBody::Render { .. }));
    }

    #[test]
    fn test_include_step_bad_selector_shape_is_invalid() {
        let recipe = parse_recipe(
            r#"
id: t
steps:
  - include_step: other/recipe
    step: [1, 2]
"#,
        )
        .unwrap();
        match &recipe.steps[0].body {
            StepBody::Invalid { reason } => assert!(reason.contains("selector")),
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_include_step_missing_selector_is_invalid() {
        let recipe = parse_recipe("id: t\nsteps:\n  - include_step: other/recipe\n").unwrap();
        assert!(matches!(recipe.steps[0].body, StepBody::Invalid { .. }));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(parse_recipe("not: [valid: yaml: {{").is_err());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yaml");
        std::fs::write(&path, "id: from-disk\nsteps: []\n").unwrap();
        let recipe = parse_recipe_file(&path).unwrap();
        assert_eq!(recipe.id, "from-disk");
    }

    #[test]
    fn test_validate_ok() {
        let recipe = parse_recipe(
            r#"
id: ok
steps:
  - render:
      bash: "last -20"
"#,
        )
        .unwrap();
        assert!(validate_recipe(&recipe).is_empty());
    }

    #[test]
    fn test_validate_flags_problems() {
        let recipe = parse_recipe(
            r#"
id: bad
steps:
  - render: {}
  - render:
      bash: "   "
  - name: nothing here
  - include: ""
"#,
        )
        .unwrap();
        let errors = validate_recipe(&recipe);
        assert!(errors.iter().any(|e| e.message.contains("empty render block")));
        assert!(errors.iter().any(|e| e.message.contains("empty template")));
        assert!(errors
            .iter()
            .any(|e| e.message.contains("no render, include, or include_step")));
        assert!(errors.iter().any(|e| e.message.contains("empty recipe id")));
    }

    #[test]
    fn test_validate_empty_steps() {
        let recipe = parse_recipe("id: hollow\nsteps: []\n").unwrap();
        let errors = validate_recipe(&recipe);
        assert!(errors.iter().any(|e| e.message.contains("no steps")));
    }
}
