//! Template substitution, the injected rendering capability.
//!
//! The traversal code is decoupled from any particular template grammar: it
//! only sees the [`TemplateEngine`] contract. The default engine resolves
//! `{{name}}` occurrences against the variable map.

use crate::core::types::{yaml_value_to_string, VarMap};
use indexmap::IndexMap;
use std::fmt;

/// Substitution failure with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    pub message: String,
}

impl TemplateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TemplateError {}

/// Given a template string and a variable mapping, produce text or fail.
pub trait TemplateEngine {
    fn render(&self, template: &str, vars: &VarMap) -> Result<String, TemplateError>;
}

/// Default engine: `{{name}}` lookup and replacement.
#[derive(Debug, Default, Clone, Copy)]
pub struct VarSubst;

impl TemplateEngine for VarSubst {
    fn render(&self, template: &str, vars: &VarMap) -> Result<String, TemplateError> {
        let mut result = template.to_string();
        let mut start = 0;

        while let Some(open) = result[start..].find("{{") {
            let open = start + open;
            let close = result[open..]
                .find("}}")
                .ok_or_else(|| TemplateError::new(format!("unclosed template at position {}", open)))?;
            let close = open + close + 2;
            let key = result[open + 2..close - 2].trim();

            let value = vars
                .get(key)
                .map(yaml_value_to_string)
                .ok_or_else(|| TemplateError::new(format!("unknown variable: {}", key)))?;

            result.replace_range(open..close, &value);
            start = open + value.len();
        }

        Ok(result)
    }
}

/// Compute child variables for an include: each override value is rendered
/// against the parent's vars, then merged on top of them (override wins).
/// The parent map is cloned, never mutated.
pub fn merge_child_vars(
    engine: &dyn TemplateEngine,
    parent: &VarMap,
    overrides: &IndexMap<String, String>,
) -> Result<VarMap, TemplateError> {
    let mut child = parent.clone();
    for (name, template) in overrides {
        let rendered = engine.render(template, parent)?;
        child.insert(name.clone(), serde_yaml_ng::Value::String(rendered));
    }
    Ok(child)
}
