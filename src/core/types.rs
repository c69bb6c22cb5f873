//! Catalog types: recipes, steps, variable maps, flattened command records.
//!
//! A step's content kind is resolved once at load time into [`StepBody`] and
//! never re-sniffed during traversal. Render variants and variable specs use
//! `IndexMap` because declaration order is load-bearing for output ordering.

use crate::core::selector::StepSelector;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variable mapping passed down a traversal. Extended by cloning when
/// includes merge their overrides, never mutated in place.
pub type VarMap = HashMap<String, serde_yaml_ng::Value>;

/// A named, ordered incident-response procedure.
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Globally unique identifier, also used for cycle detection.
    pub id: String,

    /// Display title (defaults to the id).
    pub title: String,

    /// Free-form tags for catalog search.
    pub tags: Vec<String>,

    /// Declared variables. Only used for mock-value generation during
    /// validation and testing; the engine itself never reads these.
    pub vars: IndexMap<String, VarSpec>,

    /// Ordered steps.
    pub steps: Vec<Step>,
}

/// A declared recipe variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarSpec {
    /// Value type (str, int, float, bool). Defaults to str.
    #[serde(rename = "type", default)]
    pub var_type: Option<String>,

    /// Default value.
    #[serde(default)]
    pub default: Option<serde_yaml_ng::Value>,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// One unit of a recipe.
#[derive(Debug, Clone)]
pub struct Step {
    /// Display name. Falls back to "Step N".
    pub name: Option<String>,

    /// Operator hint appended after the step's content.
    pub hint: Option<String>,

    /// Suggested follow-up recipes, appended as a comma-joined line.
    pub next: Vec<String>,

    /// Content kind.
    pub body: StepBody,
}

impl Step {
    /// Display label for this step at 1-based position `n`.
    pub fn label(&self, n: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Step {}", n),
        }
    }
}

/// Step content, exactly one kind per step.
#[derive(Debug, Clone)]
pub enum StepBody {
    /// Produces commands directly: variant name (pwsh, bash, kql, ...) to
    /// template string, in declaration order.
    Render { variants: IndexMap<String, String> },

    /// Splices another whole recipe.
    Include {
        recipe: String,
        /// Override values are themselves templates, rendered against the
        /// parent's vars before merging. Overrides win on key collision.
        vars: IndexMap<String, String>,
        format: Option<OutputFormat>,
    },

    /// Splices a single step from another recipe. Nested includes inside the
    /// selected step are never followed.
    IncludeStep {
        recipe: String,
        selector: StepSelector,
        /// Render only this variant when set.
        variant: Option<String>,
        vars: IndexMap<String, String>,
        format: Option<OutputFormat>,
    },

    /// None of the recognized content keys were present. A structural error
    /// carried as data so one bad step cannot sink the recipe.
    Invalid { reason: String },
}

/// Output wrapping for rendered blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Md,
}

impl OutputFormat {
    /// Parse a format name. Unrecognized values fall back to text.
    pub fn parse(s: &str) -> Self {
        match s {
            "md" => Self::Md,
            _ => Self::Text,
        }
    }
}

/// One concrete command produced by flattening a recipe, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatCommand {
    /// Id of the recipe that owns the step.
    pub origin_id: String,

    /// Display label of the owning step.
    pub step_label: String,

    /// Variant name, or "error" for trace records.
    pub variant: String,

    /// Rendered command, or an "ERROR: ..." marker.
    pub command: String,
}

/// Catalog index entry exposed by a recipe store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
}

/// Convert a YAML scalar to its template substitution text.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// Build a variable map from a recipe's declarations: defaults where present,
/// otherwise a type-appropriate mock value. Used by `validate` and tests.
pub fn mock_vars(recipe: &Recipe) -> VarMap {
    let mut vars = VarMap::new();
    for (name, spec) in &recipe.vars {
        let value = match &spec.default {
            Some(v) => v.clone(),
            None => mock_value(spec),
        };
        vars.insert(name.clone(), value);
    }
    vars
}

fn mock_value(spec: &VarSpec) -> serde_yaml_ng::Value {
    match spec.var_type.as_deref().unwrap_or("str") {
        "int" | "integer" => serde_yaml_ng::Value::Number(1.into()),
        "float" | "number" => serde_yaml_ng::Value::Number(serde_yaml_ng::Number::from(1.0)),
        "bool" | "boolean" => serde_yaml_ng::Value::Bool(true),
        _ => serde_yaml_ng::Value::String("x".to_string()),
    }
}
