//! Step selection within a recipe, by 1-based index or exact name.
//!
//! The selector is a sum type chosen at the call boundary. Name matching is
//! exact and case-sensitive: selectors are structural identifiers, unlike
//! catalog search which is case-insensitive free text.

use crate::core::types::{Recipe, Step};
use std::fmt;

/// How to pick a step out of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSelector {
    /// 1-based position.
    Index(i64),
    /// Exact step label.
    Name(String),
}

impl StepSelector {
    /// Build a selector from a YAML value. Anything other than an integer or
    /// a string is an unusable shape.
    pub fn from_value(value: &serde_yaml_ng::Value) -> Result<Self, String> {
        match value {
            serde_yaml_ng::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Index(i)),
                None => Err(format!("step selector must be an integer, got {}", n)),
            },
            serde_yaml_ng::Value::String(s) => Ok(Self::Name(s.clone())),
            other => Err(format!(
                "step selector must be an integer or step name, got {:?}",
                other
            )),
        }
    }
}

impl fmt::Display for StepSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{}", i),
            Self::Name(s) => write!(f, "'{}'", s),
        }
    }
}

/// Selection failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// Index outside 1..=len.
    OutOfRange { given: i64, len: usize },
    /// No step carries the requested label.
    NoSuchStep { name: String },
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { given, len } => {
                write!(f, "step index {} out of range (valid: 1..={})", given, len)
            }
            Self::NoSuchStep { name } => write!(f, "no step named '{}'", name),
        }
    }
}

impl std::error::Error for SelectError {}

/// Resolve a selector to a step, returning its 1-based position as well.
/// First match wins for name selectors. No side effects.
pub fn select_step<'a>(
    recipe: &'a Recipe,
    selector: &StepSelector,
) -> Result<(usize, &'a Step), SelectError> {
    match selector {
        StepSelector::Index(i) => {
            let len = recipe.steps.len();
            if *i < 1 || *i as usize > len {
                return Err(SelectError::OutOfRange { given: *i, len });
            }
            let pos = *i as usize;
            Ok((pos, &recipe.steps[pos - 1]))
        }
        StepSelector::Name(name) => recipe
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| (idx + 1, step))
            .find(|(pos, step)| step.label(*pos) == *name)
            .ok_or_else(|| SelectError::NoSuchStep { name: name.clone() }),
    }
}
