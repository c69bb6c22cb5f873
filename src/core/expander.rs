//! Recursive recipe expansion into formatted, human-oriented output.
//!
//! Walks steps in declaration order, splicing whole-recipe includes and
//! single-step includes. Failures are isolated per step or per variant: a
//! broken include or template becomes an inline marker and every remaining
//! step still renders. An operator mid-incident gets a usable partial
//! checklist instead of an all-or-nothing failure.
//!
//! Cycle handling is non-fatal: a recipe id already on the current ancestry
//! branch produces a single warning line and recursion stops there. The
//! ancestry path is copied on descend, so sibling branches stay independent.

use crate::catalog::RecipeStore;
use crate::core::selector::{select_step, StepSelector};
use crate::core::template::{merge_child_vars, TemplateEngine};
use crate::core::types::{OutputFormat, Recipe, StepBody, VarMap};
use indexmap::IndexMap;

pub struct Expander<'a> {
    store: &'a dyn RecipeStore,
    engine: &'a dyn TemplateEngine,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a dyn RecipeStore, engine: &'a dyn TemplateEngine) -> Self {
        Self { store, engine }
    }

    /// Expand a recipe with the given variables. Never fails: every error is
    /// converted to an inline marker at the point of occurrence.
    pub fn expand(&self, recipe: &Recipe, vars: &VarMap, format: OutputFormat) -> String {
        self.expand_inner(recipe, vars, format, &[])
    }

    fn expand_inner(
        &self,
        recipe: &Recipe,
        vars: &VarMap,
        format: OutputFormat,
        ancestry: &[String],
    ) -> String {
        if ancestry.iter().any(|id| id == &recipe.id) {
            return cycle_marker(&recipe.id);
        }
        let mut path = ancestry.to_vec();
        path.push(recipe.id.clone());

        let mut out: Vec<String> = Vec::new();
        out.push(format!("# {}\n", recipe.title));

        for (i, step) in recipe.steps.iter().enumerate() {
            let n = i + 1;
            out.push(format!("[{}] {}", n, step.label(n)));

            match &step.body {
                StepBody::Render { variants } => {
                    for (variant, template) in variants {
                        out.push(self.render_block(variant, template, vars, format));
                    }
                }
                StepBody::Include {
                    recipe: target,
                    vars: overrides,
                    format: override_format,
                } => match self.load_child(target, overrides, vars) {
                    Ok((child, child_vars)) => {
                        let child_format = override_format.unwrap_or(format);
                        out.push(self.expand_inner(&child, &child_vars, child_format, &path));
                    }
                    Err(reason) => out.push(include_failure(target, &reason)),
                },
                StepBody::IncludeStep {
                    recipe: target,
                    selector,
                    variant,
                    vars: overrides,
                    format: override_format,
                } => {
                    let child_format = override_format.unwrap_or(format);
                    match self.render_selected(
                        target,
                        selector,
                        variant.as_deref(),
                        overrides,
                        vars,
                        child_format,
                    ) {
                        Ok(blocks) => out.extend(blocks),
                        Err(reason) => out.push(include_failure(target, &reason)),
                    }
                }
                StepBody::Invalid { reason } => out.push(format!("ERROR: {}", reason)),
            }

            if let Some(hint) = &step.hint {
                out.push(format!("Hint: {}", hint));
            }
            if !step.next.is_empty() {
                out.push(format!("Next pivots: {}", step.next.join(", ")));
            }
            out.push(String::new()); // spacing
        }

        out.join("\n")
    }

    /// Render one (variant, template) pair into a wrapped block. Substitution
    /// failure becomes the block's content, never an abort.
    fn render_block(
        &self,
        variant: &str,
        template: &str,
        vars: &VarMap,
        format: OutputFormat,
    ) -> String {
        let content = match self.engine.render(template, vars) {
            Ok(rendered) => rendered,
            Err(e) => format!("ERROR: {}", e),
        };
        match format {
            OutputFormat::Md => format!("```{}\n{}\n```", variant, content),
            OutputFormat::Text => format!("{}:\n{}", variant.to_uppercase(), content),
        }
    }

    /// Load an include target and compute its merged variable map.
    fn load_child(
        &self,
        target: &str,
        overrides: &IndexMap<String, String>,
        vars: &VarMap,
    ) -> Result<(Recipe, VarMap), String> {
        let child = self.store.load(target).map_err(|e| e.to_string())?;
        let child_vars =
            merge_child_vars(self.engine, vars, overrides).map_err(|e| e.to_string())?;
        Ok((child, child_vars))
    }

    /// Render a single selected step of another recipe. The selected step
    /// must itself be a render step; nested includes are never followed.
    fn render_selected(
        &self,
        target: &str,
        selector: &StepSelector,
        variant_filter: Option<&str>,
        overrides: &IndexMap<String, String>,
        vars: &VarMap,
        format: OutputFormat,
    ) -> Result<Vec<String>, String> {
        let (child, child_vars) = self.load_child(target, overrides, vars)?;
        let (pos, step) = select_step(&child, selector).map_err(|e| e.to_string())?;

        let variants = match &step.body {
            StepBody::Render { variants } => variants,
            _ => {
                return Err(format!(
                    "step {} ('{}') is not a render step",
                    selector,
                    step.label(pos)
                ))
            }
        };

        match variant_filter {
            Some(wanted) => {
                let template = variants.get(wanted).ok_or_else(|| {
                    format!("no variant '{}' in step '{}'", wanted, step.label(pos))
                })?;
                Ok(vec![self.render_block(wanted, template, &child_vars, format)])
            }
            None => Ok(variants
                .iter()
                .map(|(variant, template)| {
                    self.render_block(variant, template, &child_vars, format)
                })
                .collect()),
        }
    }
}

pub(crate) fn cycle_marker(id: &str) -> String {
    format!("WARNING: cycle detected: '{}' is already being expanded", id)
}

pub(crate) fn include_failure(target: &str, reason: &str) -> String {
    format!("failed to include {}: {}", target, reason)
}
