//! Flattening: reduce a composed recipe into an ordered command sequence.
//!
//! Same traversal and isolation rules as the expander (cycle guard,
//! copy-on-descend ancestry, override merging, single-level include_step),
//! but the output is one machine-readable record per rendered command,
//! tagged with the id of the recipe that owns the step. Planning tools
//! count these records, so a failure never silently drops one: it becomes
//! a trace record with variant "error" and an "ERROR:" command.

use crate::catalog::RecipeStore;
use crate::core::selector::{select_step, StepSelector};
use crate::core::template::{merge_child_vars, TemplateEngine};
use crate::core::types::{FlatCommand, Recipe, StepBody, VarMap};
use indexmap::IndexMap;

/// Variant tag carried by trace records.
pub const ERROR_VARIANT: &str = "error";

pub struct Flattener<'a> {
    store: &'a dyn RecipeStore,
    engine: &'a dyn TemplateEngine,
}

impl<'a> Flattener<'a> {
    pub fn new(store: &'a dyn RecipeStore, engine: &'a dyn TemplateEngine) -> Self {
        Self { store, engine }
    }

    /// Flatten a recipe into its concrete commands, in traversal order.
    pub fn flatten(&self, recipe: &Recipe, vars: &VarMap) -> Vec<FlatCommand> {
        let mut out = Vec::new();
        self.walk(recipe, vars, &[], &mut out);
        out
    }

    fn walk(&self, recipe: &Recipe, vars: &VarMap, ancestry: &[String], out: &mut Vec<FlatCommand>) {
        if ancestry.iter().any(|id| id == &recipe.id) {
            out.push(trace_record(
                &recipe.id,
                "(cycle)",
                format!("cycle detected: '{}' is already being expanded", recipe.id),
            ));
            return;
        }
        let mut path = ancestry.to_vec();
        path.push(recipe.id.clone());

        for (i, step) in recipe.steps.iter().enumerate() {
            let label = step.label(i + 1);

            match &step.body {
                StepBody::Render { variants } => {
                    for (variant, template) in variants {
                        let command = match self.engine.render(template, vars) {
                            Ok(rendered) => rendered,
                            Err(e) => format!("ERROR: {}", e),
                        };
                        out.push(FlatCommand {
                            origin_id: recipe.id.clone(),
                            step_label: label.clone(),
                            variant: variant.clone(),
                            command,
                        });
                    }
                }
                StepBody::Include {
                    recipe: target,
                    vars: overrides,
                    ..
                } => match self.load_child(target, overrides, vars) {
                    Ok((child, child_vars)) => self.walk(&child, &child_vars, &path, out),
                    Err(reason) => out.push(trace_record(
                        &recipe.id,
                        &label,
                        format!("failed to include {}: {}", target, reason),
                    )),
                },
                StepBody::IncludeStep {
                    recipe: target,
                    selector,
                    variant,
                    vars: overrides,
                    ..
                } => match self.selected_records(target, selector, variant.as_deref(), overrides, vars)
                {
                    Ok(records) => out.extend(records),
                    Err(reason) => out.push(trace_record(
                        &recipe.id,
                        &label,
                        format!("failed to include {}: {}", target, reason),
                    )),
                },
                StepBody::Invalid { reason } => {
                    out.push(trace_record(&recipe.id, &label, reason.clone()));
                }
            }
        }
    }

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

    /// Records for a single selected step of another recipe. Owned by the
    /// child: origin_id and step_label come from the child recipe.
    fn selected_records(
        &self,
        target: &str,
        selector: &StepSelector,
        variant_filter: Option<&str>,
        overrides: &IndexMap<String, String>,
        vars: &VarMap,
    ) -> Result<Vec<FlatCommand>, String> {
        let (child, child_vars) = self.load_child(target, overrides, vars)?;
        let (pos, step) = select_step(&child, selector).map_err(|e| e.to_string())?;
        let label = step.label(pos);

        let variants = match &step.body {
            StepBody::Render { variants } => variants,
            _ => {
                return Err(format!(
                    "step {} ('{}') is not a render step",
                    selector, label
                ))
            }
        };

        let mut records = Vec::new();
        for (variant, template) in variants {
            if let Some(wanted) = variant_filter {
                if variant != wanted {
                    continue;
                }
            }
            let command = match self.engine.render(template, &child_vars) {
                Ok(rendered) => rendered,
                Err(e) => format!("ERROR: {}", e),
            };
            records.push(FlatCommand {
                origin_id: child.id.clone(),
                step_label: label.clone(),
                variant: variant.clone(),
                command,
            });
        }

        if let Some(wanted) = variant_filter {
            if records.is_empty() {
                return Err(format!("no variant '{}' in step '{}'", wanted, label));
            }
        }
        Ok(records)
    }
}

fn trace_record(origin_id: &str, step_label: &str, message: String) -> FlatCommand {
    FlatCommand {
        origin_id: origin_id.to_string(),
        step_label: step_label.to_string(),
        variant: ERROR_VARIANT.to_string(),
        command: format!("ERROR: {}", message),
    }
}
