//! CLI subcommands: list, search, show, run, dry-run, validate.
//!
//! Thin adapters over the engine. Catalog location defaults to `recipes/`
//! in the working directory.

use crate::catalog::{DirStore, RecipeStore};
use crate::core::flattener::Flattener;
use crate::core::parser::{parse_recipe_file, validate_recipe};
use crate::core::template::{TemplateEngine, VarSubst};
use crate::core::types::{mock_vars, FlatCommand, OutputFormat, StepBody, VarMap};
use crate::core::{expander::Expander, search};
use clap::Subcommand;
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all recipes in the catalog
    List {
        /// Catalog directory
        #[arg(short, long, default_value = "recipes")]
        dir: PathBuf,
    },

    /// Search the catalog (+term required, -term excluded, plain optional; quotes form phrases)
    Search {
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,

        /// Catalog directory
        #[arg(short, long, default_value = "recipes")]
        dir: PathBuf,
    },

    /// Show a recipe's id, title, and declared variables as JSON
    Show {
        /// Recipe id
        recipe_id: String,

        /// Catalog directory
        #[arg(short, long, default_value = "recipes")]
        dir: PathBuf,
    },

    /// Render a recipe with variable substitution
    Run {
        /// Recipe id
        recipe_id: String,

        /// JSON dict of variables
        #[arg(long, default_value = "")]
        vars: String,

        /// Output format: text|md
        #[arg(long, default_value = "text")]
        format: String,

        /// Copy rendered output to the clipboard
        #[arg(long)]
        copy: bool,

        /// Catalog directory
        #[arg(short, long, default_value = "recipes")]
        dir: PathBuf,
    },

    /// Show the flat command plan without running anything
    DryRun {
        /// Recipe id
        recipe_id: String,

        /// JSON dict of variables
        #[arg(long, default_value = "")]
        vars: String,

        /// Only show commands of this variant (pwsh, cmd, bash, kql, ...)
        #[arg(long)]
        variant: Option<String>,

        /// Output format: text|md
        #[arg(long, default_value = "text")]
        format: String,

        /// Catalog directory
        #[arg(short, long, default_value = "recipes")]
        dir: PathBuf,
    },

    /// Validate every recipe in the catalog
    Validate {
        /// Catalog directory
        #[arg(short, long, default_value = "recipes")]
        dir: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::List { dir } => cmd_list(&DirStore::new(dir)),
        Commands::Search { terms, dir } => cmd_search(&DirStore::new(dir), &terms),
        Commands::Show { recipe_id, dir } => cmd_show(&DirStore::new(dir), &recipe_id),
        Commands::Run {
            recipe_id,
            vars,
            format,
            copy,
            dir,
        } => cmd_run(&DirStore::new(dir), &recipe_id, &vars, &format, copy),
        Commands::DryRun {
            recipe_id,
            vars,
            variant,
            format,
            dir,
        } => cmd_dry_run(
            &DirStore::new(dir),
            &recipe_id,
            &vars,
            variant.as_deref(),
            &format,
        ),
        Commands::Validate { dir } => cmd_validate(&DirStore::new(dir)),
    }
}

/// Parse the --vars JSON dict into a variable map.
fn parse_vars(json: &str) -> Result<VarMap, String> {
    if json.trim().is_empty() {
        return Ok(VarMap::new());
    }
    let parsed: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| format!("invalid --vars JSON: {}", e))?;

    let mut vars = VarMap::new();
    for (name, value) in parsed {
        let yaml = serde_yaml_ng::to_value(&value)
            .map_err(|e| format!("invalid --vars value for '{}': {}", name, e))?;
        vars.insert(name, yaml);
    }
    Ok(vars)
}

fn cmd_list(store: &DirStore) -> Result<(), String> {
    let index = store.list().map_err(|e| e.to_string())?;
    for entry in index {
        let tags = entry.tags.join(", ");
        println!(
            "{} - {} {}",
            entry.id.bold(),
            entry.title,
            format!("({})", tags).dimmed()
        );
    }
    Ok(())
}

fn cmd_search(store: &DirStore, terms: &[String]) -> Result<(), String> {
    let index = store.list().map_err(|e| e.to_string())?;
    let hits = search::evaluate(&index, terms);

    if hits.is_empty() {
        println!("{}", "No matches.".dimmed());
        return Ok(());
    }
    for entry in hits {
        let tags = entry.tags.join(", ");
        println!(
            "{} - {} {}",
            entry.id.bold(),
            entry.title,
            format!("({})", tags).dimmed()
        );
    }
    Ok(())
}

fn cmd_show(store: &DirStore, recipe_id: &str) -> Result<(), String> {
    let recipe = store.load(recipe_id).map_err(|e| e.to_string())?;
    let doc = serde_json::json!({
        "id": recipe.id,
        "title": recipe.title,
        "tags": recipe.tags,
        "vars": recipe.vars,
    });
    let pretty =
        serde_json::to_string_pretty(&doc).map_err(|e| format!("serialize error: {}", e))?;
    println!("{}", pretty);
    Ok(())
}

fn cmd_run(
    store: &DirStore,
    recipe_id: &str,
    vars_json: &str,
    format: &str,
    copy: bool,
) -> Result<(), String> {
    let recipe = store.load(recipe_id).map_err(|e| e.to_string())?;
    let vars = parse_vars(vars_json)?;

    let out = Expander::new(store, &VarSubst).expand(&recipe, &vars, OutputFormat::parse(format));

    if copy {
        // Best effort only; an operator without a clipboard still gets output.
        if let Err(e) = copy_to_clipboard(&out) {
            eprintln!("note: clipboard copy failed: {}", e);
        }
    }
    println!("{}", out);
    Ok(())
}

/// Pipe text into the first available platform clipboard command.
fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let candidates: [(&str, &[&str]); 3] = [
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
    ];

    for (program, args) in candidates {
        let spawned = std::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(_) => continue,
        };
        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| format!("{}: {}", program, e))?;
        }
        let status = child.wait().map_err(|e| format!("{}: {}", program, e))?;
        if status.success() {
            return Ok(());
        }
    }
    Err("no clipboard command available (tried pbcopy, wl-copy, xclip)".to_string())
}

fn cmd_dry_run(
    store: &DirStore,
    recipe_id: &str,
    vars_json: &str,
    variant_filter: Option<&str>,
    format: &str,
) -> Result<(), String> {
    let recipe = store.load(recipe_id).map_err(|e| e.to_string())?;
    let vars = parse_vars(vars_json)?;

    let mut seq = Flattener::new(store, &VarSubst).flatten(&recipe, &vars);
    if let Some(wanted) = variant_filter {
        seq.retain(|s| s.variant == wanted);
    }

    if seq.is_empty() {
        println!("{}", "No commands produced.".dimmed());
        return Ok(());
    }

    match OutputFormat::parse(format) {
        OutputFormat::Md => print_plan_md(recipe_id, &seq),
        OutputFormat::Text => print_plan_text(&seq),
    }
    Ok(())
}

/// Markdown checklist, one fenced block per command.
fn print_plan_md(recipe_id: &str, seq: &[FlatCommand]) {
    println!("# Plan for `{}`\n", recipe_id);
    for (i, s) in seq.iter().enumerate() {
        println!("**{}. {} - {}**  ", i + 1, s.origin_id, s.step_label);
        println!("*{}*\n", s.variant);
        println!("```\n{}\n```\n", s.command);
    }
    println!("Total: {} commands.", seq.len());
}

/// Numbered plain listing, commands indented under their header line.
fn print_plan_text(seq: &[FlatCommand]) {
    for (i, s) in seq.iter().enumerate() {
        println!(
            "{:>3}. {} - {} {}",
            i + 1,
            s.origin_id.bold(),
            s.step_label,
            format!("[{}]", s.variant).dimmed()
        );
        for line in s.command.lines() {
            println!("     {}", line);
        }
    }
    println!("{}", format!("Total: {} commands.", seq.len()).dimmed());
}

fn cmd_validate(store: &DirStore) -> Result<(), String> {
    let paths = store.recipe_paths().map_err(|e| e.to_string())?;
    let mut errors: Vec<String> = Vec::new();
    let mut seen: HashMap<(String, String), (String, usize)> = HashMap::new();
    let mut count = 0usize;

    for path in &paths {
        let recipe = match parse_recipe_file(path) {
            Ok(recipe) => recipe,
            Err(e) => {
                errors.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };
        count += 1;

        for e in validate_recipe(&recipe) {
            errors.push(format!("{}: {}", path.display(), e));
        }

        // Ids must agree with storage location
        if let Some(expected) = store.expected_id(path) {
            if recipe.id != expected {
                errors.push(format!(
                    "{}: id '{}' does not match path (expected '{}')",
                    path.display(),
                    recipe.id,
                    expected
                ));
            }
        }

        // Every template must render with declared defaults / mock values
        let vars = mock_vars(&recipe);
        for (i, step) in recipe.steps.iter().enumerate() {
            if let StepBody::Render { variants } = &step.body {
                for (variant, template) in variants {
                    if let Err(e) = VarSubst.render(template, &vars) {
                        errors.push(format!(
                            "{}: step {} variant '{}' failed to render with mock vars: {}",
                            path.display(),
                            i + 1,
                            variant,
                            e
                        ));
                    }

                    // Duplicate commands usually mean a copy-paste that
                    // should have been an include
                    let key = (variant.clone(), normalize_command(template));
                    match seen.get(&key) {
                        Some((prev_id, prev_step)) => errors.push(format!(
                            "duplicate {} command: {} step {} repeats {} step {}",
                            variant,
                            recipe.id,
                            i + 1,
                            prev_id,
                            prev_step
                        )),
                        None => {
                            seen.insert(key, (recipe.id.clone(), i + 1));
                        }
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        println!("OK: {} recipes", count);
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Whitespace-normalized command text for duplicate detection.
fn normalize_command(template: &str) -> String {
    template
        .trim()
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars_empty() {
        assert!(parse_vars("").unwrap().is_empty());
        assert!(parse_vars("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_vars_scalars() {
        let vars = parse_vars(r#"{"pid": 4321, "host": "dc-1", "deep": true}"#).unwrap();
        assert_eq!(vars["pid"], serde_yaml_ng::Value::Number(4321.into()));
        assert_eq!(
            vars["host"],
            serde_yaml_ng::Value::String("dc-1".to_string())
        );
        assert_eq!(vars["deep"], serde_yaml_ng::Value::Bool(true));
    }

    #[test]
    fn test_parse_vars_rejects_bad_json() {
        assert!(parse_vars("{not json").is_err());
        assert!(parse_vars("[1, 2]").is_err());
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(
            normalize_command("  netstat -ano   \n  sort  \n"),
            "netstat -ano\n  sort"
        );
    }

    fn catalog_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_validate_clean_catalog() {
        let dir = catalog_with(&[(
            "linux/users.yaml",
            "id: linux/users\nsteps:\n  - render:\n      bash: \"last -20\"\n",
        )]);
        assert!(cmd_validate(&DirStore::new(dir.path())).is_ok());
    }

    #[test]
    fn test_validate_catches_id_path_mismatch() {
        let dir = catalog_with(&[(
            "linux/users.yaml",
            "id: wrong/id\nsteps:\n  - render:\n      bash: \"last\"\n",
        )]);
        let err = cmd_validate(&DirStore::new(dir.path())).unwrap_err();
        assert!(err.contains("validation error"));
    }

    #[test]
    fn test_validate_catches_duplicates_and_unrenderable() {
        let dir = catalog_with(&[
            (
                "a.yaml",
                "id: a\nsteps:\n  - render:\n      bash: \"netstat -ano\"\n",
            ),
            (
                "b.yaml",
                "id: b\nsteps:\n  - render:\n      bash: \"netstat -ano\"\n      pwsh: \"kill {{undeclared}}\"\n",
            ),
        ]);
        let err = cmd_validate(&DirStore::new(dir.path())).unwrap_err();
        assert_eq!(err, "2 validation error(s)");
    }

    #[test]
    fn test_run_and_dry_run_dispatch() {
        let dir = catalog_with(&[(
            "linux/users.yaml",
            "id: linux/users\nsteps:\n  - render:\n      bash: \"who -a\"\n",
        )]);
        let store = DirStore::new(dir.path());
        assert!(cmd_run(&store, "linux/users", "", "text", false).is_ok());
        assert!(cmd_dry_run(&store, "linux/users", "", None, "md").is_ok());
        assert!(cmd_run(&store, "no/such", "", "text", false).is_err());
    }
}
