//! Recipe storage: discovery and lookup of recipe YAML files.
//!
//! The engine only sees the [`RecipeStore`] trait. [`DirStore`] walks a
//! directory tree of YAML files; [`MemoryStore`] backs tests and embedders.

use crate::core::parser::parse_recipe_file;
use crate::core::types::{IndexEntry, Recipe};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Store lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No recipe has the requested id.
    NotFound(String),
    /// The catalog itself is unreadable.
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "recipe '{}' not found", id),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Recipe lookup and listing.
pub trait RecipeStore {
    /// Load a single recipe by id.
    fn load(&self, id: &str) -> Result<Recipe, StoreError>;

    /// List all available recipes with metadata, in catalog order.
    fn list(&self) -> Result<Vec<IndexEntry>, StoreError>;
}

/// Recipes stored as `*.yaml` / `*.yml` files under a root directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All recipe file paths under the root, sorted for a stable catalog order.
    pub fn recipe_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for pattern in ["**/*.yaml", "**/*.yml"] {
            let full = self.root.join(pattern);
            let matches = glob::glob(&full.to_string_lossy())
                .map_err(|e| StoreError::Other(format!("bad glob pattern: {}", e)))?;
            for entry in matches {
                let path = entry.map_err(|e| {
                    StoreError::Other(format!("cannot read {}: {}", self.root.display(), e))
                })?;
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// The id a recipe file is expected to declare: its path relative to the
    /// root, without extension. Used by `validate` to keep ids and storage
    /// locations in agreement.
    pub fn expected_id(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let stem = rel.with_extension("");
        let parts: Vec<String> = stem
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl RecipeStore for DirStore {
    fn load(&self, id: &str) -> Result<Recipe, StoreError> {
        for path in self.recipe_paths()? {
            // Unparseable files are a validate concern; keep scanning.
            if let Ok(recipe) = parse_recipe_file(&path) {
                if recipe.id == id {
                    return Ok(recipe);
                }
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<IndexEntry>, StoreError> {
        let mut index = Vec::new();
        for path in self.recipe_paths()? {
            if let Ok(recipe) = parse_recipe_file(&path) {
                index.push(IndexEntry {
                    id: recipe.id,
                    title: recipe.title,
                    tags: recipe.tags,
                });
            }
        }
        Ok(index)
    }
}

/// In-memory store, keyed by id in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    recipes: IndexMap<String, Recipe>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.id.clone(), recipe);
    }
}

impl RecipeStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Recipe, StoreError> {
        self.recipes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<IndexEntry>, StoreError> {
        Ok(self
            .recipes
            .values()
            .map(|r| IndexEntry {
                id: r.id.clone(),
                title: r.title.clone(),
                tags: r.tags.clone(),
            })
            .collect())
    }
}
