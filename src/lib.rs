//! ircues: incident-response command recipes at your fingertips.
//!
//! A catalog of composable checklists for DFIR tasks (Windows, Linux, cloud,
//! browser). Recipes render into concrete shell and query commands with
//! variable substitution, cross-recipe includes, and boolean catalog search.

pub mod catalog;
pub mod cli;
pub mod core;
