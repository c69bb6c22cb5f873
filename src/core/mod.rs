//! Engine: types, parsing, selection, templating, expansion, flattening, search.

pub mod expander;
pub mod flattener;
pub mod parser;
pub mod search;
pub mod selector;
pub mod template;
pub mod types;
