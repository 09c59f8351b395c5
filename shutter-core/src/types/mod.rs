//! Core type definitions.

mod ids;

pub use ids::{ScopeId, StringId};
