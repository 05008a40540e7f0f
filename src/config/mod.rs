//! TOML checklists: what rules and highlights to run, and the extra macro
//! and environment shapes the parser needs for a given set of documents.

pub mod compile;
pub mod loader;
pub mod schema;

pub use compile::{compile, Checklist};
pub use loader::{
    load_default, load_from_path, load_from_str, parse_from_str, ConfigError, DEFAULT_CHECKLIST,
};
pub use schema::{
    BodyKind, ChecklistConfig, EnvironmentDefinition, HighlightDefinition, HighlightSettings,
    MacroDefinition, Metadata, RuleDefinition, Settings, ValidationError, ValidationIssue,
};
