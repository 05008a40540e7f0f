//! Rewriting rules: compiled patterns with replacements and scopes, the
//! case-tracking expander, highlight rules and the ordered rule set.

pub mod capitalization;
pub mod errors;
pub mod highlight;
#[allow(clippy::module_inception)]
pub mod rule;
pub mod ruleset;
pub mod scope;
pub mod template;

pub use capitalization::{CaseTracked, PatternPiece, ReplacementPiece};
pub use errors::{PatternError, SubstitutionError};
pub use highlight::{Category, HighlightRule, HighlightStyle};
pub use rule::{ComputeFn, Replacement, Rule, RuleReport, SkippedEdit, Substitution};
pub use ruleset::{RuleSet, RuleSetBuilder};
pub use scope::{NodeClass, Scope, ScopeOptions, ScopePolicy};
pub use template::{CaseMode, GroupRef, Segment, Template};
