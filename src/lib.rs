//! Oxpecker: checklist-driven rewriting of LaTeX prose
//!
//! Documents are parsed into a tree whose leaves are runs of plain text.
//! Rules rewrite only those leaves, so macros, math and verbatim content
//! are never touched, and every edit keeps the tree's byte spans in sync
//! with the edited buffer.
//!
//! # Architecture
//!
//! - [`tex`]: parser, node tree, walker and span synchronizer
//! - [`rule`]: scoped regex rules, highlight rules and case-tracked rule
//!   expansion
//! - [`config`]: TOML checklists compiled into a [`RuleSet`]
//! - [`pipeline`]: original → edited → diff → highlighted diff, per
//!   document, on a pool of worker threads
//!
//! # Example
//!
//! ```
//! use oxpecker::{LatexContext, RuleSet, ScopeOptions};
//!
//! let mut builder = RuleSet::builder();
//! builder
//!     .add_rule(r"#it follows that[,]?[ ]+(.)", r"#\1", ScopeOptions::default(), Some('#'))
//!     .unwrap();
//! let rules = builder.build();
//!
//! let (edited, _) = rules
//!     .apply_rules("It follows that the result holds.", &LatexContext::default())
//!     .unwrap();
//! assert_eq!(edited, "The result holds.");
//! ```

pub mod config;
pub mod pipeline;
pub mod rule;
pub mod tex;

// Re-exports
pub use config::{load_default, load_from_path, load_from_str, Checklist, ConfigError};
pub use pipeline::{
    BuiltinDiff, DiffTool, DocumentOutcome, DocumentReport, ExternalDiff, OutputLayout, Pipeline,
    Summary,
};
pub use rule::{
    Category, HighlightRule, HighlightStyle, PatternError, Rule, RuleReport, RuleSet,
    RuleSetBuilder, ScopeOptions, SubstitutionError,
};
pub use tex::{Document, LatexContext, Node, NodeKind, ParseError};
