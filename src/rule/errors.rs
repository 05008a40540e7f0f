use crate::tex::SpanError;
use thiserror::Error;

/// A rule or highlight that cannot be compiled. Raised at configuration
/// time, before any document is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}': {message}")]
    Invalid { pattern: String, message: String },

    #[error("pattern '{pattern}' matches the empty string")]
    MatchesEmpty { pattern: String },

    #[error("replacement '{replacement}' refers to unknown group '{group}'")]
    UnknownGroup { replacement: String, group: String },

    #[error("malformed group reference in replacement '{replacement}' at byte {pos}")]
    BadGroupReference { replacement: String, pos: usize },

    #[error("bad escape '\\{escape}' in replacement '{replacement}' at byte {pos}")]
    BadEscape {
        replacement: String,
        escape: char,
        pos: usize,
    },

    #[error("octal escape in replacement '{replacement}' at byte {pos}; write \\g<0> for the whole match")]
    OctalEscape { replacement: String, pos: usize },

    #[error("unbalanced braces in {field} '{text}'")]
    UnbalancedBraces { field: &'static str, text: String },

    #[error("case marker '{marker}' at byte {pos} of '{source_text}' must precede a letter, a group reference or another '{marker}'")]
    InvalidCaseMarker {
        marker: char,
        source_text: String,
        pos: usize,
    },

    #[error("case marker '{marker}' cannot be a backslash, a letter, a digit or whitespace")]
    UnusableMarker { marker: char },

    #[error("case-tracked pattern '{pattern}' marks no letter with '{marker}'")]
    NothingTracked { pattern: String, marker: char },

    #[error("unknown highlight category '{category}'{}", suggestion_suffix(.suggestion))]
    UnknownCategory {
        category: String,
        suggestion: Option<String>,
    },

    #[error("'{name}' is not a valid macro name")]
    InvalidMacroName { name: String },

    #[error("unknown node class '{name}'{}", suggestion_suffix(.suggestion))]
    UnknownNodeClass {
        name: String,
        suggestion: Option<String>,
    },

    #[error("a scope is either a whitelist ('allowed') or a blacklist ('forbidden'), not both")]
    ConflictingScope,
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

/// A single leaf's replacement failed at apply time. The leaf is skipped
/// and left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("pattern engine failed: {message}")]
    Engine { message: String },

    #[error("replacement failed: {message}")]
    Computed { message: String },

    #[error(transparent)]
    Span(#[from] SpanError),
}
