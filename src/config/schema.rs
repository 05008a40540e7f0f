use crate::rule::{Category, NodeClass, PatternError};
use crate::tex::{ArgSpec, EnvBody};
use serde::Deserialize;
use std::fmt;

/// A checklist as written in TOML, before compilation.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ChecklistConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub macros: Vec<MacroDefinition>,
    #[serde(default)]
    pub environments: Vec<EnvironmentDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub highlights: Vec<HighlightDefinition>,
}

impl ChecklistConfig {
    /// Structural checks. Pattern compilation happens later and reports
    /// through the same issue list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() && self.highlights.is_empty() {
            issues.push(ValidationIssue::EmptyChecklist);
        }

        if self.settings.extensions.is_empty() {
            issues.push(ValidationIssue::MissingField {
                entry: None,
                field: "settings.extensions",
            });
        }
        for name in [&self.settings.highlight.wrapper, &self.settings.highlight.note] {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
                issues.push(ValidationIssue::InvalidCombo {
                    entry: None,
                    message: format!("'{name}' is not a usable highlight macro name"),
                });
            }
        }

        for (idx, def) in self.macros.iter().enumerate() {
            let entry = format!("macros[{idx}]");
            if def.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    entry: Some(entry.clone()),
                    field: "name",
                });
            }
            if let Err(e) = def.args.parse::<ArgSpec>() {
                issues.push(ValidationIssue::InvalidCombo {
                    entry: Some(entry),
                    message: e.to_string(),
                });
            }
        }

        for (idx, def) in self.environments.iter().enumerate() {
            let entry = format!("environments[{idx}]");
            if def.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    entry: Some(entry.clone()),
                    field: "name",
                });
            }
            if let Err(e) = def.args.parse::<ArgSpec>() {
                issues.push(ValidationIssue::InvalidCombo {
                    entry: Some(entry),
                    message: e.to_string(),
                });
            }
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            let entry = rule.label(idx);
            if rule.pattern.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    entry: Some(entry.clone()),
                    field: "pattern",
                });
            }
            if let Some(marker) = &rule.case_marker {
                if marker.chars().count() != 1 {
                    issues.push(ValidationIssue::InvalidCombo {
                        entry: Some(entry.clone()),
                        message: format!("case_marker must be a single character, got '{marker}'"),
                    });
                }
            }
            check_scope(&entry, &rule.allowed, &rule.forbidden, &mut issues);
        }

        for (idx, highlight) in self.highlights.iter().enumerate() {
            let entry = highlight.label(idx);
            if highlight.pattern.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    entry: Some(entry.clone()),
                    field: "pattern",
                });
            }
            if let Err(source) = highlight.category.parse::<Category>() {
                issues.push(ValidationIssue::Pattern {
                    entry: entry.clone(),
                    source,
                });
            }
            check_scope(&entry, &highlight.allowed, &highlight.forbidden, &mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn check_scope(
    entry: &str,
    allowed: &[String],
    forbidden: &[String],
    issues: &mut Vec<ValidationIssue>,
) {
    if !allowed.is_empty() && !forbidden.is_empty() {
        issues.push(ValidationIssue::InvalidCombo {
            entry: Some(entry.to_string()),
            message: "'allowed' and 'forbidden' cannot both be set".to_string(),
        });
    }
    for class in allowed.iter().chain(forbidden) {
        if let Err(source) = class.parse::<NodeClass>() {
            issues.push(ValidationIssue::Pattern {
                entry: entry.to_string(),
                source,
            });
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// File extensions treated as documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub highlight: HighlightSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            highlight: HighlightSettings::default(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["tex".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct HighlightSettings {
    #[serde(default = "default_wrapper")]
    pub wrapper: String,
    #[serde(default = "default_note")]
    pub note: String,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            wrapper: default_wrapper(),
            note: default_note(),
        }
    }
}

fn default_wrapper() -> String {
    "colorbox".to_string()
}

fn default_note() -> String {
    "marginpar".to_string()
}

/// Argument shape of a document-specific macro, e.g. `args = "*[{"`.
#[derive(Debug, Deserialize, Clone)]
pub struct MacroDefinition {
    pub name: String,
    #[serde(default)]
    pub args: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnvironmentDefinition {
    pub name: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub body: BodyKind,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Text,
    Math,
    Verbatim,
}

impl From<BodyKind> for EnvBody {
    fn from(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Text => EnvBody::Text,
            BodyKind::Math => EnvBody::Math,
            BodyKind::Verbatim => EnvBody::Verbatim,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub pattern: String,
    #[serde(default)]
    pub replace: String,
    #[serde(default)]
    pub case_marker: Option<String>,
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub environments: Option<Vec<String>>,
}

impl RuleDefinition {
    pub fn label(&self, idx: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("rules[{idx}]"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HighlightDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub pattern: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub environments: Option<Vec<String>>,
}

fn default_category() -> String {
    "yellow".to_string()
}

impl HighlightDefinition {
    pub fn label(&self, idx: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("highlights[{idx}]"),
        }
    }
}

/// Every problem found in one checklist, structural and pattern issues
/// together, in checklist order.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Add issues from a later pass, skipping any whose rule, highlight or
    /// definition already has one.
    pub fn merge(&mut self, later: Vec<ValidationIssue>) {
        for issue in later {
            let reported = issue.entry().is_some()
                && self.issues.iter().any(|seen| seen.entry() == issue.entry());
            if !reported {
                self.issues.push(issue);
            }
        }
    }

    /// Distinct rules, highlights and definitions with at least one issue.
    pub fn entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = Vec::new();
        for entry in self.issues.iter().filter_map(ValidationIssue::entry) {
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        entries
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.issues.len();
        let entries = self.entries().len();
        write!(f, "{count} issue{}", if count == 1 { "" } else { "s" })?;
        if entries > 0 {
            write!(
                f,
                " in {entries} {}",
                if entries == 1 { "entry" } else { "entries" }
            )?;
        }
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyChecklist,
    MissingField {
        entry: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        entry: Option<String>,
        message: String,
    },
    Pattern {
        entry: String,
        source: PatternError,
    },
}

impl ValidationIssue {
    /// The checklist entry the issue belongs to, if any.
    pub fn entry(&self) -> Option<&str> {
        match self {
            ValidationIssue::EmptyChecklist => None,
            ValidationIssue::MissingField { entry, .. }
            | ValidationIssue::InvalidCombo { entry, .. } => entry.as_deref(),
            ValidationIssue::Pattern { entry, .. } => Some(entry),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyChecklist => {
                write!(f, "checklist contains no rules and no highlights")
            }
            ValidationIssue::MissingField { entry, field } => match entry {
                Some(entry) => write!(f, "'{entry}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { entry, message } => match entry {
                Some(entry) => write!(f, "'{entry}' has invalid configuration: {message}"),
                None => write!(f, "invalid checklist configuration: {message}"),
            },
            ValidationIssue::Pattern { entry, source } => write!(f, "'{entry}': {source}"),
        }
    }
}
