use crate::config::compile::{compile, Checklist};
use crate::config::schema::{ChecklistConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Checklist used when none is given on the command line.
pub const DEFAULT_CHECKLIST: &str = include_str!("default_checklist.toml");

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }

    /// The validation issues, when that is what went wrong.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            ConfigError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot open checklist {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => {
                write!(f, "checklist {} is not valid TOML: {}", describe(path), source)
            }
            ConfigError::Validation { path, source } => {
                write!(f, "checklist {} rejected: {}", describe(path), source)
            }
        }
    }
}

fn describe(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "(inline)".to_string(),
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

/// Parse and validate without compiling patterns.
pub fn parse_from_str(input: &str) -> Result<ChecklistConfig, ConfigError> {
    let config: ChecklistConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

/// Parse, validate and compile. Structural and pattern issues are
/// reported together, at most the structural ones for any entry that has
/// both.
pub fn load_from_str(input: &str) -> Result<Checklist, ConfigError> {
    let config: ChecklistConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    let mut error = config
        .validate()
        .err()
        .unwrap_or(ValidationError { issues: Vec::new() });

    match compile(&config) {
        Ok(checklist) if error.issues.is_empty() => return Ok(checklist),
        Ok(_) => {}
        Err(compiled) => error.merge(compiled.issues),
    }
    Err(ConfigError::Validation {
        path: None,
        source: error,
    })
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Checklist, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loading checklist");
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

pub fn load_default() -> Result<Checklist, ConfigError> {
    load_from_str(DEFAULT_CHECKLIST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checklist_compiles() {
        let checklist = load_default().unwrap();
        assert!(!checklist.rules.rules().is_empty());
        assert!(!checklist.rules.highlights().is_empty());
    }

    #[test]
    fn path_is_attached_to_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[[rules]\npattern = 1").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn structural_and_pattern_issues_are_merged_per_entry() {
        let err = load_from_str(
            r#"
[[rules]]
name = "both"
pattern = "("
allowed = ["macro"]
forbidden = ["math"]

[[rules]]
name = "pattern only"
pattern = "("
"#,
        )
        .unwrap_err();
        let validation = err.validation().unwrap();
        assert_eq!(validation.entries(), ["both", "pattern only"]);
        assert_eq!(validation.issues.len(), 2, "{err}");

        let message = err.to_string();
        assert!(message.starts_with("checklist (inline) rejected: 2 issues in 2 entries"), "{message}");
        assert!(message.contains("\n  - 'pattern only': invalid pattern"), "{message}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
