use crate::config::schema::{ChecklistConfig, Metadata, ValidationError, ValidationIssue};
use crate::rule::{
    Category, HighlightStyle, NodeClass, PatternError, RuleSet, RuleSetBuilder, ScopeOptions,
};
use crate::tex::{ArgSpec, EnvSpec, LatexContext};

/// A compiled checklist: the rule set and the parser tables it runs with.
#[derive(Debug, Clone)]
pub struct Checklist {
    pub meta: Metadata,
    pub extensions: Vec<String>,
    pub rules: RuleSet,
    pub context: LatexContext,
}

impl Checklist {
    /// Whether a file extension (without the dot) selects a document.
    pub fn is_document_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

fn scope_options(
    allowed: &[String],
    forbidden: &[String],
    environments: &Option<Vec<String>>,
) -> Result<ScopeOptions, PatternError> {
    let parse = |classes: &[String]| {
        classes
            .iter()
            .map(|class| class.parse::<NodeClass>())
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(ScopeOptions {
        allowed: parse(allowed)?,
        forbidden: parse(forbidden)?,
        environments: environments.clone(),
    })
}

/// Compile every rule and highlight, collecting all failures instead of
/// stopping at the first one.
pub fn compile(config: &ChecklistConfig) -> Result<Checklist, ValidationError> {
    let mut issues = Vec::new();
    let mut context = LatexContext::default();

    for (idx, def) in config.macros.iter().enumerate() {
        let name = def.name.trim().trim_start_matches('\\');
        match def.args.parse::<ArgSpec>() {
            Ok(args) => {
                context.define_macro(name, args);
            }
            Err(e) => issues.push(ValidationIssue::InvalidCombo {
                entry: Some(format!("macros[{idx}]")),
                message: e.to_string(),
            }),
        }
    }
    for (idx, def) in config.environments.iter().enumerate() {
        match def.args.parse::<ArgSpec>() {
            Ok(args) => {
                context.define_environment(
                    def.name.trim(),
                    EnvSpec {
                        args,
                        body: def.body.into(),
                    },
                );
            }
            Err(e) => issues.push(ValidationIssue::InvalidCombo {
                entry: Some(format!("environments[{idx}]")),
                message: e.to_string(),
            }),
        }
    }

    let highlight = &config.settings.highlight;
    let style = match HighlightStyle::new(highlight.wrapper.clone(), highlight.note.clone()) {
        Ok(style) => style,
        Err(source) => {
            issues.push(ValidationIssue::Pattern {
                entry: "settings.highlight".to_string(),
                source,
            });
            HighlightStyle::default()
        }
    };
    style.register(&mut context);

    let mut builder = match RuleSetBuilder::with_style(style) {
        Ok(builder) => builder,
        Err(source) => {
            issues.push(ValidationIssue::Pattern {
                entry: "settings.highlight".to_string(),
                source,
            });
            RuleSetBuilder::default()
        }
    };

    for (idx, def) in config.rules.iter().enumerate() {
        let entry = def.label(idx);
        let result = scope_options(&def.allowed, &def.forbidden, &def.environments).and_then(
            |options| {
                let marker = def.case_marker.as_deref().and_then(|m| m.chars().next());
                builder
                    .add_named_rule(&entry, &def.pattern, &def.replace, options, marker)
                    .map(|_| ())
            },
        );
        if let Err(source) = result {
            issues.push(ValidationIssue::Pattern { entry, source });
        }
    }

    for (idx, def) in config.highlights.iter().enumerate() {
        let entry = def.label(idx);
        let result = def.category.parse::<Category>().and_then(|category| -> Result<(), PatternError> {
            let options = scope_options(&def.allowed, &def.forbidden, &def.environments)?;
            builder
                .add_highlight(&def.pattern, category, def.note.as_deref(), options)
                .map(|_| ())
        });
        if let Err(source) = result {
            issues.push(ValidationIssue::Pattern { entry, source });
        }
    }

    if !issues.is_empty() {
        return Err(ValidationError { issues });
    }

    let rules = builder.build();
    tracing::debug!(
        rules = rules.rules().len(),
        highlights = rules.highlights().len(),
        "compiled checklist"
    );
    Ok(Checklist {
        meta: config.meta.clone(),
        extensions: config.settings.extensions.clone(),
        rules,
        context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(input: &str) -> ChecklistConfig {
        toml_edit::de::from_str(input).unwrap()
    }

    #[test]
    fn compiles_rules_highlights_and_tables() {
        let checklist = compile(&config(
            r##"
[settings]
extensions = ["tex", ".ltx"]

[[macros]]
name = "\\keyword"
args = "{"

[[environments]]
name = "algorithmic"
args = "["
body = "verbatim"

[[rules]]
name = "follows"
pattern = '#it follows that[,]?[ ]+(.)'
replace = '#\1'
case_marker = "#"

[[highlights]]
pattern = 'very'
category = "red"
note = "Avoid"
"##,
        ))
        .unwrap();

        assert_eq!(checklist.rules.rules().len(), 2);
        assert_eq!(checklist.rules.highlights().len(), 1);
        assert_eq!(checklist.context.macro_args("keyword").unwrap().mandatory_count(), 1);
        assert!(checklist.context.environment("algorithmic").is_some());
        assert!(checklist.is_document_extension("ltx"));
        assert!(checklist.is_document_extension("TEX"));
        assert!(!checklist.is_document_extension("bib"));
    }

    #[test]
    fn reports_every_broken_pattern() {
        let err = compile(&config(
            r#"
[[rules]]
name = "unclosed"
pattern = "(a"

[[rules]]
name = "empty"
pattern = "a*"

[[highlights]]
name = "bad group"
pattern = "b"
note = "{"
"#,
        ))
        .unwrap_err();
        assert_eq!(err.issues.len(), 3, "{err}");
        assert!(err.to_string().contains("'unclosed'"));
    }
}
