use crate::rule::errors::PatternError;
use crate::rule::rule::{Replacement, Rule, RuleReport};
use crate::rule::scope::{NodeClass, ScopeOptions};
use crate::rule::template::{braces_balanced, CaseMode, GroupRef, Segment, Template};
use crate::tex::{ArgKind, ArgSpec, Document, LatexContext, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highlight colors, named as `xcolor` knows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Yellow,
    Orange,
    Red,
    Magenta,
    Cyan,
    Green,
    Lime,
    Gray,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Yellow,
        Category::Orange,
        Category::Red,
        Category::Magenta,
        Category::Cyan,
        Category::Green,
        Category::Lime,
        Category::Gray,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Yellow => "yellow",
            Category::Orange => "orange",
            Category::Red => "red",
            Category::Magenta => "magenta",
            Category::Cyan => "cyan",
            Category::Green => "green",
            Category::Lime => "lime",
            Category::Gray => "gray",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some(category) = Category::ALL.into_iter().find(|c| c.as_str() == wanted) {
            return Ok(category);
        }
        let suggestion = Category::ALL
            .into_iter()
            .map(|c| (c, strsim::levenshtein(&wanted, c.as_str())))
            .filter(|(_, distance)| *distance <= 2)
            .min_by_key(|(_, distance)| *distance)
            .map(|(c, _)| c.as_str().to_string());
        Err(PatternError::UnknownCategory {
            category: s.to_string(),
            suggestion,
        })
    }
}

/// The macros a highlight is written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// Called as `\wrapper{category}{match}`
    pub wrapper: String,
    /// Called as `\note{text}`
    pub note: String,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            wrapper: "colorbox".to_string(),
            note: "marginpar".to_string(),
        }
    }
}

/// Macros whose arguments must not receive highlight markup: labels,
/// citation keys, URLs and file names, and arguments where `\marginpar`
/// is not allowed.
const PROTECTED_MACROS: &[&str] = &[
    "label",
    "ref",
    "eqref",
    "pageref",
    "autoref",
    "cref",
    "Cref",
    "cite",
    "citep",
    "citet",
    "nocite",
    "url",
    "href",
    "includegraphics",
    "input",
    "include",
    "usepackage",
    "RequirePackage",
    "documentclass",
    "bibliography",
    "bibliographystyle",
    "newcommand",
    "renewcommand",
    "providecommand",
    "footnote",
    "caption",
];

fn valid_macro_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic())
}

impl HighlightStyle {
    pub fn new(wrapper: impl Into<String>, note: impl Into<String>) -> Result<Self, PatternError> {
        let style = Self {
            wrapper: wrapper.into(),
            note: note.into(),
        };
        style.validate()?;
        Ok(style)
    }

    pub fn validate(&self) -> Result<(), PatternError> {
        for name in [&self.wrapper, &self.note] {
            if !valid_macro_name(name) {
                return Err(PatternError::InvalidMacroName { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Teach the parser the argument shapes of the highlight macros, so
    /// that injected markup parses back as macro arguments. The wrapper
    /// always takes two arguments, whatever the document used it for.
    pub fn register(&self, context: &mut LatexContext) {
        context.define_macro(
            self.wrapper.clone(),
            ArgSpec::from_kinds([ArgKind::Optional, ArgKind::Mandatory, ArgKind::Mandatory]),
        );
        context.ensure_macro(
            &self.note,
            ArgSpec::from_kinds([ArgKind::Optional, ArgKind::Mandatory]),
        );
    }

    /// Deletions, previously injected markup, math, and the arguments of
    /// protected macros.
    pub fn default_forbidden(&self) -> Vec<NodeClass> {
        let mut forbidden: Vec<NodeClass> = ["DIFdel", "DIFdelFL"]
            .into_iter()
            .chain(PROTECTED_MACROS.iter().copied())
            .map(|name| NodeClass::Macro(name.to_string()))
            .collect();
        forbidden.push(NodeClass::Kind(NodeKind::Math));
        forbidden.push(NodeClass::Macro(self.wrapper.clone()));
        let note = NodeClass::Macro(self.note.clone());
        if !forbidden.contains(&note) {
            forbidden.push(note);
        }
        forbidden
    }
}

/// A rule wrapping each match as `\wrapper{category}{match}`, followed by
/// `\note{text}` when a note is given.
#[derive(Debug, Clone)]
pub struct HighlightRule {
    category: Category,
    note: Option<String>,
    rule: Rule,
}

impl HighlightRule {
    pub fn new(
        pattern: &str,
        category: Category,
        note: Option<String>,
        style: &HighlightStyle,
        options: ScopeOptions,
    ) -> Result<Self, PatternError> {
        style.validate()?;
        if let Some(text) = &note {
            if !braces_balanced(text) {
                return Err(PatternError::UnbalancedBraces {
                    field: "note",
                    text: text.clone(),
                });
            }
        }

        let mut segments = vec![
            Segment::Literal(format!("\\{}{{{}}}{{", style.wrapper, category)),
            Segment::Group {
                group: GroupRef::Index(0),
                case: CaseMode::Verbatim,
            },
            Segment::Literal("}".to_string()),
        ];
        if let Some(text) = &note {
            segments.push(Segment::Literal(format!("\\{}{{{}}}", style.note, text)));
        }

        let scope = options.into_scope_with(Some(style.default_forbidden()))?;
        let rule = Rule::new(
            format!("highlight {category} /{pattern}/"),
            pattern,
            Replacement::Template(Template::from_segments(segments)),
            scope,
        )?;
        Ok(Self {
            category,
            note,
            rule,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn apply(&self, doc: &mut Document) -> RuleReport {
        self.rule.apply(doc)
    }
}

impl fmt::Display for HighlightRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}/", self.category, self.rule.pattern())?;
        if let Some(note) = &self.note {
            write!(f, " ({note})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::scope::ScopePolicy;

    fn highlight(pattern: &str, note: Option<&str>) -> HighlightRule {
        HighlightRule::new(
            pattern,
            Category::Yellow,
            note.map(str::to_string),
            &HighlightStyle::default(),
            ScopeOptions::default(),
        )
        .unwrap()
    }

    fn run(rule: &HighlightRule, source: &str) -> (String, RuleReport) {
        rule.rule()
            .apply_to_source(source, &LatexContext::default())
            .unwrap()
    }

    #[test]
    fn wraps_match_and_appends_note() {
        let (out, report) = run(&highlight(r"\bvery\b", Some("Avoid intensifiers")), "It is very good.");
        assert_eq!(
            out,
            r"It is \colorbox{yellow}{very}\marginpar{Avoid intensifiers} good."
        );
        assert_eq!(report.matches, 1);
    }

    #[test]
    fn second_run_adds_nothing() {
        let rule = highlight(r"very|yellow|Avoid", Some("Avoid"));
        let (once, _) = run(&rule, "very yellow text");
        let (twice, report) = run(&rule, &once);
        assert_eq!(once, twice);
        assert_eq!(report.leaves_changed, 0);
    }

    #[test]
    fn deleted_text_is_not_highlighted() {
        let (out, _) = run(&highlight("very", None), r"\DIFdel{very}\DIFadd{very}");
        assert_eq!(out, r"\DIFdel{very}\DIFadd{\colorbox{yellow}{very}}");
    }

    #[test]
    fn keys_and_file_names_are_not_highlighted() {
        let rule = highlight("some|very|plot", None);
        let source = r"$very$ \label{fig:some-plot} \cite[p.~2]{very} \url{very.org} \includegraphics[width=2in]{plot}";
        let (out, report) = run(&rule, source);
        assert_eq!(out, source);
        assert_eq!(report.matches, 0);

        let (out, _) = run(&rule, r"\ref{plot} very");
        assert_eq!(out, r"\ref{plot} \colorbox{yellow}{very}");
    }

    #[test]
    fn custom_style_is_registered_and_excluded() {
        let style = HighlightStyle::new("hlc", "note").unwrap();
        let mut context = LatexContext::default();
        style.register(&mut context);
        let rule = HighlightRule::new("x", Category::Cyan, None, &style, ScopeOptions::default()).unwrap();

        let (once, _) = rule.rule().apply_to_source("x", &context).unwrap();
        assert_eq!(once, r"\hlc{cyan}{x}");
        let (twice, _) = rule.rule().apply_to_source(&once, &context).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn forbidden_classes_extend_the_defaults() {
        let rule = HighlightRule::new(
            "x",
            Category::Red,
            None,
            &HighlightStyle::default(),
            ScopeOptions::default().forbid(NodeClass::Environment("figure".into())),
        )
        .unwrap();
        match &rule.rule().scope().policy {
            ScopePolicy::Blacklist(classes) => {
                assert_eq!(classes.len(), HighlightStyle::default().default_forbidden().len() + 1);
                assert!(classes.contains(&NodeClass::Environment("figure".into())));
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn category_names() {
        assert_eq!("Magenta".parse::<Category>().unwrap(), Category::Magenta);
        match "yelow".parse::<Category>() {
            Err(PatternError::UnknownCategory { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("yellow"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_notes_and_styles() {
        assert!(matches!(
            HighlightRule::new(
                "x",
                Category::Red,
                Some("unbalanced {".into()),
                &HighlightStyle::default(),
                ScopeOptions::default()
            ),
            Err(PatternError::UnbalancedBraces { field: "note", .. })
        ));
        assert!(HighlightStyle::new("two words", "marginpar").is_err());
    }
}
