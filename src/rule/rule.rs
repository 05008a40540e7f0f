use crate::rule::errors::{PatternError, SubstitutionError};
use crate::rule::scope::Scope;
use crate::rule::template::Template;
use crate::tex::{Document, LatexContext, Mutator, ParseError, PathCollector, SpanError, Walker};
use fancy_regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Replacement computed in code instead of from a template.
pub type ComputeFn = dyn Fn(&Captures<'_>) -> Result<String, SubstitutionError> + Send + Sync;

#[derive(Clone)]
pub enum Replacement {
    Template(Template),
    Computed(Arc<ComputeFn>),
}

impl Replacement {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>) -> Result<String, SubstitutionError> + Send + Sync + 'static,
    {
        Replacement::Computed(Arc::new(f))
    }

    fn render(&self, captures: &Captures<'_>, out: &mut String) -> Result<(), SubstitutionError> {
        match self {
            Replacement::Template(template) => {
                template.render(captures, out);
                Ok(())
            }
            Replacement::Computed(f) => {
                out.push_str(&f(captures)?);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Replacement::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl fmt::Display for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Template(template) => write!(f, "{template}"),
            Replacement::Computed(_) => f.write_str("<computed>"),
        }
    }
}

/// A compiled pattern, its replacement and where it may fire.
///
/// Rules are built once and never mutated. Applying a rule rewrites every
/// in-scope character run of a document, leaf by leaf, in document order.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    regex: Regex,
    replacement: Replacement,
    scope: Scope,
}

/// Outcome of a substitution over one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    pub matches: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedEdit {
    /// Child-index path of the leaf
    pub path: Vec<usize>,
    /// Byte offset of the leaf in the buffer it was read from
    pub offset: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: String,
    pub matches: usize,
    pub leaves_changed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEdit>,
}

impl RuleReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, PatternError> {
    let regex = Regex::new(pattern).map_err(|e| PatternError::Invalid {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    match regex.is_match("") {
        Ok(false) => Ok(regex),
        Ok(true) => Err(PatternError::MatchesEmpty {
            pattern: pattern.to_string(),
        }),
        Err(e) => Err(PatternError::Invalid {
            pattern: pattern.to_string(),
            message: e.to_string(),
        }),
    }
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: Replacement,
        scope: Scope,
    ) -> Result<Self, PatternError> {
        let regex = compile_pattern(pattern)?;
        if let Replacement::Template(template) = &replacement {
            template.validate(&regex)?;
            if !template.braces_balanced() {
                return Err(PatternError::UnbalancedBraces {
                    field: "replacement",
                    text: template.to_string(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            regex,
            replacement,
            scope,
        })
    }

    /// Rule with a template parsed from `replacement`.
    pub fn from_template(
        name: impl Into<String>,
        pattern: &str,
        replacement: &str,
        scope: Scope,
    ) -> Result<Self, PatternError> {
        let template = Template::parse(replacement)?;
        Self::new(name, pattern, Replacement::Template(template), scope)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn replacement(&self) -> &Replacement {
        &self.replacement
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Replace every non-overlapping match in `text`.
    ///
    /// `Ok(None)` when nothing matched. On error nothing is returned, so the
    /// caller never sees a partially substituted string.
    pub fn substitute(&self, text: &str) -> Result<Option<Substitution>, SubstitutionError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut matches = 0;

        for captures in self.regex.captures_iter(text) {
            let captures = captures.map_err(|e| SubstitutionError::Engine {
                message: e.to_string(),
            })?;
            let Some(whole) = captures.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            self.replacement.render(&captures, &mut out)?;
            last = whole.end();
            matches += 1;
        }

        if matches == 0 {
            return Ok(None);
        }
        out.push_str(&text[last..]);
        Ok(Some(Substitution { text: out, matches }))
    }

    /// Apply the rule to every in-scope leaf of `doc`.
    ///
    /// Eligible leaves are collected first, then rewritten in document
    /// order. The tree shape never changes during an application, so the
    /// collected paths stay valid while spans shift underneath them.
    pub fn apply(&self, doc: &mut Document) -> RuleReport {
        let mut report = RuleReport {
            rule: self.name.clone(),
            ..RuleReport::default()
        };

        let mut collector = PathCollector::default();
        Walker::default().walk(doc.nodes(), &self.scope, &mut collector);

        for path in collector.paths {
            let Some(leaf) = doc.node(&path) else {
                let error = SpanError::NoSuchNode { path: path.clone() };
                self.skip(&mut report, path, 0, &error.into());
                continue;
            };
            let offset = leaf.pos;
            let text = doc.text(leaf);

            let substitution = match self.substitute(text) {
                Ok(Some(substitution)) => substitution,
                Ok(None) => continue,
                Err(error) => {
                    self.skip(&mut report, path, offset, &error);
                    continue;
                }
            };
            report.matches += substitution.matches;
            if substitution.text == text {
                continue;
            }

            match doc.apply_text_change(&path, &substitution.text) {
                Ok(delta) => {
                    tracing::trace!(rule = %self.name, ?path, delta, "rewrote leaf");
                    report.leaves_changed += 1;
                    debug_assert!(doc.check_spans().is_ok(), "{:?}", doc.check_spans());
                }
                Err(error) => self.skip(&mut report, path, offset, &error.into()),
            }
        }

        if report.leaves_changed > 0 {
            tracing::debug!(
                rule = %self.name,
                matches = report.matches,
                leaves = report.leaves_changed,
                "rule applied"
            );
        }
        report
    }

    /// Parse `source` fresh, apply the rule, and reserialize.
    pub fn apply_to_source(
        &self,
        source: &str,
        context: &LatexContext,
    ) -> Result<(String, RuleReport), ParseError> {
        let mut doc = Document::parse(source, context)?;
        let report = self.apply(&mut doc);
        Ok((doc.into_source(), report))
    }

    fn skip(&self, report: &mut RuleReport, path: Vec<usize>, offset: usize, error: &SubstitutionError) {
        tracing::warn!(rule = %self.name, ?path, offset, %error, "skipped leaf");
        report.skipped.push(SkippedEdit {
            path,
            offset,
            reason: error.to_string(),
        });
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: /{}/ -> '{}'", self.name, self.regex.as_str(), self.replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::scope::{NodeClass, ScopeOptions};
    use crate::tex::NodeKind;

    fn rule(pattern: &str, replacement: &str) -> Rule {
        Rule::from_template("test", pattern, replacement, Scope::default()).unwrap()
    }

    fn apply(rule: &Rule, source: &str) -> (String, RuleReport) {
        rule.apply_to_source(source, &LatexContext::default()).unwrap()
    }

    #[test]
    fn substitutes_all_matches_in_a_leaf() {
        let sub = rule("in order to", "to")
            .substitute("in order to x, in order to y")
            .unwrap()
            .unwrap();
        assert_eq!(sub.text, "to x, to y");
        assert_eq!(sub.matches, 2);
    }

    #[test]
    fn no_match_is_none() {
        assert!(rule("zzz", "y").substitute("abc").unwrap().is_none());
    }

    #[test]
    fn identity_when_nothing_matches() {
        let source = "\\section{Intro}\nNothing to see % here\n$x$\n";
        let (out, report) = apply(&rule("utilize", "use"), source);
        assert_eq!(out, source);
        assert_eq!(report.matches, 0);
        assert_eq!(report.leaves_changed, 0);
    }

    #[test]
    fn edits_several_leaves_and_keeps_structure() {
        let source = "We utilize {tools that utilize} more.\n\\textbf{utilize}";
        let (out, report) = apply(&rule("utilize", "use"), source);
        assert_eq!(out, "We use {tools that use} more.\n\\textbf{utilize}");
        assert_eq!(report.leaves_changed, 2);
    }

    #[test]
    fn comments_and_math_are_never_leaves_of_the_default_walk() {
        let source = "x % x\n$x$ \\begin{equation}x\\end{equation}";
        let (out, _) = apply(&rule("x", "y"), source);
        assert_eq!(out, "y % x\n$x$ \\begin{equation}x\\end{equation}");
    }

    #[test]
    fn blacklist_rule_reaches_macro_arguments() {
        let r = Rule::from_template(
            "bl",
            "old",
            "new",
            ScopeOptions::default()
                .forbid(NodeClass::Macro("DIFdel".into()))
                .into_scope()
                .unwrap(),
        )
        .unwrap();
        let (out, _) = apply(&r, r"\emph{old} \DIFdel{old}");
        assert_eq!(out, r"\emph{new} \DIFdel{old}");
    }

    #[test]
    fn whitelist_never_touches_disallowed_ancestors() {
        let r = Rule::from_template(
            "wl",
            "a",
            "b",
            Scope::whitelist(vec![
                NodeClass::Kind(NodeKind::Chars),
                NodeClass::Kind(NodeKind::Group),
            ]),
        )
        .unwrap();
        let (out, _) = apply(&r, r"a {a} \begin{center}a\end{center}");
        assert_eq!(out, r"b {b} \begin{center}a\end{center}");
    }

    #[test]
    fn rejects_empty_matching_patterns() {
        assert!(matches!(
            Rule::from_template("e", "x*", "y", Scope::default()),
            Err(PatternError::MatchesEmpty { .. })
        ));
    }

    #[test]
    fn rejects_invalid_patterns_and_templates() {
        assert!(matches!(
            Rule::from_template("e", "(unclosed", "y", Scope::default()),
            Err(PatternError::Invalid { .. })
        ));
        assert!(matches!(
            Rule::from_template("e", "(a)", r"\3", Scope::default()),
            Err(PatternError::UnknownGroup { .. })
        ));
        assert!(matches!(
            Rule::from_template("e", "a", r"\\textbf{", Scope::default()),
            Err(PatternError::UnbalancedBraces { .. })
        ));
    }

    #[test]
    fn failing_replacement_leaves_the_leaf_untouched() {
        let r = Rule::new(
            "picky",
            r"\w+",
            Replacement::computed(|caps| {
                let word = caps.get(0).map_or("", |m| m.as_str());
                if word == "bad" {
                    Err(SubstitutionError::Computed {
                        message: "refusing".into(),
                    })
                } else {
                    Ok(word.to_uppercase())
                }
            }),
            Scope::default(),
        )
        .unwrap();
        let (out, report) = apply(&r, "good {bad word} fine");
        assert_eq!(out, "GOOD {bad word} FINE");
        assert_eq!(report.leaves_changed, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, vec![1, 0]);
        assert!(report.skipped[0].reason.contains("refusing"));
    }

    #[test]
    fn later_leaves_see_shifted_spans() {
        let (out, _) = apply(&rule("a", "aaa"), "a {a} a");
        assert_eq!(out, "aaa {aaa} aaa");
        let (out, _) = apply(&rule("bbb", ""), "bbb {bbb} bbb!");
        assert_eq!(out, " {} !");
    }
}
