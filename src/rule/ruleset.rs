use crate::rule::capitalization::CaseTracked;
use crate::rule::errors::PatternError;
use crate::rule::highlight::{Category, HighlightRule, HighlightStyle};
use crate::rule::rule::{Rule, RuleReport};
use crate::rule::scope::ScopeOptions;
use crate::tex::{Document, LatexContext, ParseError};

/// The ordered base rules and highlight rules of one run.
///
/// Order is significant: every rule sees the output of the rules before it.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    highlights: Vec<HighlightRule>,
    style: HighlightStyle,
}

impl RuleSet {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn highlights(&self) -> &[HighlightRule] {
        &self.highlights
    }

    pub fn style(&self) -> &HighlightStyle {
        &self.style
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.highlights.is_empty()
    }

    /// Run the base rules over `source`, each on a fresh parse of the
    /// previous rule's output.
    pub fn apply_rules(
        &self,
        source: &str,
        context: &LatexContext,
    ) -> Result<(String, Vec<RuleReport>), ParseError> {
        apply_in_order(self.rules.iter(), source, context)
    }

    /// Run the highlight rules over `source` the same way.
    pub fn apply_highlights(
        &self,
        source: &str,
        context: &LatexContext,
    ) -> Result<(String, Vec<RuleReport>), ParseError> {
        apply_in_order(self.highlights.iter().map(HighlightRule::rule), source, context)
    }
}

fn apply_in_order<'r>(
    rules: impl Iterator<Item = &'r Rule>,
    source: &str,
    context: &LatexContext,
) -> Result<(String, Vec<RuleReport>), ParseError> {
    let mut current = source.to_string();
    let mut reports = Vec::new();
    for rule in rules {
        let mut doc = Document::parse(current, context)?;
        reports.push(rule.apply(&mut doc));
        current = doc.into_source();
    }
    Ok((current, reports))
}

/// Ordered, append-only registration of rules and highlights.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    set: RuleSet,
}

impl RuleSetBuilder {
    pub fn with_style(style: HighlightStyle) -> Result<Self, PatternError> {
        style.validate()?;
        Ok(Self {
            set: RuleSet {
                style,
                ..RuleSet::default()
            },
        })
    }

    /// Register a rule named after its pattern.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        replacement: &str,
        scope: ScopeOptions,
        case_marker: Option<char>,
    ) -> Result<&mut Self, PatternError> {
        self.add_named_rule(pattern, pattern, replacement, scope, case_marker)
    }

    /// Register a rule. With a case marker, the title-case and literal
    /// variants are both registered, title case first.
    pub fn add_named_rule(
        &mut self,
        name: &str,
        pattern: &str,
        replacement: &str,
        scope: ScopeOptions,
        case_marker: Option<char>,
    ) -> Result<&mut Self, PatternError> {
        let scope = scope.into_scope()?;
        match case_marker {
            Some(marker) => {
                let (title, literal) =
                    CaseTracked::parse(pattern, replacement, marker)?.expand(name, scope)?;
                self.set.rules.push(title);
                self.set.rules.push(literal);
            }
            None => {
                self.set
                    .rules
                    .push(Rule::from_template(name, pattern, replacement, scope)?);
            }
        }
        Ok(self)
    }

    /// Register an already compiled rule, such as one with a computed
    /// replacement.
    pub fn push_rule(&mut self, rule: Rule) -> &mut Self {
        self.set.rules.push(rule);
        self
    }

    pub fn add_highlight(
        &mut self,
        pattern: &str,
        category: Category,
        note: Option<&str>,
        scope: ScopeOptions,
    ) -> Result<&mut Self, PatternError> {
        let highlight = HighlightRule::new(
            pattern,
            category,
            note.map(str::to_string),
            &self.set.style,
            scope,
        )?;
        self.set.highlights.push(highlight);
        Ok(self)
    }

    pub fn build(self) -> RuleSet {
        self.set
    }
}
