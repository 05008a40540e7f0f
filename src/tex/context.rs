//! Argument shapes of known macros and environments.
//!
//! The parser cannot infer how many arguments a macro takes, so it looks the
//! macro up here. Unknown macros take no arguments; any braces that follow
//! them are parsed as ordinary groups.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One argument slot of a macro or environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// `*` directly after the name
    Star,
    /// `[...]`, may be absent
    Optional,
    /// `{...}` or a single token
    Mandatory,
}

/// Argument shape written as a compact string: `*` star, `[` optional,
/// `{` mandatory. `\section` is `*[{`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgSpec {
    args: Vec<ArgKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpecError {
    pub spec: String,
    pub found: char,
}

impl fmt::Display for ArgSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid argument spec '{}': unexpected '{}' (use '*', '[' or '{{')",
            self.spec, self.found
        )
    }
}

impl std::error::Error for ArgSpecError {}

impl FromStr for ArgSpec {
    type Err = ArgSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let args = spec
            .chars()
            .map(|c| match c {
                '*' => Ok(ArgKind::Star),
                '[' => Ok(ArgKind::Optional),
                '{' => Ok(ArgKind::Mandatory),
                found => Err(ArgSpecError {
                    spec: spec.to_string(),
                    found,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { args })
    }
}

impl ArgSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_kinds(args: impl IntoIterator<Item = ArgKind>) -> Self {
        Self {
            args: args.into_iter().collect(),
        }
    }

    pub fn accepts_star(&self) -> bool {
        self.args.first() == Some(&ArgKind::Star)
    }

    /// Bracket and brace slots, in order, star excluded.
    pub fn slots(&self) -> impl Iterator<Item = ArgKind> + '_ {
        self.args
            .iter()
            .copied()
            .filter(|kind| *kind != ArgKind::Star)
    }

    pub fn mandatory_count(&self) -> usize {
        self.args
            .iter()
            .filter(|kind| **kind == ArgKind::Mandatory)
            .count()
    }
}

/// How the body of an environment is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvBody {
    /// Parsed as ordinary LaTeX
    #[default]
    Text,
    /// Parsed as math content
    Math,
    /// Kept raw until `\end{name}`; no child nodes
    Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvSpec {
    pub args: ArgSpec,
    pub body: EnvBody,
}

/// Macro and environment tables consulted by the parser.
#[derive(Debug, Clone)]
pub struct LatexContext {
    macros: HashMap<String, ArgSpec>,
    environments: HashMap<String, EnvSpec>,
}

const DEFAULT_MACROS: &[(&str, &str)] = &[
    // text formatting
    ("textbf", "{"),
    ("textit", "{"),
    ("textsl", "{"),
    ("textsc", "{"),
    ("texttt", "{"),
    ("textrm", "{"),
    ("textsf", "{"),
    ("textup", "{"),
    ("textmd", "{"),
    ("emph", "{"),
    ("underline", "{"),
    ("text", "{"),
    ("mbox", "{"),
    ("textsuperscript", "{"),
    ("textsubscript", "{"),
    // sectioning
    ("part", "*[{"),
    ("chapter", "*[{"),
    ("section", "*[{"),
    ("subsection", "*[{"),
    ("subsubsection", "*[{"),
    ("paragraph", "*[{"),
    ("subparagraph", "*[{"),
    ("caption", "*[{"),
    // front matter
    ("documentclass", "[{"),
    ("usepackage", "[{"),
    ("RequirePackage", "[{"),
    ("title", "[{"),
    ("author", "[{"),
    ("date", "{"),
    ("thanks", "{"),
    // cross references
    ("label", "{"),
    ("ref", "{"),
    ("eqref", "{"),
    ("pageref", "{"),
    ("autoref", "{"),
    ("cref", "*{"),
    ("Cref", "*{"),
    ("cite", "*[[{"),
    ("citep", "*[[{"),
    ("citet", "*[[{"),
    ("nocite", "{"),
    ("url", "{"),
    ("href", "{{"),
    ("footnote", "[{"),
    ("bibliography", "{"),
    ("bibliographystyle", "{"),
    // lists, floats, layout
    ("item", "["),
    ("includegraphics", "*[[{"),
    ("input", "{"),
    ("include", "{"),
    ("vspace", "*{"),
    ("hspace", "*{"),
    ("setlength", "{{"),
    ("\\", "*["),
    // definitions
    ("newcommand", "*{[[{"),
    ("renewcommand", "*{[[{"),
    ("providecommand", "*{[[{"),
    ("newenvironment", "*{[[{{"),
    ("renewenvironment", "*{[[{{"),
    // color, highlights and notes
    ("color", "[{"),
    ("textcolor", "[{{"),
    ("colorbox", "[{{"),
    ("hl", "{"),
    ("todo", "[{"),
    ("marginpar", "[{"),
    // latexdiff markup
    ("DIFadd", "{"),
    ("DIFdel", "{"),
    ("DIFaddFL", "{"),
    ("DIFdelFL", "{"),
    // math
    ("frac", "{{"),
    ("dfrac", "{{"),
    ("tfrac", "{{"),
    ("sqrt", "[{"),
    ("mathrm", "{"),
    ("mathbf", "{"),
    ("mathit", "{"),
    ("mathsf", "{"),
    ("mathtt", "{"),
    ("mathcal", "{"),
    ("mathbb", "{"),
    ("mathfrak", "{"),
    ("operatorname", "*{"),
    ("overline", "{"),
    ("underbrace", "{"),
    ("overbrace", "{"),
    ("hat", "{"),
    ("widehat", "{"),
    ("bar", "{"),
    ("tilde", "{"),
    ("widetilde", "{"),
    ("vec", "{"),
    ("dot", "{"),
    ("ddot", "{"),
];

const DEFAULT_ENVIRONMENTS: &[(&str, &str, EnvBody)] = &[
    ("document", "", EnvBody::Text),
    ("abstract", "", EnvBody::Text),
    ("center", "", EnvBody::Text),
    ("flushleft", "", EnvBody::Text),
    ("flushright", "", EnvBody::Text),
    ("quote", "", EnvBody::Text),
    ("quotation", "", EnvBody::Text),
    ("itemize", "[", EnvBody::Text),
    ("enumerate", "[", EnvBody::Text),
    ("description", "[", EnvBody::Text),
    ("figure", "[", EnvBody::Text),
    ("figure*", "[", EnvBody::Text),
    ("table", "[", EnvBody::Text),
    ("table*", "[", EnvBody::Text),
    ("tabular", "[{", EnvBody::Text),
    ("tabular*", "{[{", EnvBody::Text),
    ("minipage", "[[[{", EnvBody::Text),
    ("thebibliography", "{", EnvBody::Text),
    ("theorem", "[", EnvBody::Text),
    ("lemma", "[", EnvBody::Text),
    ("proof", "[", EnvBody::Text),
    ("equation", "", EnvBody::Math),
    ("equation*", "", EnvBody::Math),
    ("align", "", EnvBody::Math),
    ("align*", "", EnvBody::Math),
    ("alignat", "{", EnvBody::Math),
    ("alignat*", "{", EnvBody::Math),
    ("flalign", "", EnvBody::Math),
    ("flalign*", "", EnvBody::Math),
    ("gather", "", EnvBody::Math),
    ("gather*", "", EnvBody::Math),
    ("multline", "", EnvBody::Math),
    ("multline*", "", EnvBody::Math),
    ("eqnarray", "", EnvBody::Math),
    ("eqnarray*", "", EnvBody::Math),
    ("displaymath", "", EnvBody::Math),
    ("math", "", EnvBody::Math),
    ("verbatim", "", EnvBody::Verbatim),
    ("verbatim*", "", EnvBody::Verbatim),
    ("Verbatim", "[", EnvBody::Verbatim),
    ("lstlisting", "[", EnvBody::Verbatim),
    ("minted", "[{", EnvBody::Verbatim),
    ("comment", "", EnvBody::Verbatim),
];

impl Default for LatexContext {
    fn default() -> Self {
        let macros = DEFAULT_MACROS
            .iter()
            .map(|(name, spec)| (name.to_string(), parse_builtin(spec)))
            .collect();
        let environments = DEFAULT_ENVIRONMENTS
            .iter()
            .map(|(name, spec, body)| {
                (
                    name.to_string(),
                    EnvSpec {
                        args: parse_builtin(spec),
                        body: *body,
                    },
                )
            })
            .collect();
        Self {
            macros,
            environments,
        }
    }
}

fn parse_builtin(spec: &str) -> ArgSpec {
    spec.parse().unwrap_or_default()
}

impl LatexContext {
    /// A context that knows no macros or environments at all.
    pub fn empty() -> Self {
        Self {
            macros: HashMap::new(),
            environments: HashMap::new(),
        }
    }

    /// Register or override a macro's argument shape.
    pub fn define_macro(&mut self, name: impl Into<String>, args: ArgSpec) -> &mut Self {
        self.macros.insert(name.into(), args);
        self
    }

    /// Register a macro only if it is not known yet.
    pub fn ensure_macro(&mut self, name: &str, args: ArgSpec) -> &mut Self {
        self.macros.entry(name.to_string()).or_insert(args);
        self
    }

    pub fn define_environment(&mut self, name: impl Into<String>, spec: EnvSpec) -> &mut Self {
        self.environments.insert(name.into(), spec);
        self
    }

    pub fn macro_args(&self, name: &str) -> Option<&ArgSpec> {
        self.macros.get(name)
    }

    pub fn environment(&self, name: &str) -> Option<&EnvSpec> {
        self.environments.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arg_spec() {
        let spec: ArgSpec = "*[{".parse().unwrap();
        assert!(spec.accepts_star());
        assert_eq!(
            spec.slots().collect::<Vec<_>>(),
            vec![ArgKind::Optional, ArgKind::Mandatory]
        );
        assert_eq!(spec.mandatory_count(), 1);
    }

    #[test]
    fn rejects_bad_arg_spec() {
        let err = "{x".parse::<ArgSpec>().unwrap_err();
        assert_eq!(err.found, 'x');
    }

    #[test]
    fn builtin_tables_parse() {
        for (name, spec) in DEFAULT_MACROS {
            assert!(spec.parse::<ArgSpec>().is_ok(), "bad spec for \\{name}");
        }
        for (name, spec, _) in DEFAULT_ENVIRONMENTS {
            assert!(spec.parse::<ArgSpec>().is_ok(), "bad spec for {name}");
        }
    }

    #[test]
    fn ensure_macro_keeps_existing() {
        let mut ctx = LatexContext::default();
        ctx.ensure_macro("colorbox", ArgSpec::none());
        assert_eq!(ctx.macro_args("colorbox").unwrap().mandatory_count(), 2);

        ctx.ensure_macro("peckhl", "{{".parse().unwrap());
        assert_eq!(ctx.macro_args("peckhl").unwrap().mandatory_count(), 2);
    }

    #[test]
    fn environment_bodies() {
        let ctx = LatexContext::default();
        assert_eq!(ctx.environment("align*").unwrap().body, EnvBody::Math);
        assert_eq!(ctx.environment("verbatim").unwrap().body, EnvBody::Verbatim);
        assert!(ctx.environment("nonexistent").is_none());
    }
}
