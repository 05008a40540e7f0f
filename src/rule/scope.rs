//! Ancestor-based visibility of leaves.

use crate::rule::errors::PatternError;
use crate::tex::{Context, ContextFilter, Node, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Something an ancestor can be: a node kind, a named macro, or a named
/// environment. Written as `group`, `macro:DIFdel`, `env:figure`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeClass {
    Kind(NodeKind),
    Macro(String),
    Environment(String),
}

impl NodeClass {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            NodeClass::Kind(kind) => node.kind() == *kind,
            NodeClass::Macro(name) => node.macro_name() == Some(name.as_str()),
            NodeClass::Environment(name) => node.environment_name() == Some(name.as_str()),
        }
    }
}

impl FromStr for NodeClass {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix("macro:") {
            let name = name.strip_prefix('\\').unwrap_or(name);
            if name.is_empty() {
                return Err(PatternError::InvalidMacroName { name: s.to_string() });
            }
            return Ok(NodeClass::Macro(name.to_string()));
        }
        if let Some(name) = s
            .strip_prefix("env:")
            .or_else(|| s.strip_prefix("environment:"))
        {
            if name.is_empty() {
                return Err(unknown_class(s));
            }
            return Ok(NodeClass::Environment(name.to_string()));
        }
        NodeKind::parse(s)
            .map(NodeClass::Kind)
            .ok_or_else(|| unknown_class(s))
    }
}

fn unknown_class(name: &str) -> PatternError {
    let suggestion = NodeKind::ALL
        .iter()
        .map(|kind| kind.as_str())
        .chain(["macro:", "env:"])
        .map(|candidate| (candidate, strsim::jaro_winkler(name, candidate)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate.to_string());
    PatternError::UnknownNodeClass {
        name: name.to_string(),
        suggestion,
    }
}

impl TryFrom<String> for NodeClass {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeClass> for String {
    fn from(class: NodeClass) -> Self {
        class.to_string()
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeClass::Kind(kind) => write!(f, "{kind}"),
            NodeClass::Macro(name) => write!(f, "macro:{name}"),
            NodeClass::Environment(name) => write!(f, "env:{name}"),
        }
    }
}

/// Exactly one of the two modes is active per rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePolicy {
    /// Visible iff every ancestor matches an allowed class.
    Whitelist(Vec<NodeClass>),
    /// Visible iff no ancestor matches a forbidden class.
    Blacklist(Vec<NodeClass>),
}

impl ScopePolicy {
    pub fn default_allowed() -> Vec<NodeClass> {
        vec![
            NodeClass::Kind(NodeKind::Chars),
            NodeClass::Kind(NodeKind::Group),
            NodeClass::Kind(NodeKind::Environment),
        ]
    }

    fn permits(&self, ancestors: &[&Node]) -> bool {
        match self {
            ScopePolicy::Whitelist(allowed) => ancestors
                .iter()
                .all(|node| allowed.iter().any(|class| class.matches(node))),
            ScopePolicy::Blacklist(forbidden) => !ancestors
                .iter()
                .any(|node| forbidden.iter().any(|class| class.matches(node))),
        }
    }
}

impl Default for ScopePolicy {
    fn default() -> Self {
        ScopePolicy::Whitelist(Self::default_allowed())
    }
}

/// Where a rule may fire: a policy plus an optional environment restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub policy: ScopePolicy,
    /// When set, the leaf needs at least one enclosing environment and
    /// every enclosing environment must be listed.
    pub environments: Option<Vec<String>>,
}

impl Scope {
    pub fn blacklist(forbidden: Vec<NodeClass>) -> Self {
        Self {
            policy: ScopePolicy::Blacklist(forbidden),
            environments: None,
        }
    }

    pub fn whitelist(allowed: Vec<NodeClass>) -> Self {
        Self {
            policy: ScopePolicy::Whitelist(allowed),
            environments: None,
        }
    }

    pub fn within_environments(mut self, environments: Vec<String>) -> Self {
        self.environments = Some(environments);
        self
    }

    fn environments_permit(&self, ancestors: &[&Node]) -> bool {
        let Some(allowed) = &self.environments else {
            return true;
        };
        let mut enclosing = ancestors.iter().filter_map(|node| node.environment_name());
        let mut any = false;
        let all_listed = enclosing.all(|name| {
            any = true;
            allowed.iter().any(|a| a == name)
        });
        any && all_listed
    }
}

impl ContextFilter for Scope {
    fn permits(&self, context: &Context<'_, '_>) -> bool {
        let ancestors = context.ancestors();
        self.policy.permits(ancestors) && self.environments_permit(ancestors)
    }
}

/// Scope as authored: extra allowed classes (extending the default
/// whitelist), forbidden classes (switching to blacklist mode), and an
/// optional environment restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScopeOptions {
    #[serde(default)]
    pub allowed: Vec<NodeClass>,
    #[serde(default)]
    pub forbidden: Vec<NodeClass>,
    #[serde(default)]
    pub environments: Option<Vec<String>>,
}

impl ScopeOptions {
    pub fn allow(mut self, class: NodeClass) -> Self {
        self.allowed.push(class);
        self
    }

    pub fn forbid(mut self, class: NodeClass) -> Self {
        self.forbidden.push(class);
        self
    }

    pub fn in_environments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Build a scope whose blacklist starts from `base_forbidden` when no
    /// whitelist entries are given.
    pub fn into_scope_with(self, base_forbidden: Option<Vec<NodeClass>>) -> Result<Scope, PatternError> {
        if !self.allowed.is_empty() && !self.forbidden.is_empty() {
            return Err(PatternError::ConflictingScope);
        }
        let policy = match base_forbidden {
            Some(mut forbidden) if self.allowed.is_empty() => {
                for class in self.forbidden {
                    if !forbidden.contains(&class) {
                        forbidden.push(class);
                    }
                }
                ScopePolicy::Blacklist(forbidden)
            }
            _ if !self.forbidden.is_empty() => ScopePolicy::Blacklist(self.forbidden),
            _ => {
                let mut allowed = ScopePolicy::default_allowed();
                for class in self.allowed {
                    if !allowed.contains(&class) {
                        allowed.push(class);
                    }
                }
                ScopePolicy::Whitelist(allowed)
            }
        };
        Ok(Scope {
            policy,
            environments: self.environments,
        })
    }

    pub fn into_scope(self) -> Result<Scope, PatternError> {
        self.into_scope_with(None)
    }
}
