use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Chain;
use std::ops::Range;
use std::slice;

/// A node of the parsed document, addressed by a byte span into the buffer.
///
/// The span always covers the node's complete source text, delimiters and
/// trailing macro whitespace included. Children are nested inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Starting byte offset (inclusive)
    pub pos: usize,
    /// Length in bytes
    pub len: usize,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Literal text. Its content is `buffer[pos..pos + len]`.
    Chars,
    /// `{...}` group or `[...]` optional argument
    Group {
        delimiter: Delimiter,
        children: Vec<Node>,
    },
    /// `\begin{name}...\end{name}`
    Environment {
        name: String,
        args: Vec<Node>,
        body: Vec<Node>,
    },
    /// `\name` with its parsed arguments
    Macro {
        name: String,
        star: bool,
        args: Vec<Node>,
    },
    /// `%` to end of line
    Comment,
    Math {
        delimiter: MathDelimiter,
        args: Vec<Node>,
        body: Vec<Node>,
    },
    /// `&` or `~`
    Specials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Brace,
    Bracket,
}

impl Delimiter {
    pub fn open(self) -> char {
        match self {
            Delimiter::Brace => '{',
            Delimiter::Bracket => '[',
        }
    }

    pub fn close(self) -> char {
        match self {
            Delimiter::Brace => '}',
            Delimiter::Bracket => ']',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathDelimiter {
    /// `$...$`
    Dollar,
    /// `$$...$$`
    DoubleDollar,
    /// `\(...\)`
    Paren,
    /// `\[...\]`
    Bracket,
    /// A math environment such as `equation` or `align*`
    Environment { name: String },
}

impl MathDelimiter {
    pub fn is_display(&self) -> bool {
        !matches!(self, MathDelimiter::Dollar | MathDelimiter::Paren)
    }
}

/// Fieldless projection of [`NodeData`], used by scope policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Chars,
    Group,
    Environment,
    Macro,
    Comment,
    Math,
    Specials,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Chars,
        NodeKind::Group,
        NodeKind::Environment,
        NodeKind::Macro,
        NodeKind::Comment,
        NodeKind::Math,
        NodeKind::Specials,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Chars => "chars",
            NodeKind::Group => "group",
            NodeKind::Environment => "environment",
            NodeKind::Macro => "macro",
            NodeKind::Comment => "comment",
            NodeKind::Math => "math",
            NodeKind::Specials => "specials",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        NodeKind::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Iterator over a node's children: arguments first, then body.
pub type Children<'a> = Chain<slice::Iter<'a, Node>, slice::Iter<'a, Node>>;

/// Mutable counterpart of [`Children`].
pub type ChildrenMut<'a> = Chain<slice::IterMut<'a, Node>, slice::IterMut<'a, Node>>;

impl Node {
    pub fn new(pos: usize, len: usize, data: NodeData) -> Self {
        Self { pos, len, data }
    }

    pub fn chars(pos: usize, len: usize) -> Self {
        Self::new(pos, len, NodeData::Chars)
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Chars => NodeKind::Chars,
            NodeData::Group { .. } => NodeKind::Group,
            NodeData::Environment { .. } => NodeKind::Environment,
            NodeData::Macro { .. } => NodeKind::Macro,
            NodeData::Comment => NodeKind::Comment,
            NodeData::Math { .. } => NodeKind::Math,
            NodeData::Specials => NodeKind::Specials,
        }
    }

    /// End offset (exclusive).
    pub fn end(&self) -> usize {
        self.pos + self.len
    }

    pub fn span(&self) -> Range<usize> {
        self.pos..self.end()
    }

    /// The node's literal source text.
    pub fn verbatim<'s>(&self, buffer: &'s str) -> &'s str {
        &buffer[self.span()]
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.data, NodeData::Chars)
    }

    /// Macro name, if this is a macro.
    pub fn macro_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Macro { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Environment name for both text and math environments.
    pub fn environment_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Environment { name, .. } => Some(name),
            NodeData::Math {
                delimiter: MathDelimiter::Environment { name },
                ..
            } => Some(name),
            _ => None,
        }
    }

    fn child_slices(&self) -> (&[Node], &[Node]) {
        match &self.data {
            NodeData::Group { children, .. } => (children.as_slice(), NO_NODES),
            NodeData::Environment { args, body, .. } | NodeData::Math { args, body, .. } => {
                (args.as_slice(), body.as_slice())
            }
            NodeData::Macro { args, .. } => (args.as_slice(), NO_NODES),
            NodeData::Chars | NodeData::Comment | NodeData::Specials => (NO_NODES, NO_NODES),
        }
    }

    fn child_slices_mut(&mut self) -> (&mut [Node], &mut [Node]) {
        match &mut self.data {
            NodeData::Group { children, .. } => (children.as_mut_slice(), no_nodes_mut()),
            NodeData::Environment { args, body, .. } | NodeData::Math { args, body, .. } => {
                (args.as_mut_slice(), body.as_mut_slice())
            }
            NodeData::Macro { args, .. } => (args.as_mut_slice(), no_nodes_mut()),
            NodeData::Chars | NodeData::Comment | NodeData::Specials => {
                (no_nodes_mut(), no_nodes_mut())
            }
        }
    }

    pub fn children(&self) -> Children<'_> {
        let (args, body) = self.child_slices();
        args.iter().chain(body.iter())
    }

    pub fn children_mut(&mut self) -> ChildrenMut<'_> {
        let (args, body) = self.child_slices_mut();
        args.iter_mut().chain(body.iter_mut())
    }

    pub fn has_children(&self) -> bool {
        let (args, body) = self.child_slices();
        !args.is_empty() || !body.is_empty()
    }

    /// Move this node and its whole subtree by `delta` bytes.
    pub(crate) fn shift(&mut self, delta: isize) {
        self.pos = self.pos.saturating_add_signed(delta);
        for child in self.children_mut() {
            child.shift(delta);
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().map(Node::subtree_len).sum::<usize>()
    }
}

const NO_NODES: &[Node] = &[];

fn no_nodes_mut<'a>() -> &'a mut [Node] {
    Default::default()
}

/// Children of the virtual document root.
pub fn roots(nodes: &[Node]) -> Children<'_> {
    nodes.iter().chain(NO_NODES.iter())
}

/// Mutable counterpart of [`roots`].
pub fn roots_mut(nodes: &mut [Node]) -> ChildrenMut<'_> {
    nodes.iter_mut().chain(no_nodes_mut().iter_mut())
}

/// Look up a node by its child-index path from the root list.
pub fn node_at<'a>(nodes: &'a [Node], path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    let mut node = nodes.get(first)?;
    for &idx in rest {
        node = node.children().nth(idx)?;
    }
    Some(node)
}
