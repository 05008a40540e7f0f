use crate::tex::context::LatexContext;
use crate::tex::errors::{ParseError, SpanError};
use crate::tex::node::{node_at, roots, roots_mut, ChildrenMut, Node};
use crate::tex::parser::LatexParser;
use std::cmp::Ordering;

/// A parsed document: the buffer and the node tree addressing into it.
///
/// The tree is the only owner of the buffer. Leaf edits go through
/// [`Mutator::apply_text_change`], which keeps every span valid without a
/// reparse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    buffer: String,
    nodes: Vec<Node>,
}

/// Capability to rewrite a leaf's text in place.
///
/// Kept apart from [`crate::tex::Visitor`] so that traversal never mutates
/// and mutation never traverses.
pub trait Mutator {
    /// Replace the text of the character run at `path` and resynchronize
    /// all spans. Returns the length delta in bytes.
    fn apply_text_change(&mut self, path: &[usize], new_text: &str) -> Result<isize, SpanError>;
}

impl Document {
    pub fn parse(source: impl Into<String>, context: &LatexContext) -> Result<Self, ParseError> {
        let buffer = source.into();
        let nodes = LatexParser::new(context).parse(&buffer)?;
        Ok(Self { buffer, nodes })
    }

    pub fn source(&self) -> &str {
        &self.buffer
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_source(self) -> String {
        self.buffer
    }

    /// The literal text of a node.
    pub fn text(&self, node: &Node) -> &str {
        node.verbatim(&self.buffer)
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        node_at(&self.nodes, path)
    }

    /// Concatenate the verbatim text of all root nodes.
    pub fn reserialize(&self) -> String {
        roots(&self.nodes).map(|node| self.text(node)).collect()
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(Node::subtree_len).sum()
    }

    /// Verify the span invariant: roots tile the buffer, every span lies on
    /// character boundaries inside the buffer, and children nest inside
    /// their parents.
    pub fn check_spans(&self) -> Result<(), SpanError> {
        let mut expected = 0;
        for node in &self.nodes {
            if node.pos != expected {
                return Err(SpanError::RootGap { pos: expected });
            }
            self.check_node(node)?;
            expected = node.end();
        }
        if expected != self.buffer.len() {
            return Err(SpanError::RootGap { pos: expected });
        }
        Ok(())
    }

    fn check_node(&self, node: &Node) -> Result<(), SpanError> {
        if node.end() > self.buffer.len() {
            return Err(SpanError::InvalidByteRange {
                start: node.pos,
                end: node.end(),
                buffer_len: self.buffer.len(),
            });
        }
        if !self.buffer.is_char_boundary(node.pos) || !self.buffer.is_char_boundary(node.end()) {
            return Err(SpanError::NotCharBoundary {
                start: node.pos,
                end: node.end(),
            });
        }
        for child in node.children() {
            if child.pos < node.pos || child.end() > node.end() {
                return Err(SpanError::ChildOutsideParent {
                    child_start: child.pos,
                    child_end: child.end(),
                    parent_start: node.pos,
                    parent_end: node.end(),
                });
            }
            self.check_node(child)?;
        }
        Ok(())
    }
}

impl Mutator for Document {
    fn apply_text_change(&mut self, path: &[usize], new_text: &str) -> Result<isize, SpanError> {
        let leaf = node_at(&self.nodes, path).ok_or_else(|| SpanError::NoSuchNode {
            path: path.to_vec(),
        })?;
        if !leaf.is_leaf() {
            return Err(SpanError::NotALeaf {
                path: path.to_vec(),
                kind: leaf.kind().as_str(),
            });
        }

        let (start, end) = (leaf.pos, leaf.end());
        if end > self.buffer.len() {
            return Err(SpanError::InvalidByteRange {
                start,
                end,
                buffer_len: self.buffer.len(),
            });
        }
        if !self.buffer.is_char_boundary(start) || !self.buffer.is_char_boundary(end) {
            return Err(SpanError::NotCharBoundary { start, end });
        }

        let delta = new_text.len() as isize - leaf.len as isize;
        self.buffer.replace_range(start..end, new_text);
        if delta != 0 {
            propagate(roots_mut(&mut self.nodes), path, delta);
        }
        Ok(delta)
    }
}

/// Push a length change at the leaf addressed by `path` through the tree.
///
/// Nodes on the path (the leaf and every ancestor straddling the edit
/// point) grow by `delta`; nodes after it in document order move by
/// `delta`; nodes before it keep their spans.
fn propagate(nodes: ChildrenMut<'_>, path: &[usize], delta: isize) {
    let Some((&target, rest)) = path.split_first() else {
        return;
    };
    for (index, node) in nodes.enumerate() {
        match index.cmp(&target) {
            Ordering::Less => {}
            Ordering::Equal => {
                node.len = node.len.saturating_add_signed(delta);
                propagate(node.children_mut(), rest, delta);
            }
            Ordering::Greater => node.shift(delta),
        }
    }
}
