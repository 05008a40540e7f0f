use crate::tex::node::{roots, Children, Node, NodeKind};

/// The ancestors of the node under visit, root first.
#[derive(Debug, Clone, Copy)]
pub struct Context<'c, 't> {
    ancestors: &'c [&'t Node],
}

impl<'c, 't> Context<'c, 't> {
    pub fn new(ancestors: &'c [&'t Node]) -> Self {
        Self { ancestors }
    }

    pub fn ancestors(&self) -> &'c [&'t Node] {
        self.ancestors
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }

    pub fn parent(&self) -> Option<&'t Node> {
        self.ancestors.last().copied()
    }

    pub fn kinds(&self) -> impl Iterator<Item = NodeKind> + 'c {
        let ancestors: &'c [&'c Node] = self.ancestors;
        ancestors.iter().map(|node| node.kind())
    }

    pub fn within_macro(&self, name: &str) -> bool {
        self.ancestors
            .iter()
            .any(|node| node.macro_name() == Some(name))
    }

    pub fn within_environment(&self, name: &str) -> bool {
        self.ancestors
            .iter()
            .any(|node| node.environment_name() == Some(name))
    }
}

/// Read-only callback invoked by the [`Walker`] on eligible nodes.
pub trait Visitor<'t> {
    fn visit(&mut self, node: &'t Node, context: &Context<'_, 't>, path: &[usize]);
}

/// Adapter turning a closure into a [`Visitor`].
pub struct FnVisitor<F>(pub F);

impl<'t, F> Visitor<'t> for FnVisitor<F>
where
    F: FnMut(&'t Node, &Context<'_, 't>, &[usize]),
{
    fn visit(&mut self, node: &'t Node, context: &Context<'_, 't>, path: &[usize]) {
        (self.0)(node, context, path)
    }
}

/// Collects the paths of every visited node, in document order.
#[derive(Debug, Default)]
pub struct PathCollector {
    pub paths: Vec<Vec<usize>>,
}

impl<'t> Visitor<'t> for PathCollector {
    fn visit(&mut self, _node: &'t Node, _context: &Context<'_, 't>, path: &[usize]) {
        self.paths.push(path.to_vec());
    }
}

/// Eligibility test applied to the ancestor context of each node.
pub trait ContextFilter {
    fn permits(&self, context: &Context<'_, '_>) -> bool;
}

/// Every context is eligible.
pub struct Everywhere;

impl ContextFilter for Everywhere {
    fn permits(&self, _context: &Context<'_, '_>) -> bool {
        true
    }
}

/// Depth-first, pre-order traversal in parse order.
///
/// A node is handed to the visitor when its kind is actionable and its
/// context passes the filter. Composite nodes are always descended into,
/// whether or not they were eligible themselves.
#[derive(Debug, Clone)]
pub struct Walker {
    actionable: Vec<NodeKind>,
}

impl Default for Walker {
    fn default() -> Self {
        Self {
            actionable: vec![NodeKind::Chars],
        }
    }
}

impl Walker {
    pub fn new(actionable: impl IntoIterator<Item = NodeKind>) -> Self {
        Self {
            actionable: actionable.into_iter().collect(),
        }
    }

    pub fn actionable(&self) -> &[NodeKind] {
        &self.actionable
    }

    pub fn walk<'t, V, S>(&self, nodes: &'t [Node], scope: &S, visitor: &mut V)
    where
        V: Visitor<'t>,
        S: ContextFilter + ?Sized,
    {
        let mut ancestors = Vec::new();
        let mut path = Vec::new();
        self.walk_nodes(roots(nodes), scope, visitor, &mut ancestors, &mut path);
    }

    /// Walk with a closure instead of a [`Visitor`] implementation.
    pub fn walk_fn<'t, F, S>(&self, nodes: &'t [Node], scope: &S, f: F)
    where
        F: FnMut(&'t Node, &Context<'_, 't>, &[usize]),
        S: ContextFilter + ?Sized,
    {
        self.walk(nodes, scope, &mut FnVisitor(f));
    }

    fn walk_nodes<'t, V, S>(
        &self,
        nodes: Children<'t>,
        scope: &S,
        visitor: &mut V,
        ancestors: &mut Vec<&'t Node>,
        path: &mut Vec<usize>,
    ) where
        V: Visitor<'t>,
        S: ContextFilter + ?Sized,
    {
        for (index, node) in nodes.enumerate() {
            path.push(index);

            if self.actionable.contains(&node.kind()) {
                let context = Context::new(ancestors);
                if scope.permits(&context) {
                    visitor.visit(node, &context, path);
                }
            }

            if node.has_children() {
                ancestors.push(node);
                self.walk_nodes(node.children(), scope, visitor, ancestors, path);
                ancestors.pop();
            }

            path.pop();
        }
    }
}
