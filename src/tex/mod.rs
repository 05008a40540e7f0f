//! LaTeX document model: a lenient parser producing a span-addressed tree,
//! a scoped read-only walker, and a mutator that rewrites leaf text while
//! keeping every span consistent with the buffer.

pub mod context;
pub mod document;
pub mod errors;
pub mod node;
pub mod parser;
pub mod walker;

pub use context::{ArgKind, ArgSpec, ArgSpecError, EnvBody, EnvSpec, LatexContext};
pub use document::{Document, Mutator};
pub use errors::{Location, ParseError, SpanError};
pub use node::{node_at, Delimiter, MathDelimiter, Node, NodeData, NodeKind};
pub use parser::LatexParser;
pub use walker::{Context, ContextFilter, Everywhere, FnVisitor, PathCollector, Visitor, Walker};
