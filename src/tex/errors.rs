use thiserror::Error;

/// Malformed input document. Fatal to that document only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unterminated group opened at byte {start}")]
    UnterminatedGroup { start: usize },

    #[error("unterminated optional argument opened at byte {start}")]
    UnterminatedBracket { start: usize },

    #[error("unterminated environment '{name}' opened at byte {start}")]
    UnterminatedEnvironment { name: String, start: usize },

    #[error("unterminated math opened at byte {start}")]
    UnterminatedMath { start: usize },

    #[error("unterminated verbatim '{name}' opened at byte {start}")]
    UnterminatedVerbatim { name: String, start: usize },

    #[error("\\end{{{found}}} at byte {pos} does not close \\begin{{{expected}}}")]
    MismatchedEnvironment {
        expected: String,
        found: String,
        pos: usize,
    },

    #[error("\\end{{{name}}} at byte {pos} without matching \\begin")]
    UnexpectedEnd { name: String, pos: usize },

    #[error("unmatched closing brace at byte {pos}")]
    UnexpectedClose { pos: usize },

    #[error("unmatched math delimiter '{delimiter}' at byte {pos}")]
    UnexpectedMathClose { delimiter: String, pos: usize },

    #[error("macro \\{name} at byte {pos} is missing a mandatory argument")]
    MissingArgument { name: String, pos: usize },

    #[error("malformed environment name at byte {pos}")]
    MalformedEnvironment { pos: usize },

    #[error("dangling escape character at byte {pos}")]
    DanglingEscape { pos: usize },
}

impl ParseError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnterminatedGroup { start }
            | ParseError::UnterminatedBracket { start }
            | ParseError::UnterminatedEnvironment { start, .. }
            | ParseError::UnterminatedMath { start }
            | ParseError::UnterminatedVerbatim { start, .. } => *start,
            ParseError::MismatchedEnvironment { pos, .. }
            | ParseError::UnexpectedEnd { pos, .. }
            | ParseError::UnexpectedClose { pos }
            | ParseError::UnexpectedMathClose { pos, .. }
            | ParseError::MissingArgument { pos, .. }
            | ParseError::MalformedEnvironment { pos }
            | ParseError::DanglingEscape { pos } => *pos,
        }
    }

    /// 1-based line and column of the error within `source`.
    pub fn location(&self, source: &str) -> Location {
        Location::from_offset(source, self.offset())
    }
}

/// Rejected span synchronization. The buffer and tree are left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanError {
    #[error("no node at path {path:?}")]
    NoSuchNode { path: Vec<usize> },

    #[error("node at path {path:?} is a {kind}, not a character run")]
    NotALeaf { path: Vec<usize>, kind: &'static str },

    #[error("invalid byte range: [{start}, {end}) in buffer of length {buffer_len}")]
    InvalidByteRange {
        start: usize,
        end: usize,
        buffer_len: usize,
    },

    #[error("span [{start}, {end}) does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },

    #[error("child span [{child_start}, {child_end}) escapes parent [{parent_start}, {parent_end})")]
    ChildOutsideParent {
        child_start: usize,
        child_end: usize,
        parent_start: usize,
        parent_end: usize,
    },

    #[error("root nodes leave a gap or overlap at byte {pos}")]
    RootGap { pos: usize },
}

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
