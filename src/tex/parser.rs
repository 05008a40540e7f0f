use crate::tex::context::{ArgKind, EnvBody, LatexContext};
use crate::tex::errors::ParseError;
use crate::tex::node::{Delimiter, MathDelimiter, Node, NodeData};

/// LaTeX parser producing a span-addressed node tree.
///
/// The parser is lossless: root nodes tile the source with no gaps, so the
/// concatenated verbatim text of the roots is the input again.
pub struct LatexParser<'c> {
    context: &'c LatexContext,
}

impl<'c> LatexParser<'c> {
    pub fn new(context: &'c LatexContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LatexContext {
        self.context
    }

    /// Parse a whole document into its root node list.
    pub fn parse(&self, source: &str) -> Result<Vec<Node>, ParseError> {
        let mut cursor = Cursor {
            src: source,
            pos: 0,
            context: self.context,
        };
        cursor.sequence(Until::Eof)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathClose {
    Dollar,
    DoubleDollar,
    Paren,
    Bracket,
}

/// What terminates the node sequence currently being parsed.
#[derive(Debug, Clone, Copy)]
enum Until<'s> {
    Eof,
    Brace { start: usize },
    Bracket { start: usize },
    End { name: &'s str, start: usize },
    Math { close: MathClose, start: usize },
}

/// Macros whose first mandatory argument names the command being defined.
const DEFINITIONS: &[&str] = &["newcommand", "renewcommand", "providecommand"];

struct Cursor<'s, 'c> {
    src: &'s str,
    pos: usize,
    context: &'c LatexContext,
}

impl<'s, 'c> Cursor<'s, 'c> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, pos: usize) -> Option<u8> {
        self.src.as_bytes().get(pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.src[self.pos..].starts_with(prefix)
    }

    fn flush_text(&self, nodes: &mut Vec<Node>, text_start: &mut Option<usize>) {
        if let Some(start) = text_start.take() {
            nodes.push(Node::chars(start, self.pos - start));
        }
    }

    fn sequence(&mut self, until: Until<'s>) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        let mut text_start = None;

        loop {
            let Some(byte) = self.peek() else {
                self.flush_text(&mut nodes, &mut text_start);
                return match until {
                    Until::Eof => Ok(nodes),
                    Until::Brace { start } => Err(ParseError::UnterminatedGroup { start }),
                    Until::Bracket { start } => Err(ParseError::UnterminatedBracket { start }),
                    Until::End { name, start } => Err(ParseError::UnterminatedEnvironment {
                        name: name.to_string(),
                        start,
                    }),
                    Until::Math { start, .. } => Err(ParseError::UnterminatedMath { start }),
                };
            };

            match byte {
                b'\\' => {
                    if let Some((name, after)) = self.end_tag()? {
                        return match until {
                            Until::End { name: expected, .. } if expected == name => {
                                self.flush_text(&mut nodes, &mut text_start);
                                self.pos = after;
                                Ok(nodes)
                            }
                            Until::End { name: expected, .. } => {
                                Err(ParseError::MismatchedEnvironment {
                                    expected: expected.to_string(),
                                    found: name.to_string(),
                                    pos: self.pos,
                                })
                            }
                            _ => Err(ParseError::UnexpectedEnd {
                                name: name.to_string(),
                                pos: self.pos,
                            }),
                        };
                    }

                    let closes = match until {
                        Until::Math {
                            close: MathClose::Paren,
                            ..
                        } => self.starts_with("\\)"),
                        Until::Math {
                            close: MathClose::Bracket,
                            ..
                        } => self.starts_with("\\]"),
                        _ => false,
                    };
                    if closes {
                        self.flush_text(&mut nodes, &mut text_start);
                        self.pos += 2;
                        return Ok(nodes);
                    }

                    self.flush_text(&mut nodes, &mut text_start);
                    let node = self.backslash()?;
                    nodes.push(node);
                }
                b'{' => {
                    self.flush_text(&mut nodes, &mut text_start);
                    let node = self.group(Delimiter::Brace)?;
                    nodes.push(node);
                }
                b'}' => {
                    if let Until::Brace { .. } = until {
                        self.flush_text(&mut nodes, &mut text_start);
                        self.pos += 1;
                        return Ok(nodes);
                    }
                    return Err(ParseError::UnexpectedClose { pos: self.pos });
                }
                b']' if matches!(until, Until::Bracket { .. }) => {
                    self.flush_text(&mut nodes, &mut text_start);
                    self.pos += 1;
                    return Ok(nodes);
                }
                b'%' => {
                    self.flush_text(&mut nodes, &mut text_start);
                    nodes.push(self.comment());
                }
                b'$' => {
                    match until {
                        Until::Math {
                            close: MathClose::Dollar,
                            ..
                        } => {
                            self.flush_text(&mut nodes, &mut text_start);
                            self.pos += 1;
                            return Ok(nodes);
                        }
                        Until::Math {
                            close: MathClose::DoubleDollar,
                            ..
                        } => {
                            if self.starts_with("$$") {
                                self.flush_text(&mut nodes, &mut text_start);
                                self.pos += 2;
                                return Ok(nodes);
                            }
                            return Err(ParseError::UnexpectedMathClose {
                                delimiter: "$".to_string(),
                                pos: self.pos,
                            });
                        }
                        _ => {}
                    }
                    self.flush_text(&mut nodes, &mut text_start);
                    let node = self.dollar_math()?;
                    nodes.push(node);
                }
                b'&' | b'~' => {
                    self.flush_text(&mut nodes, &mut text_start);
                    nodes.push(Node::new(self.pos, 1, NodeData::Specials));
                    self.pos += 1;
                }
                _ => {
                    if text_start.is_none() {
                        text_start = Some(self.pos);
                    }
                    self.pos += 1;
                }
            }
        }
    }

    /// If the cursor sits on `\end{name}`, return the name and the offset
    /// just past the closing brace. Does not move the cursor.
    fn end_tag(&self) -> Result<Option<(&'s str, usize)>, ParseError> {
        if !self.starts_with("\\end") {
            return Ok(None);
        }
        if self
            .peek_at(self.pos + 4)
            .is_some_and(|b| b.is_ascii_alphabetic())
        {
            // \endinput, \endgroup, ...
            return Ok(None);
        }
        let (name, after) = self.braced_name(self.pos + 4, self.pos)?;
        Ok(Some((name, after)))
    }

    /// Read `{name}` starting at `at` (leading whitespace allowed).
    fn braced_name(&self, at: usize, error_pos: usize) -> Result<(&'s str, usize), ParseError> {
        let mut p = at;
        while self.peek_at(p).is_some_and(|b| b.is_ascii_whitespace()) {
            p += 1;
        }
        if self.peek_at(p) != Some(b'{') {
            return Err(ParseError::MalformedEnvironment { pos: error_pos });
        }
        let name_start = p + 1;
        let close = self.src[name_start..]
            .find('}')
            .ok_or(ParseError::MalformedEnvironment { pos: error_pos })?;
        let name = &self.src[name_start..name_start + close];
        if name.is_empty() || name.contains(['{', '\\', '%', '\n']) {
            return Err(ParseError::MalformedEnvironment { pos: error_pos });
        }
        Ok((name, name_start + close + 1))
    }

    fn backslash(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        let first = self.src[start + 1..]
            .chars()
            .next()
            .ok_or(ParseError::DanglingEscape { pos: start })?;

        if first.is_ascii_alphabetic() {
            let name_len = self.src[start + 1..]
                .bytes()
                .take_while(u8::is_ascii_alphabetic)
                .count();
            let name = &self.src[start + 1..start + 1 + name_len];
            self.pos = start + 1 + name_len;
            return match name {
                "begin" => self.environment(start),
                "end" => Err(ParseError::MalformedEnvironment { pos: start }),
                "verb" => self.verb(start),
                _ => self.macro_tail(start, name, true),
            };
        }

        self.pos = start + 1 + first.len_utf8();
        match first {
            '(' => self.delimited_math(start, MathClose::Paren),
            '[' => self.delimited_math(start, MathClose::Bracket),
            ')' | ']' => Err(ParseError::UnexpectedMathClose {
                delimiter: format!("\\{first}"),
                pos: start,
            }),
            _ => {
                let name = &self.src[start + 1..self.pos];
                self.macro_tail(start, name, false)
            }
        }
    }

    fn macro_tail(&mut self, start: usize, name: &'s str, letters: bool) -> Result<Node, ParseError> {
        let context = self.context;
        let spec = context.macro_args(name);

        let mut star = false;
        if spec.is_some_and(|s| s.accepts_star()) && self.peek() == Some(b'*') {
            self.pos += 1;
            star = true;
        }
        if letters {
            self.skip_post_space();
        }

        let mut args = Vec::new();
        if let Some(spec) = spec {
            for slot in spec.slots() {
                match slot {
                    ArgKind::Optional => {
                        if let Some(arg) = self.optional_arg()? {
                            args.push(arg);
                        }
                    }
                    ArgKind::Mandatory if args.is_empty() && DEFINITIONS.contains(&name) => {
                        args.push(self.definition_target(name, start)?)
                    }
                    ArgKind::Mandatory => args.push(self.mandatory_arg(name, start)?),
                    ArgKind::Star => {}
                }
            }
        }

        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Macro {
                name: name.to_string(),
                star,
                args,
            },
        ))
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Whitespace after a control word, up to one line break. A blank line
    /// is a paragraph break and stays outside the macro.
    fn skip_post_space(&mut self) {
        self.skip_inline_space();
        if self.peek() == Some(b'\n') {
            let save = self.pos;
            self.pos += 1;
            self.skip_inline_space();
            if self.peek() == Some(b'\n') {
                self.pos = save;
            }
        }
    }

    fn optional_arg(&mut self) -> Result<Option<Node>, ParseError> {
        let save = self.pos;
        self.skip_inline_space();
        if self.peek() == Some(b'[') {
            return self.group(Delimiter::Bracket).map(Some);
        }
        self.pos = save;
        Ok(None)
    }

    fn mandatory_arg(&mut self, name: &str, macro_start: usize) -> Result<Node, ParseError> {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let missing = || ParseError::MissingArgument {
            name: name.to_string(),
            pos: macro_start,
        };
        match self.peek() {
            None | Some(b'}' | b'%' | b'$') => Err(missing()),
            Some(b'{') => self.group(Delimiter::Brace),
            Some(b'\\') => self.macro_token(),
            Some(b'&' | b'~') => {
                let node = Node::new(self.pos, 1, NodeData::Specials);
                self.pos += 1;
                Ok(node)
            }
            Some(_) => {
                let c = self.src[self.pos..].chars().next().ok_or_else(missing)?;
                let node = Node::chars(self.pos, c.len_utf8());
                self.pos += c.len_utf8();
                Ok(node)
            }
        }
    }

    /// The command being defined, e.g. the `{\foo}` in
    /// `\providecommand{\foo}[1]{...}`. Its own arguments are not parsed.
    fn definition_target(&mut self, name: &str, macro_start: usize) -> Result<Node, ParseError> {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        if self.peek() != Some(b'{') {
            return self.mandatory_arg(name, macro_start);
        }
        let start = self.pos;
        self.pos += 1;
        let mut children = Vec::new();
        if self.peek() == Some(b'\\') {
            children.push(self.macro_token()?);
        }
        children.extend(self.sequence(Until::Brace { start })?);
        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Group {
                delimiter: Delimiter::Brace,
                children,
            },
        ))
    }

    /// A bare control sequence used as an undelimited argument, e.g. the
    /// `\foo` in `\newcommand\foo{...}`. Its own arguments are not parsed.
    fn macro_token(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        let first = self.src[start + 1..]
            .chars()
            .next()
            .ok_or(ParseError::DanglingEscape { pos: start })?;
        let name_len = if first.is_ascii_alphabetic() {
            self.src[start + 1..]
                .bytes()
                .take_while(u8::is_ascii_alphabetic)
                .count()
        } else {
            first.len_utf8()
        };
        self.pos = start + 1 + name_len;
        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Macro {
                name: self.src[start + 1..self.pos].to_string(),
                star: false,
                args: Vec::new(),
            },
        ))
    }

    fn group(&mut self, delimiter: Delimiter) -> Result<Node, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let until = match delimiter {
            Delimiter::Brace => Until::Brace { start },
            Delimiter::Bracket => Until::Bracket { start },
        };
        let children = self.sequence(until)?;
        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Group {
                delimiter,
                children,
            },
        ))
    }

    fn comment(&mut self) -> Node {
        let start = self.pos;
        let len = self.src[start..].find('\n').unwrap_or(self.src.len() - start);
        self.pos = start + len;
        Node::new(start, len, NodeData::Comment)
    }

    fn dollar_math(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        let (close, delimiter) = if self.starts_with("$$") {
            self.pos += 2;
            (MathClose::DoubleDollar, MathDelimiter::DoubleDollar)
        } else {
            self.pos += 1;
            (MathClose::Dollar, MathDelimiter::Dollar)
        };
        let body = self.sequence(Until::Math { close, start })?;
        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Math {
                delimiter,
                args: Vec::new(),
                body,
            },
        ))
    }

    /// `\(...\)` or `\[...\]`; the opening delimiter is already consumed.
    fn delimited_math(&mut self, start: usize, close: MathClose) -> Result<Node, ParseError> {
        let delimiter = match close {
            MathClose::Bracket => MathDelimiter::Bracket,
            _ => MathDelimiter::Paren,
        };
        let body = self.sequence(Until::Math { close, start })?;
        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Math {
                delimiter,
                args: Vec::new(),
                body,
            },
        ))
    }

    /// `\begin{name}`; the cursor sits just past `\begin`.
    fn environment(&mut self, start: usize) -> Result<Node, ParseError> {
        let (name, after) = self.braced_name(self.pos, start)?;
        self.pos = after;

        let context = self.context;
        let spec = context.environment(name).cloned().unwrap_or_default();

        let mut args = Vec::new();
        for slot in spec.args.slots() {
            match slot {
                ArgKind::Optional => {
                    if let Some(arg) = self.optional_arg()? {
                        args.push(arg);
                    }
                }
                ArgKind::Mandatory => args.push(self.mandatory_arg(name, start)?),
                ArgKind::Star => {}
            }
        }

        let data = match spec.body {
            EnvBody::Verbatim => {
                let terminator = format!("\\end{{{name}}}");
                let found = self.src[self.pos..].find(&terminator).ok_or_else(|| {
                    ParseError::UnterminatedVerbatim {
                        name: name.to_string(),
                        start,
                    }
                })?;
                self.pos += found + terminator.len();
                NodeData::Environment {
                    name: name.to_string(),
                    args,
                    body: Vec::new(),
                }
            }
            EnvBody::Text => {
                let body = self.sequence(Until::End { name, start })?;
                NodeData::Environment {
                    name: name.to_string(),
                    args,
                    body,
                }
            }
            EnvBody::Math => {
                let body = self.sequence(Until::End { name, start })?;
                NodeData::Math {
                    delimiter: MathDelimiter::Environment {
                        name: name.to_string(),
                    },
                    args,
                    body,
                }
            }
        };

        Ok(Node::new(start, self.pos - start, data))
    }

    /// `\verb<d>...<d>`; the cursor sits just past `\verb`.
    fn verb(&mut self, start: usize) -> Result<Node, ParseError> {
        let unterminated = || ParseError::UnterminatedVerbatim {
            name: "verb".to_string(),
            start,
        };
        let mut star = false;
        if self.peek() == Some(b'*') {
            self.pos += 1;
            star = true;
        }
        let delim = self.src[self.pos..].chars().next().ok_or_else(unterminated)?;
        if delim.is_whitespace() {
            return Err(unterminated());
        }
        let content_start = self.pos + delim.len_utf8();
        let rest = &self.src[content_start..];
        let close = rest.find(delim).ok_or_else(unterminated)?;
        if rest[..close].contains('\n') {
            return Err(unterminated());
        }
        self.pos = content_start + close + delim.len_utf8();
        Ok(Node::new(
            start,
            self.pos - start,
            NodeData::Macro {
                name: "verb".to_string(),
                star,
                args: Vec::new(),
            },
        ))
    }
}
