//! One declaration, two case variants.
//!
//! A rule authored with a case marker (say `#`) tracks the case of the
//! marked letters. `#it follows that (.)` -> `#\1` expands into
//!
//! * a title-case rule matching `It follows that (.)` whose output has the
//!   first character of group 1 upper-cased, and
//! * a literal rule matching `it follows that (.)` with the output as
//!   written.
//!
//! Marker grammar, in both pattern and replacement: the marker followed by
//! itself is a literal marker, and backslash escapes are copied untouched,
//! so `\#` never marks anything. In a pattern the marker must precede a
//! lowercase letter. In a replacement it may precede a letter or a group
//! reference (`\1`, `\g<name>`).

use crate::rule::errors::PatternError;
use crate::rule::rule::Rule;
use crate::rule::scope::Scope;
use crate::rule::template::{parse_escape, CaseMode, GroupRef, Segment, Template};
use crate::rule::Replacement;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternPiece {
    /// Regex source, copied as is
    Raw(String),
    /// A lowercase letter whose case follows the input
    Tracked(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementPiece {
    /// Template source, parsed as an ordinary template
    Raw(String),
    /// A letter upper-cased in the title-case variant
    TrackedLiteral(char),
    /// A group whose first character is upper-cased in the title-case variant
    TrackedGroup(GroupRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseTracked {
    marker: char,
    pattern: Vec<PatternPiece>,
    replacement: Vec<ReplacementPiece>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Title,
    Literal,
}

impl CaseTracked {
    pub fn parse(pattern: &str, replacement: &str, marker: char) -> Result<Self, PatternError> {
        if marker == '\\' || marker.is_alphanumeric() || marker.is_whitespace() {
            return Err(PatternError::UnusableMarker { marker });
        }
        let pattern_pieces = parse_pattern(pattern, marker)?;
        if !pattern_pieces
            .iter()
            .any(|piece| matches!(piece, PatternPiece::Tracked(_)))
        {
            return Err(PatternError::NothingTracked {
                pattern: pattern.to_string(),
                marker,
            });
        }
        Ok(Self {
            marker,
            pattern: pattern_pieces,
            replacement: parse_replacement(replacement, marker)?,
        })
    }

    pub fn marker(&self) -> char {
        self.marker
    }

    pub fn pattern_pieces(&self) -> &[PatternPiece] {
        &self.pattern
    }

    pub fn replacement_pieces(&self) -> &[ReplacementPiece] {
        &self.replacement
    }

    /// Pattern source of the title-case variant.
    pub fn title_pattern(&self) -> String {
        self.render_pattern(Variant::Title)
    }

    /// Pattern source of the literal variant.
    pub fn literal_pattern(&self) -> String {
        self.render_pattern(Variant::Literal)
    }

    fn render_pattern(&self, variant: Variant) -> String {
        let mut out = String::new();
        for piece in &self.pattern {
            match piece {
                PatternPiece::Raw(source) => out.push_str(source),
                PatternPiece::Tracked(letter) => {
                    let letter: String = match variant {
                        Variant::Title => letter.to_uppercase().collect(),
                        Variant::Literal => letter.to_string(),
                    };
                    out.push_str(&fancy_regex::escape(&letter));
                }
            }
        }
        out
    }

    fn template(&self, variant: Variant) -> Result<Template, PatternError> {
        let mut template = Template::default();
        for piece in &self.replacement {
            match piece {
                ReplacementPiece::Raw(source) => {
                    template.extend(Template::parse(source)?.into_segments());
                }
                ReplacementPiece::TrackedLiteral(letter) => {
                    let text = match variant {
                        Variant::Title => letter.to_uppercase().collect(),
                        Variant::Literal => letter.to_string(),
                    };
                    template.extend([Segment::Literal(text)]);
                }
                ReplacementPiece::TrackedGroup(group) => {
                    let case = match variant {
                        Variant::Title => CaseMode::TitleFirst,
                        Variant::Literal => CaseMode::Verbatim,
                    };
                    template.extend([Segment::Group {
                        group: group.clone(),
                        case,
                    }]);
                }
            }
        }
        Ok(template)
    }

    /// Compile into the title-case rule and the literal rule, in the order
    /// they are meant to run.
    pub fn expand(&self, name: &str, scope: Scope) -> Result<(Rule, Rule), PatternError> {
        let title = Rule::new(
            format!("{name} [title case]"),
            &self.title_pattern(),
            Replacement::Template(self.template(Variant::Title)?),
            scope.clone(),
        )?;
        let literal = Rule::new(
            name,
            &self.literal_pattern(),
            Replacement::Template(self.template(Variant::Literal)?),
            scope,
        )?;
        Ok((title, literal))
    }
}

fn invalid_marker(marker: char, source: &str, pos: usize) -> PatternError {
    PatternError::InvalidCaseMarker {
        marker,
        source_text: source.to_string(),
        pos,
    }
}

fn parse_pattern(pattern: &str, marker: char) -> Result<Vec<PatternPiece>, PatternError> {
    let mut pieces = Vec::new();
    let mut raw = String::new();
    let mut chars = pattern.char_indices();

    while let Some((pos, c)) = chars.next() {
        if c == '\\' {
            raw.push(c);
            if let Some((_, escaped)) = chars.next() {
                raw.push(escaped);
            }
        } else if c == marker {
            match chars.next() {
                Some((_, next)) if next == marker => {
                    raw.push_str(&fancy_regex::escape(&marker.to_string()));
                }
                Some((_, next)) if next.is_lowercase() => {
                    if !raw.is_empty() {
                        pieces.push(PatternPiece::Raw(std::mem::take(&mut raw)));
                    }
                    pieces.push(PatternPiece::Tracked(next));
                }
                _ => return Err(invalid_marker(marker, pattern, pos)),
            }
        } else {
            raw.push(c);
        }
    }
    if !raw.is_empty() {
        pieces.push(PatternPiece::Raw(raw));
    }
    Ok(pieces)
}

fn parse_replacement(replacement: &str, marker: char) -> Result<Vec<ReplacementPiece>, PatternError> {
    let mut pieces = Vec::new();
    let mut raw = String::new();
    let mut pos = 0;

    while let Some(c) = replacement[pos..].chars().next() {
        if c == '\\' {
            let (_, consumed) = parse_escape(replacement, pos)?;
            raw.push_str(&replacement[pos..pos + consumed]);
            pos += consumed;
        } else if c == marker {
            let after = pos + c.len_utf8();
            let next = replacement[after..].chars().next();
            let tracked = match next {
                Some(n) if n == marker => {
                    raw.push(marker);
                    pos = after + n.len_utf8();
                    continue;
                }
                Some(n) if n.is_alphabetic() => {
                    pos = after + n.len_utf8();
                    ReplacementPiece::TrackedLiteral(n)
                }
                Some('\\') => match parse_escape(replacement, after)? {
                    (Segment::Group { group, case: CaseMode::Verbatim }, consumed) => {
                        pos = after + consumed;
                        ReplacementPiece::TrackedGroup(group)
                    }
                    _ => return Err(invalid_marker(marker, replacement, pos)),
                },
                _ => return Err(invalid_marker(marker, replacement, pos)),
            };
            if !raw.is_empty() {
                pieces.push(ReplacementPiece::Raw(std::mem::take(&mut raw)));
            }
            pieces.push(tracked);
        } else {
            raw.push(c);
            pos += c.len_utf8();
        }
    }
    if !raw.is_empty() {
        pieces.push(ReplacementPiece::Raw(raw));
    }
    Ok(pieces)
}
