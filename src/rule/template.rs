//! Replacement templates in the familiar `re.sub` syntax.
//!
//! | Syntax          | Meaning                                       |
//! |-----------------|-----------------------------------------------|
//! | `\1` .. `\99`   | numbered group                                |
//! | `\g<1>`         | numbered group                                |
//! | `\g<name>`      | named group                                   |
//! | `\u\1`          | group with its first character upper-cased    |
//! | `\\`            | a single backslash                            |
//! | `\n` `\t` `\r`  | newline, tab, carriage return                 |
//! | `\{` etc.       | any other non-letter escape is kept as written|
//!
//! Unknown letter escapes are rejected so that typos surface at load time.

use crate::rule::errors::PatternError;
use fancy_regex::{Captures, Regex};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRef::Index(idx) => write!(f, "{idx}"),
            GroupRef::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    #[default]
    Verbatim,
    /// Only the first character is upper-cased; the rest is kept as captured.
    TitleFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Group { group: GroupRef, case: CaseMode },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn literal(text: impl Into<String>) -> Self {
        let mut template = Self::default();
        template.push_literal(&text.into());
        template
    }

    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let mut template = Self::default();
        let mut rest = source;
        let mut offset = 0;

        while let Some(idx) = rest.find('\\') {
            template.push_literal(&rest[..idx]);
            let at = offset + idx;
            let (segment, consumed) = parse_escape(source, at)?;
            match segment {
                Segment::Literal(text) => template.push_literal(&text),
                group => template.segments.push(group),
            }
            offset = at + consumed;
            rest = &source[offset..];
        }
        template.push_literal(rest);
        Ok(template)
    }

    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut template = Self::default();
        template.extend(segments);
        template
    }

    pub fn extend(&mut self, segments: impl IntoIterator<Item = Segment>) {
        for segment in segments {
            match segment {
                Segment::Literal(text) => self.push_literal(&text),
                group => self.segments.push(group),
            }
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Literal(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Literal(text.to_string()));
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupRef> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Group { group, .. } => Some(group),
            Segment::Literal(_) => None,
        })
    }

    /// Check every group reference against the compiled pattern.
    pub fn validate(&self, regex: &Regex) -> Result<(), PatternError> {
        for group in self.groups() {
            let known = match group {
                GroupRef::Index(idx) => *idx < regex.captures_len(),
                GroupRef::Name(name) => regex.capture_names().flatten().any(|n| n == name),
            };
            if !known {
                return Err(PatternError::UnknownGroup {
                    replacement: self.to_string(),
                    group: group.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Literal braces must balance on their own. Captured text never
    /// carries braces, since character runs cannot contain them.
    pub fn braces_balanced(&self) -> bool {
        let literal: String = self
            .segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Literal(text) => Some(text.as_str()),
                Segment::Group { .. } => None,
            })
            .collect();
        braces_balanced(&literal)
    }

    pub fn render(&self, captures: &Captures<'_>, out: &mut String) {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Group { group, case } => {
                    let text = match group {
                        GroupRef::Index(idx) => captures.get(*idx),
                        GroupRef::Name(name) => captures.name(name),
                    }
                    .map_or("", |m| m.as_str());
                    match case {
                        CaseMode::Verbatim => out.push_str(text),
                        CaseMode::TitleFirst => push_title_first(text, out),
                    }
                }
            }
        }
    }
}

pub(crate) fn push_title_first(text: &str, out: &mut String) {
    let mut chars = text.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
}

/// Depth never drops below zero and ends at zero. `\{` and `\}` are
/// literal braces in LaTeX and do not count.
pub(crate) fn braces_balanced(text: &str) -> bool {
    let mut depth: usize = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// Parse one escape starting at the backslash at `at`. Returns the segment
/// and the number of bytes consumed.
pub(crate) fn parse_escape(source: &str, at: usize) -> Result<(Segment, usize), PatternError> {
    let after = &source[at + 1..];
    let Some(next) = after.chars().next() else {
        return Err(PatternError::BadEscape {
            replacement: source.to_string(),
            escape: '\\',
            pos: at,
        });
    };

    let literal = |text: &str, consumed: usize| -> Result<(Segment, usize), PatternError> {
        Ok((Segment::Literal(text.to_string()), consumed))
    };

    match next {
        '\\' => literal("\\", 2),
        'n' => literal("\n", 2),
        't' => literal("\t", 2),
        'r' => literal("\r", 2),
        'u' => {
            let (segment, consumed) = parse_escape_group(source, at + 2)?;
            match segment {
                Segment::Group { group, .. } => Ok((
                    Segment::Group {
                        group,
                        case: CaseMode::TitleFirst,
                    },
                    2 + consumed,
                )),
                Segment::Literal(_) => Err(PatternError::BadGroupReference {
                    replacement: source.to_string(),
                    pos: at,
                }),
            }
        }
        'g' | '0'..='9' => parse_escape_group(source, at),
        c if c.is_ascii_alphabetic() => Err(PatternError::BadEscape {
            replacement: source.to_string(),
            escape: c,
            pos: at,
        }),
        c => {
            let mut text = String::from('\\');
            text.push(c);
            literal(&text, 1 + c.len_utf8())
        }
    }
}

/// Parse `\N`, `\NN` or `\g<...>` at `at`.
fn parse_escape_group(source: &str, at: usize) -> Result<(Segment, usize), PatternError> {
    let bad = || PatternError::BadGroupReference {
        replacement: source.to_string(),
        pos: at,
    };
    if !source.get(at..).is_some_and(|s| s.starts_with('\\')) {
        return Err(bad());
    }
    let after = &source[at + 1..];

    if let Some(inner) = after.strip_prefix("g<") {
        let close = inner.find('>').ok_or_else(bad)?;
        let name = &inner[..close];
        let group = if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            GroupRef::Index(name.parse().map_err(|_| bad())?)
        } else if is_group_name(name) {
            GroupRef::Name(name.to_string())
        } else {
            return Err(bad());
        };
        let consumed = 1 + 2 + close + 1;
        return Ok((
            Segment::Group {
                group,
                case: CaseMode::Verbatim,
            },
            consumed,
        ));
    }

    if after.starts_with('0') {
        return Err(PatternError::OctalEscape {
            replacement: source.to_string(),
            pos: at,
        });
    }
    let digits = after
        .bytes()
        .take(2)
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return Err(bad());
    }
    let index: usize = after[..digits].parse().map_err(|_| bad())?;
    Ok((
        Segment::Group {
            group: GroupRef::Index(index),
            case: CaseMode::Verbatim,
        },
        1 + digits,
    ))
}

fn is_group_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    for c in text.chars() {
                        match c {
                            '\\' => f.write_str("\\\\")?,
                            '\n' => f.write_str("\\n")?,
                            '\t' => f.write_str("\\t")?,
                            '\r' => f.write_str("\\r")?,
                            c => write!(f, "{c}")?,
                        }
                    }
                }
                Segment::Group { group, case } => {
                    if *case == CaseMode::TitleFirst {
                        f.write_str("\\u")?;
                    }
                    write!(f, "\\g<{group}>")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(pattern: &str, template: &str, haystack: &str) -> String {
        let regex = Regex::new(pattern).unwrap();
        let template = Template::parse(template).unwrap();
        template.validate(&regex).unwrap();
        let captures = regex.captures(haystack).unwrap().unwrap();
        let mut out = String::new();
        template.render(&captures, &mut out);
        out
    }

    #[test]
    fn numbered_and_named_groups() {
        assert_eq!(render(r"(\w+) (\w+)", r"\2 \1", "hello world"), "world hello");
        assert_eq!(
            render(r"(?P<first>\w+) (\w+)", r"\g<2>-\g<first>", "a b"),
            "b-a"
        );
    }

    #[test]
    fn escapes_follow_sub_rules() {
        let t = Template::parse(r"\\textbf{x}\n\{").unwrap();
        assert_eq!(
            t.segments(),
            &[Segment::Literal("\\textbf{x}\n\\{".to_string())]
        );
    }

    #[test]
    fn title_first_touches_one_character() {
        assert_eq!(render(r"is (\w+)", r"\u\1", "is xyz"), "Xyz");
        assert_eq!(render(r"is (\w*)", r"[\u\1]", "is "), "[]");
    }

    #[test]
    fn unmatched_group_renders_empty() {
        assert_eq!(render(r"a(b)?", r"<\1>", "a"), "<>");
    }

    #[test]
    fn rejects_unknown_letter_escape() {
        assert!(matches!(
            Template::parse(r"\q"),
            Err(PatternError::BadEscape { escape: 'q', .. })
        ));
        assert!(matches!(
            Template::parse(r"\g<1"),
            Err(PatternError::BadGroupReference { .. })
        ));
        assert!(Template::parse("trailing\\").is_err());
    }

    #[test]
    fn rejects_octal_escapes() {
        for source in [r"\0", r"<\01>", r"\u\0"] {
            assert!(
                matches!(Template::parse(source), Err(PatternError::OctalEscape { .. })),
                "{source}"
            );
        }
        assert_eq!(render(r"a(b)", r"[\g<0>]", "ab"), "[ab]");
    }

    #[test]
    fn validate_reports_unknown_groups() {
        let regex = Regex::new(r"(a)").unwrap();
        let err = Template::parse(r"\2").unwrap().validate(&regex).unwrap_err();
        assert!(matches!(err, PatternError::UnknownGroup { group, .. } if group == "2"));
        let err = Template::parse(r"\g<nope>").unwrap().validate(&regex).unwrap_err();
        assert!(matches!(err, PatternError::UnknownGroup { .. }));
    }

    #[test]
    fn display_reparses_to_same_template() {
        let t = Template::parse(r"\\emph{\u\1}\t\g<name>").unwrap();
        assert_eq!(Template::parse(&t.to_string()).unwrap(), t);
    }

    #[test]
    fn brace_balance() {
        assert!(Template::parse(r"\\textbf{\1}").unwrap().braces_balanced());
        assert!(!Template::parse(r"\\textbf{\1").unwrap().braces_balanced());
        assert!(!Template::parse(r"}{").unwrap().braces_balanced());
        assert!(Template::parse(r"\}").unwrap().braces_balanced());
    }
}
