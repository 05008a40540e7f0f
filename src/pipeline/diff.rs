//! Comparing the original and edited documents.

use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// The external comparison failed. The document keeps its edited output;
/// only the diff and highlight stages are skipped.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' produced output that is not UTF-8")]
    NotUtf8 { program: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Produces a marked-up diff document from an original and an edited file.
///
/// Insertions and deletions are expected as `\DIFadd{...}` and
/// `\DIFdel{...}`, which the highlight stage knows to treat specially.
pub trait DiffTool: Send + Sync {
    fn name(&self) -> &str;

    fn diff(&self, original: &Path, edited: &Path) -> Result<String, CollaboratorError>;
}

/// Runs an external program as `program [args..] original edited` and
/// captures its standard output.
#[derive(Debug, Clone)]
pub struct ExternalDiff {
    program: String,
    args: Vec<String>,
}

impl Default for ExternalDiff {
    fn default() -> Self {
        Self::new("latexdiff")
    }
}

impl ExternalDiff {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl DiffTool for ExternalDiff {
    fn name(&self) -> &str {
        &self.program
    }

    fn diff(&self, original: &Path, edited: &Path) -> Result<String, CollaboratorError> {
        tracing::debug!(program = %self.program, original = %original.display(), "running diff");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(original)
            .arg(edited)
            .output()
            .map_err(|source| CollaboratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CollaboratorError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| CollaboratorError::NotUtf8 {
            program: self.program.clone(),
        })
    }
}

/// In-process word diff, for machines without `latexdiff`.
///
/// Only runs of plain words are wrapped. A changed token holding any LaTeX
/// special character cannot be wrapped safely: inserted ones are written
/// bare and deleted ones are dropped, so the diff document still compiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDiff;

const SPECIAL: &[char] = &['{', '}', '\\', '%', '$', '&', '#', '^', '_', '~'];

const PREAMBLE: &str = "%DIF PREAMBLE
\\RequirePackage{xcolor}
\\RequirePackage[normalem]{ulem}
\\providecommand{\\DIFadd}[1]{{\\protect\\color{blue}\\uwave{#1}}}
\\providecommand{\\DIFdel}[1]{{\\protect\\color{red}\\sout{#1}}}
\\providecommand{\\DIFaddFL}[1]{\\DIFadd{#1}}
\\providecommand{\\DIFdelFL}[1]{\\DIFdel{#1}}
%DIF END PREAMBLE
";

fn is_space(token: &str) -> bool {
    token.chars().all(char::is_whitespace)
}

fn is_plain_word(token: &str) -> bool {
    !is_space(token) && !token.contains(SPECIAL)
}

impl BuiltinDiff {
    pub fn diff_text(&self, original: &str, edited: &str) -> String {
        let diff = TextDiff::from_words(original, edited);
        let mut out = String::with_capacity(edited.len() + edited.len() / 4);
        let mut run: Vec<&str> = Vec::new();
        let mut run_tag = ChangeTag::Equal;

        for change in diff.iter_all_changes() {
            if change.tag() != run_tag {
                emit_run(run_tag, &run, &mut out);
                run.clear();
                run_tag = change.tag();
            }
            run.push(change.value());
        }
        emit_run(run_tag, &run, &mut out);

        inject_preamble(out)
    }
}

fn emit_run(tag: ChangeTag, tokens: &[&str], out: &mut String) {
    let macro_name = match tag {
        ChangeTag::Equal => {
            out.extend(tokens.iter().copied());
            return;
        }
        ChangeTag::Insert => "DIFadd",
        ChangeTag::Delete => "DIFdel",
    };

    let mut words: Vec<&str> = Vec::new();
    for token in tokens {
        if is_plain_word(token) || (is_space(token) && !words.is_empty()) {
            words.push(token);
            continue;
        }
        flush_words(tag, macro_name, &mut words, out);
        if tag == ChangeTag::Insert {
            out.push_str(token);
        }
    }
    flush_words(tag, macro_name, &mut words, out);
}

fn flush_words(tag: ChangeTag, macro_name: &str, words: &mut Vec<&str>, out: &mut String) {
    let mut trailing = Vec::new();
    while words.last().is_some_and(|token| is_space(token)) {
        trailing.extend(words.pop());
    }
    if !words.is_empty() {
        out.push('\\');
        out.push_str(macro_name);
        out.push('{');
        out.extend(words.iter().copied());
        out.push('}');
    }
    if tag == ChangeTag::Insert {
        out.extend(trailing.into_iter().rev());
    }
    words.clear();
}

fn inject_preamble(mut text: String) -> String {
    if let Some(at) = text.find("\\begin{document}") {
        text.insert_str(at, PREAMBLE);
    }
    text
}

impl DiffTool for BuiltinDiff {
    fn name(&self) -> &str {
        "builtin"
    }

    fn diff(&self, original: &Path, edited: &Path) -> Result<String, CollaboratorError> {
        let read = |path: &Path| {
            fs::read_to_string(path).map_err(|source| CollaboratorError::Read {
                path: path.to_path_buf(),
                source,
            })
        };
        Ok(self.diff_text(&read(original)?, &read(edited)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The edited text back from a diff: deletions dropped, insertions
    /// unwrapped.
    fn accept(diff: &str) -> String {
        let mut out = String::new();
        let mut rest = diff;
        loop {
            let add = rest.find(r"\DIFadd{");
            let del = rest.find(r"\DIFdel{");
            let (at, keep) = match (add, del) {
                (Some(a), Some(d)) if a < d => (a, true),
                (Some(a), None) => (a, true),
                (_, Some(d)) => (d, false),
                (None, None) => break,
            };
            out.push_str(&rest[..at]);
            let body = &rest[at + r"\DIFadd{".len()..];
            let close = body.find('}').unwrap();
            if keep {
                out.push_str(&body[..close]);
            }
            rest = &body[close + 1..];
        }
        out.push_str(rest);
        out
    }

    #[test]
    fn wraps_changed_word_runs() {
        let edited = "The result holds.";
        let out = BuiltinDiff.diff_text("It follows that the result holds.", edited);
        assert!(out.contains(r"\DIFadd{The}"), "{out}");
        assert!(out.contains(r"\DIFdel{It"), "{out}");
        assert!(out.contains(r"the}"), "{out}");
        assert_eq!(accept(&out), edited);
    }

    #[test]
    fn unchanged_text_passes_through() {
        let text = "Same \\emph{text} here.";
        assert_eq!(BuiltinDiff.diff_text(text, text), text);
    }

    #[test]
    fn special_tokens_are_never_wrapped() {
        let out = BuiltinDiff.diff_text(r"a \old{x} b", r"a \new{y} b");
        assert!(out.contains(r"\new{y}"), "{out}");
        assert!(!out.contains(r"\old{x}"), "{out}");
        assert!(!out.contains(r"\DIFadd{\new"), "{out}");
    }

    #[test]
    fn preamble_goes_before_document() {
        let out = BuiltinDiff.diff_text(
            "\\documentclass{article}\n\\begin{document}\nold\n\\end{document}\n",
            "\\documentclass{article}\n\\begin{document}\nnew\n\\end{document}\n",
        );
        let preamble = out.find("\\providecommand{\\DIFadd}").unwrap();
        let document = out.find("\\begin{document}").unwrap();
        assert!(preamble < document);
        assert!(out.contains(r"\DIFdel{old}"), "{out}");
        assert!(out.contains(r"\DIFadd{new}"), "{out}");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tex");
        fs::write(&a, "x").unwrap();
        let err = ExternalDiff::new("oxpecker-no-such-diff-program")
            .diff(&a, &a)
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Spawn { .. }));
    }
}
