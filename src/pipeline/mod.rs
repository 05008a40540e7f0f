//! Per-document edit pipeline and the worker pool running it.
//!
//! Each document goes through:
//!
//! ```text
//! original --rules--> edited --diff(original, edited)--> diff --highlights--> diff'
//! ```
//!
//! Stages within a document run strictly in order. Documents are
//! independent and run on scoped worker threads sharing one read-only
//! [`Pipeline`].

pub mod diff;
pub mod layout;

pub use diff::{BuiltinDiff, CollaboratorError, DiffTool, ExternalDiff};
pub use layout::{atomic_write, DocumentPaths, LayoutError, OutputLayout};

use crate::config::Checklist;
use crate::rule::{RuleReport, RuleSet};
use crate::tex::{LatexContext, Location, ParseError};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Edit,
    WriteEdited,
    Highlight,
    WriteDiff,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Edit => "edit",
            Stage::WriteEdited => "write edited",
            Stage::Highlight => "highlight",
            Stage::WriteDiff => "write diff",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} stage: parse error at {location}: {source}")]
    Parse {
        stage: Stage,
        location: Location,
        #[source]
        source: ParseError,
    },

    #[error("{stage} stage: {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Parse { stage, .. } | PipelineError::Io { stage, .. } => *stage,
        }
    }

    fn parse(stage: Stage, source: &str, err: ParseError) -> Self {
        PipelineError::Parse {
            stage,
            location: err.location(source),
            source: err,
        }
    }

    fn io(stage: Stage, path: &std::path::Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| PipelineError::Io {
            stage,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How far a document got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Edited, diffed and highlighted
    Complete,
    /// Edited; diffing is disabled for this run
    EditedOnly,
    /// Edited output kept; the diff tool failed
    DiffSkipped { reason: String },
    /// Raw diff written; the diff could not be parsed for highlighting
    HighlightSkipped { reason: String },
    Failed { stage: Stage, reason: String },
}

impl DocumentOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DocumentOutcome::Failed { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            DocumentOutcome::DiffSkipped { .. } | DocumentOutcome::HighlightSkipped { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub relative: PathBuf,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
    pub rules: Vec<RuleReport>,
    pub highlights: Vec<RuleReport>,
}

impl DocumentReport {
    fn new(relative: PathBuf) -> Self {
        Self {
            relative,
            outcome: DocumentOutcome::Complete,
            rules: Vec::new(),
            highlights: Vec::new(),
        }
    }

    pub fn leaves_changed(&self) -> usize {
        self.rules.iter().map(|r| r.leaves_changed).sum()
    }

    pub fn highlighted(&self) -> usize {
        self.highlights.iter().map(|r| r.leaves_changed).sum()
    }

    pub fn skipped_edits(&self) -> usize {
        self.rules
            .iter()
            .chain(&self.highlights)
            .map(|r| r.skipped.len())
            .sum()
    }
}

/// Totals over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub documents: usize,
    pub complete: usize,
    pub edited_only: usize,
    pub partial: usize,
    pub failed: usize,
    pub leaves_changed: usize,
    pub highlighted: usize,
    pub skipped_edits: usize,
}

impl Summary {
    pub fn from_reports(reports: &[DocumentReport]) -> Self {
        let mut summary = Summary {
            documents: reports.len(),
            ..Summary::default()
        };
        for report in reports {
            match report.outcome {
                DocumentOutcome::Complete => summary.complete += 1,
                DocumentOutcome::EditedOnly => summary.edited_only += 1,
                DocumentOutcome::DiffSkipped { .. } | DocumentOutcome::HighlightSkipped { .. } => {
                    summary.partial += 1
                }
                DocumentOutcome::Failed { .. } => summary.failed += 1,
            }
            summary.leaves_changed += report.leaves_changed();
            summary.highlighted += report.highlighted();
            summary.skipped_edits += report.skipped_edits();
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Rules, parser tables and the optional diff collaborator of one run.
pub struct Pipeline {
    rules: RuleSet,
    context: LatexContext,
    diff: Option<Box<dyn DiffTool>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("rules", &self.rules.rules().len())
            .field("highlights", &self.rules.highlights().len())
            .field("diff", &self.diff.as_ref().map(|d| d.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn new(rules: RuleSet, context: LatexContext) -> Self {
        Self {
            rules,
            context,
            diff: None,
        }
    }

    pub fn from_checklist(checklist: Checklist) -> Self {
        Self::new(checklist.rules, checklist.context)
    }

    pub fn with_diff(mut self, diff: Box<dyn DiffTool>) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn context(&self) -> &LatexContext {
        &self.context
    }

    pub fn edit_source(&self, source: &str) -> Result<(String, Vec<RuleReport>), ParseError> {
        self.rules.apply_rules(source, &self.context)
    }

    pub fn highlight_source(&self, source: &str) -> Result<(String, Vec<RuleReport>), ParseError> {
        self.rules.apply_highlights(source, &self.context)
    }

    /// Run every stage for one document. Failures are recorded in the
    /// report; nothing here aborts other documents.
    pub fn run_document(&self, document: &DocumentPaths) -> DocumentReport {
        let _span = tracing::info_span!("document", path = %document.relative.display()).entered();
        let mut report = DocumentReport::new(document.relative.clone());
        report.outcome = match self.process(document, &mut report) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("{err}");
                DocumentOutcome::Failed {
                    stage: err.stage(),
                    reason: err.to_string(),
                }
            }
        };
        report
    }

    fn process(
        &self,
        document: &DocumentPaths,
        report: &mut DocumentReport,
    ) -> Result<DocumentOutcome, PipelineError> {
        let original = fs::read_to_string(&document.original)
            .map_err(PipelineError::io(Stage::Read, &document.original))?;

        let (edited, rules) = self
            .edit_source(&original)
            .map_err(|e| PipelineError::parse(Stage::Edit, &original, e))?;
        report.rules = rules;
        atomic_write(&document.edited, &edited)
            .map_err(PipelineError::io(Stage::WriteEdited, &document.edited))?;
        tracing::debug!(leaves = report.leaves_changed(), "edited");

        let Some(diff_tool) = &self.diff else {
            return Ok(DocumentOutcome::EditedOnly);
        };
        let diffed = match diff_tool.diff(&document.original, &document.edited) {
            Ok(diffed) => diffed,
            Err(err) => {
                tracing::warn!("diff skipped: {err}");
                return Ok(DocumentOutcome::DiffSkipped {
                    reason: err.to_string(),
                });
            }
        };

        let (output, outcome) = match self.highlight_source(&diffed) {
            Ok((highlighted, highlights)) => {
                report.highlights = highlights;
                (highlighted, DocumentOutcome::Complete)
            }
            Err(err) => {
                let err = PipelineError::parse(Stage::Highlight, &diffed, err);
                tracing::warn!("highlight skipped: {err}");
                (
                    diffed,
                    DocumentOutcome::HighlightSkipped {
                        reason: err.to_string(),
                    },
                )
            }
        };
        atomic_write(&document.diff, &output)
            .map_err(PipelineError::io(Stage::WriteDiff, &document.diff))?;

        Ok(outcome)
    }

    /// Process `documents` on up to `jobs` worker threads. Reports come
    /// back in input order.
    pub fn run(&self, documents: &[DocumentPaths], jobs: usize) -> Vec<DocumentReport> {
        if documents.is_empty() {
            return Vec::new();
        }
        let num_jobs = jobs.clamp(1, documents.len());
        let chunk_size = (documents.len() + num_jobs - 1) / num_jobs;

        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for (chunk_idx, chunk) in documents.chunks(chunk_size).enumerate() {
                let tx = tx.clone();
                scope.spawn(move || {
                    for (offset, document) in chunk.iter().enumerate() {
                        let report = self.run_document(document);
                        let _ = tx.send((chunk_idx * chunk_size + offset, report));
                    }
                });
            }
        });
        drop(tx);

        let mut reports: Vec<(usize, DocumentReport)> = rx.into_iter().collect();
        reports.sort_by_key(|(idx, _)| *idx);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}

/// Worker count when none is given.
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ScopeOptions;
    use std::path::Path;
    use tempfile::tempdir;

    struct FailingDiff;

    impl DiffTool for FailingDiff {
        fn name(&self) -> &str {
            "failing"
        }

        fn diff(&self, _: &Path, _: &Path) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Exit {
                program: "failing".to_string(),
                status: "exit status: 2".to_string(),
                stderr: "boom".to_string(),
            })
        }
    }

    struct FixedDiff(&'static str);

    impl DiffTool for FixedDiff {
        fn name(&self) -> &str {
            "fixed"
        }

        fn diff(&self, _: &Path, _: &Path) -> Result<String, CollaboratorError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline() -> Pipeline {
        let mut builder = RuleSet::builder();
        builder
            .add_rule("utilize", "use", ScopeOptions::default(), None)
            .unwrap()
            .add_highlight(
                "very",
                crate::rule::Category::Yellow,
                None,
                ScopeOptions::default(),
            )
            .unwrap();
        let rules = builder.build();
        let mut context = LatexContext::default();
        rules.style().register(&mut context);
        Pipeline::new(rules, context)
    }

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, OutputLayout, Vec<DocumentPaths>) {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("input");
        for (name, content) in files {
            let path = input.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let layout = OutputLayout::resolve(&input, None).unwrap();
        layout.copy_tree().unwrap();
        let docs = layout.discover(|ext| ext == "tex").unwrap();
        (tmp, layout, docs)
    }

    #[test]
    fn runs_every_stage() {
        let (_tmp, _layout, docs) = setup(&[("a.tex", "We utilize very old tools.")]);
        let report = pipeline()
            .with_diff(Box::new(BuiltinDiff))
            .run_document(&docs[0]);
        assert_eq!(report.outcome, DocumentOutcome::Complete);
        assert_eq!(
            fs::read_to_string(&docs[0].edited).unwrap(),
            "We use very old tools."
        );
        let diff = fs::read_to_string(&docs[0].diff).unwrap();
        assert!(diff.contains(r"\colorbox{yellow}{very}"), "{diff}");
        assert_eq!(report.leaves_changed(), 1);
        assert_eq!(report.highlighted(), 1);
    }

    #[test]
    fn diff_failure_keeps_edited_output() {
        let (_tmp, _layout, docs) = setup(&[("a.tex", "We utilize it.")]);
        let report = pipeline()
            .with_diff(Box::new(FailingDiff))
            .run_document(&docs[0]);
        assert!(matches!(report.outcome, DocumentOutcome::DiffSkipped { .. }));
        assert!(report.outcome.is_partial());
        assert_eq!(fs::read_to_string(&docs[0].edited).unwrap(), "We use it.");
        assert!(!docs[0].diff.exists());
    }

    #[test]
    fn unparsable_diff_is_written_raw() {
        let (_tmp, _layout, docs) = setup(&[("a.tex", "very")]);
        let report = pipeline()
            .with_diff(Box::new(FixedDiff("very {broken")))
            .run_document(&docs[0]);
        assert!(matches!(
            report.outcome,
            DocumentOutcome::HighlightSkipped { .. }
        ));
        assert_eq!(fs::read_to_string(&docs[0].diff).unwrap(), "very {broken");
    }

    #[test]
    fn parse_failure_is_attributed_to_the_edit_stage() {
        let (_tmp, _layout, docs) = setup(&[("a.tex", "line\n{open")]);
        let report = pipeline().run_document(&docs[0]);
        match &report.outcome {
            DocumentOutcome::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Edit);
                assert!(reason.contains("2:1"), "{reason}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn pool_keeps_input_order_and_isolates_failures() {
        let files: Vec<(String, String)> = (0..9)
            .map(|i| {
                let body = if i == 4 { "{".to_string() } else { format!("utilize {i}") };
                (format!("doc{i}.tex"), body)
            })
            .collect();
        let borrowed: Vec<(&str, &str)> = files
            .iter()
            .map(|(name, body)| (name.as_str(), body.as_str()))
            .collect();
        let (_tmp, _layout, docs) = setup(&borrowed);

        let reports = pipeline().run(&docs, 4);
        let names: Vec<_> = reports.iter().map(|r| r.relative.clone()).collect();
        let expected: Vec<_> = docs.iter().map(|d| d.relative.clone()).collect();
        assert_eq!(names, expected);

        let summary = Summary::from_reports(&reports);
        assert_eq!(summary.documents, 9);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.edited_only, 8);
        assert_eq!(summary.leaves_changed, 8);
        assert!(summary.has_failures());
        assert_eq!(
            fs::read_to_string(&docs[8].edited).unwrap(),
            "use 8"
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let mut report = DocumentReport::new(PathBuf::from("a.tex"));
        report.outcome = DocumentOutcome::DiffSkipped {
            reason: "boom".to_string(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "diff_skipped");
        assert_eq!(json["reason"], "boom");
        assert_eq!(json["relative"], "a.tex");
    }
}
