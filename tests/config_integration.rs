//! Integration tests for checklist loading and compilation

use oxpecker::config::{load_default, load_from_path, load_from_str, ConfigError};
use oxpecker::Pipeline;
use std::fs;
use tempfile::TempDir;

fn edit(pipeline: &Pipeline, source: &str) -> String {
    pipeline.edit_source(source).unwrap().0
}

#[test]
fn test_default_checklist_rewrites_prose() {
    let pipeline = Pipeline::from_checklist(load_default().unwrap());

    assert_eq!(
        edit(&pipeline, "It follows that the result holds."),
        "The result holds."
    );
    assert_eq!(
        edit(&pipeline, "We utilize it. Utilizing tools helps."),
        "We use it. Using tools helps."
    );
    assert_eq!(
        edit(
            &pipeline,
            "In order to succeed, a large number of tests ran  twice."
        ),
        "To succeed, many tests ran twice."
    );
    assert_eq!(
        edit(&pipeline, "Due to the fact that it rained."),
        "Because it rained."
    );
}

#[test]
fn test_default_checklist_leaves_markup_alone() {
    let pipeline = Pipeline::from_checklist(load_default().unwrap());
    let source = "\\label{in order to} $a  b$ \\cite{utilize} % utilize\n";
    assert_eq!(edit(&pipeline, source), source);
}

#[test]
fn test_default_highlights_leave_markup_alone() {
    let pipeline = Pipeline::from_checklist(load_default().unwrap());
    let source = "See \\label{fig:some-plot} and \\cite{very} or \\ref{sec:clearly}. \
                  $x_{very}$ \\begin{equation}some\\end{equation} \
                  \\url{http://very.example} \\includegraphics{plots/some}\n";
    let (out, reports) = pipeline.highlight_source(source).unwrap();
    assert_eq!(out, source);
    assert!(reports.iter().all(|r| r.matches == 0));

    let (out, _) = pipeline
        .highlight_source("\\emph{very} \\textbf{clearly} \\footnote{very}")
        .unwrap();
    assert!(out.starts_with("\\emph{\\colorbox{yellow}{very}\\marginpar{"), "{out}");
    assert!(out.contains("\\textbf{\\colorbox{orange}{clearly}"), "{out}");
    assert!(out.ends_with("\\footnote{very}"), "{out}");
}

#[test]
fn test_default_checklist_highlights() {
    let pipeline = Pipeline::from_checklist(load_default().unwrap());
    let (out, reports) = pipeline
        .highlight_source("This is very clearly true.")
        .unwrap();
    assert_eq!(
        out,
        "This is \\colorbox{yellow}{very}\\marginpar{Intensifier: cut or be specific} \
         \\colorbox{orange}{clearly}\\marginpar{Is it? Show it} true."
    );
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].matches, 1);
    assert_eq!(reports[1].matches, 1);
    assert_eq!(reports[2].matches, 0);
}

#[test]
fn test_custom_checklist_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checklist.toml");
    fs::write(
        &path,
        r#"
[meta]
name = "custom"

[[macros]]
name = "\\keyword"
args = "{"

[[environments]]
name = "code"
body = "verbatim"

[[rules]]
pattern = "colour"
replace = "color"

[[rules]]
name = "abstract only"
pattern = '\bwe\b'
replace = "the authors"
environments = ["abstract"]
"#,
    )
    .unwrap();

    let checklist = load_from_path(&path).unwrap();
    assert_eq!(checklist.meta.name, "custom");
    assert!(checklist.rules.highlights().is_empty());

    let pipeline = Pipeline::from_checklist(checklist);
    assert_eq!(
        edit(
            &pipeline,
            r"\keyword{colour} colour \begin{code}colour{\end{code} we \begin{abstract}we\end{abstract}"
        ),
        r"\keyword{colour} color \begin{code}colour{\end{code} we \begin{abstract}the authors\end{abstract}"
    );
}

#[test]
fn test_every_issue_is_reported_with_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(
        &path,
        r#"
[[rules]]
name = "unclosed"
pattern = "(oops"

[[rules]]
name = "bad group"
pattern = "a(b)"
replace = '\2'

[[highlights]]
pattern = "very"
category = "magneta"
"#,
    )
    .unwrap();

    let err = load_from_path(&path).unwrap_err();
    let issues = &err.validation().unwrap().issues;
    assert_eq!(issues.len(), 3, "{err}");

    let message = err.to_string();
    assert!(message.contains("broken.toml"));
    assert!(message.contains("unclosed"));
    assert!(message.contains("did you mean 'magenta'"));
}

#[test]
fn test_toml_errors_and_missing_files() {
    assert!(matches!(
        load_from_str("[[rules]\npattern = 'x'"),
        Err(ConfigError::Toml { .. })
    ));
    assert!(matches!(
        load_from_path("/definitely/not/here.toml"),
        Err(ConfigError::Io { .. })
    ));
}
