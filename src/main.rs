use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use oxpecker::config::{load_default, load_from_path, Checklist, ConfigError};
use oxpecker::pipeline::{
    default_jobs, BuiltinDiff, DiffTool, DocumentOutcome, DocumentReport, ExternalDiff,
    OutputLayout, Pipeline, Summary,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

const DEFAULT_INPUT: &str = "./input/";

#[derive(Parser)]
#[command(name = "oxpecker")]
#[command(about = "Checklist-driven rewriting of LaTeX prose", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the documents (`./input/` if not specified)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Log rule and stage progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Checklist file (the built-in checklist if not specified)
    #[arg(short, long, global = true)]
    checklist: Option<PathBuf>,

    /// Output root (`output/` beside an `input/` directory, otherwise `<input>_pecked/`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How to produce diff documents
    #[arg(long, value_enum, default_value_t = DiffMode::Latexdiff)]
    diff: DiffMode,

    /// Program used for `--diff latexdiff`
    #[arg(long, value_name = "PROG")]
    diff_command: Option<String>,

    /// Worker threads (available parallelism if not specified)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List compiled rules and highlights in application order
    List,

    /// Validate the checklist without touching any document
    Check,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum DiffMode {
    /// Run an external diff program
    Latexdiff,
    /// In-process word diff
    Builtin,
    /// Edit only, no diff or highlights
    None,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Some(Commands::List) => cmd_list(cli.checklist.as_deref()),
        Some(Commands::Check) => cmd_check(cli.checklist.as_deref()),
        None => cmd_run(&cli),
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn setup_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_checklist(path: Option<&Path>) -> Result<Checklist, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => load_default(),
    }
}

fn report_config_error(err: &ConfigError) {
    eprintln!("{} {}", "✗".red(), err);
}

fn cmd_check(checklist: Option<&Path>) -> Result<()> {
    match load_checklist(checklist) {
        Ok(checklist) => {
            let name = if checklist.meta.name.is_empty() {
                "checklist"
            } else {
                checklist.meta.name.as_str()
            };
            println!(
                "{} {}: {} rules, {} highlights",
                "✓".green(),
                name,
                checklist.rules.rules().len(),
                checklist.rules.highlights().len()
            );
            Ok(())
        }
        Err(e) => {
            report_config_error(&e);
            std::process::exit(1);
        }
    }
}

fn cmd_list(checklist: Option<&Path>) -> Result<()> {
    let checklist = match load_checklist(checklist) {
        Ok(checklist) => checklist,
        Err(e) => {
            report_config_error(&e);
            std::process::exit(1);
        }
    };

    println!("{}", "Rules:".bold());
    for (idx, rule) in checklist.rules.rules().iter().enumerate() {
        println!("  {:>3}. {}", idx + 1, rule.name().bold());
        println!(
            "       {} {} {}",
            format!("/{}/", rule.pattern()).cyan(),
            "→".dimmed(),
            rule.replacement()
        );
    }

    println!();
    println!("{}", "Highlights:".bold());
    for (idx, highlight) in checklist.rules.highlights().iter().enumerate() {
        let note = highlight
            .note()
            .map(|note| format!(" ({note})"))
            .unwrap_or_default();
        println!(
            "  {:>3}. [{}] {}{}",
            idx + 1,
            highlight.category().as_str().yellow(),
            format!("/{}/", highlight.rule().pattern()).cyan(),
            note.dimmed()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct RunReport<'a> {
    input: &'a Path,
    output: &'a Path,
    summary: &'a Summary,
    documents: &'a [DocumentReport],
}

fn diff_tool(cli: &Cli) -> Option<Box<dyn DiffTool>> {
    match cli.diff {
        DiffMode::Latexdiff => {
            let program = cli.diff_command.as_deref().unwrap_or("latexdiff");
            Some(Box::new(ExternalDiff::new(program)))
        }
        DiffMode::Builtin => Some(Box::new(BuiltinDiff)),
        DiffMode::None => None,
    }
}

fn cmd_run(cli: &Cli) -> Result<()> {
    // 1. The input must exist before anything else happens
    let input = match &cli.path {
        Some(path) => path.clone(),
        None => {
            tracing::info!("No input path specified, using directory '{DEFAULT_INPUT}'");
            PathBuf::from(DEFAULT_INPUT)
        }
    };
    if !input.exists() {
        eprintln!(
            "{} Input path does not exist: {}",
            "✗".red(),
            input.display()
        );
        std::process::exit(1);
    }

    // 2. Checklist and output layout
    let checklist = match load_checklist(cli.checklist.as_deref()) {
        Ok(checklist) => checklist,
        Err(e) => {
            report_config_error(&e);
            std::process::exit(1);
        }
    };
    let layout = OutputLayout::resolve(&input, cli.output.as_deref())?;
    layout.copy_tree()?;
    let documents = layout.discover(|ext| checklist.is_document_extension(ext))?;

    if !cli.json {
        println!("Input: {}", layout.input_root.display());
        println!("Output: {}", layout.output_root.display());
        println!(
            "Checklist: {} rules, {} highlights",
            checklist.rules.rules().len(),
            checklist.rules.highlights().len()
        );
        println!();
    }
    if documents.is_empty() {
        tracing::warn!("no documents found under {}", layout.input_root.display());
    }

    // 3. Run the pipeline over every document
    let mut pipeline = Pipeline::from_checklist(checklist);
    if let Some(tool) = diff_tool(cli) {
        pipeline = pipeline.with_diff(tool);
    }
    let jobs = cli.jobs.unwrap_or_else(default_jobs);
    let reports = pipeline.run(&documents, jobs);
    let summary = Summary::from_reports(&reports);

    // 4. Report
    if cli.json {
        let report = RunReport {
            input: &layout.input_root,
            output: &layout.output_root,
            summary: &summary,
            documents: &reports,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for report in &reports {
            print_document(report);
        }
        print_summary(&summary);
    }

    if summary.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_document(report: &DocumentReport) {
    let name = report.relative.display();
    let edits = report.leaves_changed();
    match &report.outcome {
        DocumentOutcome::Complete => println!(
            "{} {}: {} edits, {} highlights",
            "✓".green(),
            name,
            edits,
            report.highlighted()
        ),
        DocumentOutcome::EditedOnly => println!("{} {}: {} edits", "✓".green(), name, edits),
        DocumentOutcome::DiffSkipped { reason } => {
            println!("{} {}: {} edits, diff skipped", "⊘".cyan(), name, edits);
            println!("  {}", reason.dimmed());
        }
        DocumentOutcome::HighlightSkipped { reason } => {
            println!(
                "{} {}: {} edits, highlights skipped",
                "⊙".yellow(),
                name,
                edits
            );
            println!("  {}", reason.dimmed());
        }
        DocumentOutcome::Failed { reason, .. } => {
            eprintln!("{} {}: Failed - {}", "✗".red(), name, reason);
        }
    }

    for rule in report.rules.iter().chain(&report.highlights) {
        for skipped in &rule.skipped {
            println!(
                "  {} {}: skipped edit at byte {} ({})",
                "⊘".cyan(),
                rule.rule,
                skipped.offset,
                skipped.reason
            );
        }
    }
}

fn print_summary(summary: &Summary) {
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} documents", summary.documents);
    println!(
        "  {} complete",
        format!("{}", summary.complete + summary.edited_only).green()
    );
    println!("  {} partial", format!("{}", summary.partial).yellow());
    println!("  {} failed", format!("{}", summary.failed).red());
    println!(
        "  {} edits, {} highlights, {} skipped edits",
        summary.leaves_changed, summary.highlighted, summary.skipped_edits
    );
}
