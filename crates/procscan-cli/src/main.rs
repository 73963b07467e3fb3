//! psc - find, classify and extract procedures in reStructuredText sources
//!
//! Usage:
//!   psc [OPTIONS] <COMMAND> <FILE>
//!
//! Commands:
//!   analyze   Group procedures by heading and report their variations
//!   extract   Write one file per distinct procedure
//!   validate  Report structural and include problems

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use procscan_core::{
    render_procedure, AnalysisEntry, Category, Diagnostic, Diagnostics, ExtractionUnit, FileReader,
    ParseOptions, ParseOutcome, Procedure, ProcedureParser, ReadError, SourceRootResolver,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent.
const CONFIG_FILE: &str = "procscan.toml";

#[derive(Debug, Parser)]
#[command(name = "psc", version, about = "Find and classify procedures in reStructuredText sources")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to a procscan.toml config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory that `/`-rooted include targets resolve against
    #[arg(long, global = true, value_name = "DIR")]
    source_root: Option<PathBuf>,

    /// Leave include directives unexpanded
    #[arg(long, global = true)]
    no_includes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Group procedures by heading and report their variations
    Analyze { file: PathBuf },
    /// Write one .rst file per distinct procedure
    Extract {
        file: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Only extract procedures that apply to this variation label
        #[arg(long)]
        selection: Option<String>,
        /// Print what would be written without writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Report structural and include problems
    Validate { file: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .init();

    debug!("psc started with verbosity level: {}", verbose);
}

fn run(cli: &Cli) -> Result<()> {
    let config = FileConfig::load(cli.config.as_deref())?;
    let session = Session::new(cli, config);

    match &cli.command {
        Command::Analyze { file } => cmd_analyze(&session, file, cli.json),
        Command::Extract {
            file,
            output,
            selection,
            dry_run,
        } => cmd_extract(&session, file, output, selection.as_deref(), *dry_run, cli.json),
        Command::Validate { file } => cmd_validate(&session, file, cli.json),
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Settings read from `procscan.toml`. Command-line flags win.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    source_root: Option<PathBuf>,
    expand_includes: Option<bool>,
    max_include_depth: Option<usize>,
    fail_on_cycle: Option<bool>,
    generic_headings: Option<Vec<String>>,
}

impl FileConfig {
    fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("invalid config '{}'", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn parse_options(&self, no_includes: bool) -> ParseOptions {
        let mut options = ParseOptions::default();
        if let Some(expand) = self.expand_includes {
            options = options.with_includes(expand);
        }
        if no_includes {
            options = options.with_includes(false);
        }
        if let Some(depth) = self.max_include_depth {
            options = options.with_max_include_depth(depth);
        }
        if let Some(fail) = self.fail_on_cycle {
            options = options.with_fail_on_cycle(fail);
        }
        if let Some(headings) = &self.generic_headings {
            options = options.with_generic_headings(headings.iter().cloned());
        }
        options
    }
}

/// Reads include targets from disk.
struct FsReader;

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> Result<String, ReadError> {
        trace!(path = %path.display(), "reading");
        fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ReadError::NotFound(path.to_path_buf()),
            _ => ReadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })
    }
}

struct Session {
    parser: ProcedureParser,
    source_root: Option<PathBuf>,
}

impl Session {
    fn new(cli: &Cli, config: FileConfig) -> Self {
        let parser = ProcedureParser::new(config.parse_options(cli.no_includes));
        Self {
            parser,
            source_root: cli.source_root.clone().or(config.source_root),
        }
    }

    fn parse(&self, file: &Path) -> Result<ParseOutcome> {
        let text = fs::read_to_string(file)
            .with_context(|| format!("failed to read '{}'", file.display()))?;
        let resolver = match &self.source_root {
            Some(root) => SourceRootResolver::new(root),
            None => SourceRootResolver::discover(file),
        };
        debug!(file = %file.display(), root = %resolver.root().display(), "parsing");

        let outcome = self
            .parser
            .parse(file, &text, &resolver, &FsReader)
            .with_context(|| format!("failed to parse '{}'", file.display()))?;

        for diagnostic in outcome.diagnostics.iter() {
            warn!(category = ?diagnostic.category(), "{}", diagnostic);
        }
        info!(
            file = %file.display(),
            procedures = outcome.procedures.len(),
            diagnostics = outcome.diagnostics.len(),
            policy = ?outcome.policy,
            promoted = outcome.promoted,
            "parsed"
        );
        Ok(outcome)
    }
}

// =============================================================================
// Analyze Command
// =============================================================================

fn cmd_analyze(session: &Session, file: &Path, json: bool) -> Result<()> {
    let outcome = session.parse(file)?;
    let analysis = outcome.procedures.analysis();

    if json {
        let report = JsonAnalysis {
            file,
            total: analysis.total_appearances(),
            unique: outcome.procedures.extraction().len(),
            entries: &analysis.entries,
            diagnostics: &outcome.diagnostics,
        };
        print_json(&report)?;
        return Ok(());
    }

    println!("{}", file.display());
    println!(
        "  {} procedure(s), {} unique, under {} heading(s)",
        analysis.total_appearances(),
        outcome.procedures.extraction().len(),
        analysis.len()
    );
    for entry in analysis.iter() {
        print_entry(entry, &outcome);
    }
    Ok(())
}

fn print_entry(entry: &AnalysisEntry<'_>, outcome: &ParseOutcome) {
    println!();
    println!("{}", display_heading(entry.heading));
    println!(
        "  appearances: {}, distinct: {}, max depth: {}",
        entry.appearances, entry.distinct, entry.max_depth
    );
    if !entry.labels.is_empty() {
        println!("  variations: {}", entry.labels.join(", "));
    }
    for &id in &entry.procedures {
        if let Some(procedure) = outcome.procedures.get(id) {
            println!("  - {}", describe_procedure(procedure));
        }
    }
}

fn describe_procedure(procedure: &Procedure) -> String {
    let mut parts = vec![
        procedure.format.as_str().to_string(),
        format!("{} step(s)", procedure.steps.len()),
        procedure.span.to_string(),
    ];
    if let Some(tab) = &procedure.tab_id {
        parts.push(format!("tab {}", tab));
    }
    if procedure.has_sub_steps {
        parts.push("sub-steps".to_string());
    }
    parts.push(procedure.hash.short().to_string());
    parts.join(", ")
}

fn display_heading(heading: &str) -> &str {
    if heading.is_empty() {
        "(Untitled)"
    } else {
        heading
    }
}

// =============================================================================
// Extract Command
// =============================================================================

fn cmd_extract(
    session: &Session,
    file: &Path,
    output: &Path,
    selection: Option<&str>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let outcome = session.parse(file)?;
    let mut view = outcome.procedures.extraction();
    if let Some(label) = selection {
        view = view.filter_selection(label);
    }

    let fallback = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "procedure".to_string());

    if !dry_run && !view.is_empty() {
        fs::create_dir_all(output)
            .with_context(|| format!("failed to create '{}'", output.display()))?;
    }

    let mut written = Vec::with_capacity(view.len());
    for unit in view.iter() {
        let Some(procedure) = outcome.procedures.get(unit.procedure) else {
            continue;
        };
        let path = output.join(format!("{}.rst", unit.file_stem(&fallback)));
        let label = selection.and_then(|s| unit.matching_label(s));
        let text = render_unit(unit, procedure, label);

        if dry_run {
            debug!(path = %path.display(), "dry run, not writing");
        } else {
            fs::write(&path, text)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            info!(path = %path.display(), "wrote procedure");
        }
        written.push(JsonExtracted {
            path,
            heading: unit.heading,
            hash: unit.hash.as_str(),
            steps: unit.steps.len(),
            labels: &unit.labels,
        });
    }

    if json {
        print_json(&JsonExtraction {
            file,
            dry_run,
            outputs: &written,
        })?;
    } else {
        let verb = if dry_run { "Would write" } else { "Wrote" };
        for entry in &written {
            println!("{} {}", verb, entry.path.display());
        }
        println!("{} procedure file(s)", written.len());
    }
    Ok(())
}

fn render_unit(unit: &ExtractionUnit<'_>, procedure: &Procedure, label: Option<&str>) -> String {
    let title = display_heading(unit.heading);
    format!(
        "{}\n{}\n\n{}\n",
        title,
        "=".repeat(title.chars().count()),
        render_procedure(procedure, label)
    )
}

// =============================================================================
// Validate Command
// =============================================================================

fn cmd_validate(session: &Session, file: &Path, json: bool) -> Result<()> {
    let outcome = session.parse(file)?;
    let diagnostics = &outcome.diagnostics;

    if json {
        print_json(&JsonValidation {
            file,
            valid: diagnostics.is_empty(),
            diagnostics,
        })?;
    } else if diagnostics.is_empty() {
        println!("Valid: no problems found");
    } else {
        eprintln!(
            "Invalid: {} problem(s) found ({} structural, {} resolution)",
            diagnostics.len(),
            diagnostics.of_category(Category::Structural).count(),
            diagnostics.of_category(Category::Resolution).count()
        );
        for diagnostic in diagnostics.iter() {
            eprintln!("  - {}", describe_diagnostic(diagnostic));
        }
    }

    if !diagnostics.is_empty() {
        bail!("{} problem(s) found", diagnostics.len());
    }
    Ok(())
}

fn describe_diagnostic(diagnostic: &Diagnostic) -> String {
    format!("[{:?}] {}", diagnostic.category(), diagnostic)
}

// =============================================================================
// JSON Output
// =============================================================================

#[derive(Serialize)]
struct JsonAnalysis<'a> {
    file: &'a Path,
    total: usize,
    unique: usize,
    entries: &'a [AnalysisEntry<'a>],
    diagnostics: &'a Diagnostics,
}

#[derive(Serialize)]
struct JsonExtracted<'a> {
    path: PathBuf,
    heading: &'a str,
    hash: &'a str,
    steps: usize,
    labels: &'a [&'a str],
}

#[derive(Serialize)]
struct JsonExtraction<'a> {
    file: &'a Path,
    dry_run: bool,
    outputs: &'a [JsonExtracted<'a>],
}

#[derive(Serialize)]
struct JsonValidation<'a> {
    file: &'a Path,
    valid: bool,
    diagnostics: &'a Diagnostics,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
