mod classify;
mod config;
mod error;
mod mover;
mod output;
mod scanner;
mod types;
mod usage;

use chrono::{DateTime, Utc};
use clap::Parser;
use config::RunConfig;
use error::SweepError;
use log::info;
use mover::{MoveReport, PlannedMove};
use output::{Style, paint};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use types::{ConflictPolicy, Direction};
use usage::{MdlsProvider, UsageMetadataProvider};

const LONG_ABOUT: &str = "Sweeps files under the rug which haven't been used in a while, where \
used is defined by the macOS metadata field kMDItemLastUsedDate. This is *not* the \
filesystem access time. The rug is a directory where you don't have to think about them.";

#[derive(Parser, Debug)]
#[command(version, about, long_about = LONG_ABOUT)]
struct Args {
    /// Directory in which to scan for files which have not been recently used
    #[arg(default_value = ".")]
    input_dir: PathBuf,

    /// Age in days after which a file is considered not recently used
    #[arg(long, short = 'a', default_value_t = 7)]
    age: u32,

    /// Show the age of every file and the planned moves
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Sweep files used more recently than the cutoff age instead
    #[arg(long)]
    newer: bool,

    /// Report what would be swept without moving anything
    #[arg(long, short = 'n')]
    dry_run: bool,

    /// Directory into which files are swept [default: INPUT_DIR/rug]
    #[arg(long, short = 'o', value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Pick a free "name (N).ext" instead of failing when the destination exists
    #[arg(long)]
    rename_conflicts: bool,

    /// Maximum number of metadata queries running at once
    #[arg(long, short = 'j', default_value_t = 4)]
    jobs: usize,

    /// Seconds to wait for a single metadata query
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    query_timeout: u64,

    /// Metadata query tool, run as `<tool> -name <field> <file>`
    #[arg(long, default_value = usage::DEFAULT_TOOL)]
    query_tool: String,

    /// Metadata field holding the last-used date
    #[arg(long, default_value = usage::DEFAULT_FIELD)]
    field: String,
}

#[derive(Debug)]
struct SweepOutcome {
    moves: Vec<PlannedMove>,
    report: Option<MoveReport>,
}

impl SweepOutcome {
    fn failed(&self) -> usize {
        self.report.as_ref().map_or(0, |r| r.failed.len())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            println!("{}", paint(&format!("ERROR: {e}"), Style::Error));
            return ExitCode::from(1);
        }
    };

    let provider = MdlsProvider {
        tool: args.query_tool,
        field: args.field,
        timeout: Duration::from_secs(args.query_timeout),
    };

    let outcome = run(&config, &provider, Utc::now(), &mut io::stdout().lock());
    if outcome.failed() > 0 {
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}

fn resolve_config(args: &Args) -> Result<RunConfig, SweepError> {
    let (input_dir, output_dir) = config::resolve_dirs(&args.input_dir, args.output_dir.as_deref())?;

    Ok(RunConfig {
        input_dir,
        output_dir,
        cutoff_days: i64::from(args.age),
        direction: if args.newer {
            Direction::NewerThan
        } else {
            Direction::OlderThan
        },
        verbose: args.verbose,
        dry_run: args.dry_run,
        conflict_policy: if args.rename_conflicts {
            ConflictPolicy::Rename
        } else {
            ConflictPolicy::Fail
        },
        jobs: args.jobs,
    })
}

/// Lists, classifies and (unless dry-running) moves, reporting to `out`.
/// `now` is captured once by the caller so every file is aged against the
/// same instant.
fn run(
    config: &RunConfig,
    provider: &dyn UsageMetadataProvider,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> SweepOutcome {
    if config.verbose {
        writeln!(
            out,
            "{}",
            paint(
                &format!(
                    "=== Sweeping {} into {} ===",
                    config.input_dir.display(),
                    config.output_dir.display()
                ),
                Style::Heading
            )
        )
        .ok();
    }

    let files = scanner::list_files(&config.input_dir, &config.output_dir);
    info!("Found {} files in {}", files.len(), config.input_dir.display());

    let usage = usage::resolve_all(provider, &files, config.jobs);
    info!(
        "Resolved last-used dates for {} files ({} unknown, {} skipped)",
        usage.len(),
        usage.unknown_count(),
        usage.skipped_count()
    );

    let plan = classify::build_plan(&files, &usage, now, config.cutoff_days, config.direction);
    if config.verbose {
        for evaluated in &plan.evaluated {
            writeln!(out, "{}", output::age_line(evaluated)).ok();
        }
    }

    let moves = mover::plan_moves(&plan, &config.output_dir, config.conflict_policy);
    for planned in &moves {
        if config.verbose {
            writeln!(out, "{}", output::move_line(planned)).ok();
        }
        if config.dry_run && planned.conflicts() {
            writeln!(
                out,
                "{}",
                paint(
                    &format!("WARNING: {} already exists and would not be overwritten", planned.dst.display()),
                    Style::Warning
                )
            )
            .ok();
        }
    }

    let report = if config.dry_run {
        None
    } else {
        let report = mover::execute(&moves);
        for failure in &report.failed {
            writeln!(out, "{}", paint(&format!("ERROR: {failure}"), Style::Error)).ok();
        }
        if !report.failed.is_empty() {
            let summary = format!(
                "{} of {} files could not be swept.",
                report.failed.len(),
                moves.len()
            );
            writeln!(out, "{}", paint(&summary, Style::Error)).ok();
        }
        Some(report)
    };

    if config.verbose && !plan.evaluated.is_empty() {
        writeln!(out, "{}", output::summary_table(&plan, &moves, report.as_ref())).ok();
    }

    if config.dry_run {
        writeln!(
            out,
            "\n{}",
            paint("*** This was a dry run. no files have been harmed. ***", Style::Warning)
        )
        .ok();
    }

    SweepOutcome { moves, report }
}
