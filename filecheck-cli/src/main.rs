use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use filecheck_core::cancel::CancelToken;
use filecheck_core::digest::DigestEngine;
use filecheck_core::ops::{self, CreateOptions, ValidateOptions};
use filecheck_core::progress::{NoProgress, Progress, ProgressReporter};
use filecheck_core::{Algorithm, ErrorKind};

mod report;

const LOG_ENV: &str = "FILECHECKER_LOG";

#[derive(Parser)]
#[command(name = "filechecker", version, about = "Checksum creator/validator")]
struct Cli {
    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Write a manifest of digests for the files under DIR
    Create {
        dir: PathBuf,
        #[arg(short, long, default_value = "md5", value_parser = parse_algorithm)]
        algorithm: Algorithm,
        /// Recurse into sub-folders
        #[arg(short, long, default_value_t = false)]
        recursive: bool,
        /// Only include files with this extension (repeatable)
        #[arg(short, long = "format")]
        formats: Vec<String>,
        /// Manifest path (default: DIR/manifest.<algorithm>)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        progress: bool,
    },
    /// Check DIR against a manifest and report correct/incorrect/missing/additional files
    Validate {
        dir: PathBuf,
        /// Override the algorithm inferred from the manifest extension
        #[arg(short, long, value_parser = parse_algorithm)]
        algorithm: Option<Algorithm>,
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Write correct.txt, incorrect.txt, missing.txt, additional.txt here
        #[arg(long)]
        report_dir: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        #[arg(long, default_value_t = false)]
        progress: bool,
    },
}

fn parse_algorithm(s: &str) -> std::result::Result<Algorithm, String> {
    s.parse::<Algorithm>().map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(cmd) = cli.cmd else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    match run(cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 2 configuration, 3 parse, 4 file access, 130 cancelled, 1 anything else.
fn exit_code(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<filecheck_core::Error>().map(|e| e.kind()) {
        Some(ErrorKind::Configuration) => 2,
        Some(ErrorKind::Parse) => 3,
        Some(ErrorKind::FileAccess) => 4,
        Some(ErrorKind::Cancelled) => 130,
        None => 1,
    }
}

fn run(cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Create { dir, algorithm, recursive, formats, manifest, progress } => {
            create(&dir, algorithm, recursive, formats, manifest, progress)
        }
        Cmd::Validate { dir, algorithm, manifest, report_dir, json, progress } => {
            validate(&dir, algorithm, manifest, report_dir.as_deref(), json, progress)
        }
    }
}

fn reporter(enabled: bool, stage: &str) -> Box<dyn ProgressReporter> {
    if enabled {
        Box::new(Progress::new(stage))
    } else {
        Box::new(NoProgress)
    }
}

fn create(
    dir: &Path,
    algorithm: Algorithm,
    recursive: bool,
    formats: Vec<String>,
    manifest: Option<PathBuf>,
    show_progress: bool,
) -> Result<()> {
    ensure_dir(dir)?;
    let opts = CreateOptions {
        root: dir.to_path_buf(),
        algorithm,
        recursive,
        formats: if formats.is_empty() { None } else { Some(formats) },
        manifest,
    };
    let prog = reporter(show_progress, "Hashing");
    let summary = ops::create(&opts, &DigestEngine::default(), prog.as_ref(), &CancelToken::new())?;
    eprintln!(
        "Wrote {} {} entr{} to {}",
        summary.entries,
        summary.algorithm,
        if summary.entries == 1 { "y" } else { "ies" },
        summary.manifest.display()
    );
    Ok(())
}

fn validate(
    dir: &Path,
    algorithm: Option<Algorithm>,
    manifest: Option<PathBuf>,
    report_dir: Option<&Path>,
    json: bool,
    show_progress: bool,
) -> Result<()> {
    ensure_dir(dir)?;
    let exclude = report_dir.map(report::list_paths).unwrap_or_default();
    let opts = ValidateOptions { root: dir.to_path_buf(), algorithm, manifest, exclude };
    let prog = reporter(show_progress, "Validating");
    let outcome =
        ops::validate(&opts, &DigestEngine::default(), prog.as_ref(), &CancelToken::new())?;

    if let Some(out) = report_dir {
        report::write_lists(out, &outcome.result)
            .with_context(|| format!("write report to {}", out.display()))?;
    }
    if json {
        report::print_json(&outcome)?;
    } else {
        report::print_summary(&outcome);
    }
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    let md = std::fs::metadata(dir)
        .map_err(|e| filecheck_core::Error::file_access(dir, e))
        .with_context(|| format!("stat {}", dir.display()))?;
    if !md.is_dir() {
        let e = std::io::Error::new(std::io::ErrorKind::Other, "not a directory");
        return Err(filecheck_core::Error::file_access(dir, e).into());
    }
    Ok(())
}
