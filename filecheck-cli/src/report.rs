use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use filecheck_core::ops::ValidateOutcome;
use filecheck_core::reconcile::ReconciliationResult;
use filecheck_core::Algorithm;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_utc: String,
    manifest: String,
    algorithm: Algorithm,
    clean: bool,
    #[serde(flatten)]
    result: &'a ReconciliationResult,
}

pub const LIST_NAMES: [&str; 4] = ["correct.txt", "incorrect.txt", "missing.txt", "additional.txt"];

/// Where [`write_lists`] puts its files; validation leaves these out of the snapshot.
pub fn list_paths(out_dir: &Path) -> Vec<PathBuf> {
    LIST_NAMES.iter().map(|n| out_dir.join(n)).collect()
}

/// One file per category, one path per line.
pub fn write_lists(out_dir: &Path, res: &ReconciliationResult) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;
    let lists: [&Vec<String>; 4] = [&res.correct, &res.incorrect, &res.missing, &res.additional];
    for (name, paths) in LIST_NAMES.into_iter().zip(lists) {
        let p = out_dir.join(name);
        let mut w = BufWriter::new(File::create(&p).with_context(|| format!("create {}", p.display()))?);
        for path in paths {
            writeln!(w, "{path}")?;
        }
        w.flush()?;
    }
    Ok(())
}

pub fn print_json(outcome: &ValidateOutcome) -> Result<()> {
    let report = JsonReport {
        generated_utc: chrono::Utc::now().to_rfc3339(),
        manifest: outcome.manifest.to_string_lossy().to_string(),
        algorithm: outcome.algorithm,
        clean: outcome.result.is_clean(),
        result: &outcome.result,
    };
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer_pretty(&mut lock, &report)?;
    writeln!(lock)?;
    Ok(())
}

pub fn print_summary(outcome: &ValidateOutcome) {
    let r = &outcome.result;
    println!("Manifest: {} ({})", outcome.manifest.display(), outcome.algorithm);
    println!("Correct: {}", r.correct.len());
    println!("Incorrect: {}", r.incorrect.len());
    for p in &r.incorrect {
        println!("  {p}");
    }
    println!("Missing: {}", r.missing.len());
    for p in &r.missing {
        println!("  {p}");
    }
    println!("Additional: {}", r.additional.len());
    for p in &r.additional {
        println!("  {p}");
    }
    println!("{}", if r.is_clean() { "OK" } else { "CHANGED" });
}
