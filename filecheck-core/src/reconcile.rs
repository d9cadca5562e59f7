use crate::algorithm::Algorithm;
use crate::cancel::CancelToken;
use crate::digest::DigestEngine;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::progress::{NoProgress, ProgressReporter};
use crate::walk::{self, with_rel_prefix, WalkOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of comparing a manifest with a directory. Paths carry the `./` prefix.
///
/// `correct`, `incorrect` and `missing` partition the manifest's keys;
/// `additional` is the snapshot minus those keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub correct: Vec<String>,
    pub incorrect: Vec<String>,
    pub missing: Vec<String>,
    pub additional: Vec<String>,
}

impl ReconciliationResult {
    /// Nothing changed, disappeared or appeared.
    pub fn is_clean(&self) -> bool {
        self.incorrect.is_empty() && self.missing.is_empty() && self.additional.is_empty()
    }

    pub fn total(&self) -> usize {
        self.correct.len() + self.incorrect.len() + self.missing.len() + self.additional.len()
    }
}

/// Classify manifest entries against a snapshot.
///
/// `current_digest` returns `None` when the path is not on disk, otherwise its current
/// digest. Entries are visited in manifest order; `additional` keeps snapshot
/// order.
pub fn classify<F>(manifest: &Manifest, snapshot: &[String], mut current_digest: F) -> Result<ReconciliationResult>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let mut out = ReconciliationResult::default();
    for entry in manifest.entries() {
        let shown = with_rel_prefix(&entry.rel_path);
        match current_digest(&entry.rel_path)? {
            None => out.missing.push(shown),
            Some(actual) if actual.eq_ignore_ascii_case(&entry.digest) => out.correct.push(shown),
            Some(_) => out.incorrect.push(shown),
        }
    }
    out.additional = snapshot
        .iter()
        .filter(|rel| !manifest.contains(rel))
        .map(|rel| with_rel_prefix(rel))
        .collect();
    Ok(out)
}

#[derive(Clone, Debug, Default)]
pub struct ReconcileConfig {
    /// Overrides the manifest's own algorithm.
    pub algorithm: Option<Algorithm>,
    /// Files left out of the snapshot (the manifest itself).
    pub exclude: Vec<PathBuf>,
}

/// Reconcile `manifest` against `root` with default settings.
pub fn reconcile(manifest: &Manifest, root: &Path) -> Result<ReconciliationResult> {
    reconcile_with(
        manifest,
        root,
        &DigestEngine::default(),
        &ReconcileConfig::default(),
        &NoProgress,
        &CancelToken::new(),
    )
}

pub fn reconcile_with(
    manifest: &Manifest,
    root: &Path,
    engine: &DigestEngine,
    cfg: &ReconcileConfig,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<ReconciliationResult> {
    let algorithm = cfg.algorithm.unwrap_or(manifest.algorithm());
    engine.ensure_supported(algorithm)?;

    let walk_opts =
        WalkOptions { recursive: true, formats: None, exclude: cfg.exclude.clone() };
    let snapshot: Vec<String> = walk::enumerate(root, &walk_opts).map(|w| w.rel_path).collect();
    tracing::debug!(root = %root.display(), files = snapshot.len(), "snapshot taken");

    progress.start(manifest.len());
    let res = classify(manifest, &snapshot, |rel| {
        cancel.check()?;
        let abs = root.join(rel);
        let digest = if abs.is_file() {
            let d = engine.hash(&abs, algorithm)?;
            tracing::debug!(path = rel, digest = %d, "hashed");
            Some(d)
        } else {
            None
        };
        progress.advance(rel);
        Ok(digest)
    });
    progress.finish();
    res
}
