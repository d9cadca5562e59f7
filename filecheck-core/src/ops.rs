use crate::algorithm::Algorithm;
use crate::cancel::CancelToken;
use crate::digest::DigestEngine;
use crate::error::Result;
use crate::manifest::{self, ManifestWriter};
use crate::progress::ProgressReporter;
use crate::reconcile::{self, ReconcileConfig, ReconciliationResult};
use crate::walk::{self, WalkOptions};
use std::path::PathBuf;

pub struct CreateOptions {
    pub root: PathBuf,
    pub algorithm: Algorithm,
    pub recursive: bool,
    pub formats: Option<Vec<String>>,
    /// Defaults to `<root>/manifest.<algorithm>`.
    pub manifest: Option<PathBuf>,
}

impl CreateOptions {
    pub fn new(root: impl Into<PathBuf>, algorithm: Algorithm) -> Self {
        Self { root: root.into(), algorithm, recursive: false, formats: None, manifest: None }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| manifest::default_manifest_path(&self.root, self.algorithm))
    }
}

#[derive(Clone, Debug)]
pub struct CreateSummary {
    pub manifest: PathBuf,
    pub algorithm: Algorithm,
    pub entries: usize,
}

/// Hash every enumerated file under the root into a fresh manifest.
///
/// Entries are flushed one by one; on error or cancellation the manifest holds
/// the entries written so far.
pub fn create(
    opts: &CreateOptions,
    engine: &DigestEngine,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<CreateSummary> {
    engine.ensure_supported(opts.algorithm)?;
    let manifest_path = opts.manifest_path();
    let walk_opts = WalkOptions {
        recursive: opts.recursive,
        formats: opts.formats.clone(),
        exclude: vec![manifest_path.clone()],
    };
    let files: Vec<walk::WalkedFile> = walk::enumerate(&opts.root, &walk_opts).collect();

    let mut writer = ManifestWriter::create(&manifest_path)?;
    progress.start(files.len());
    for wf in &files {
        if let Err(e) = cancel.check() {
            progress.finish();
            tracing::warn!(written = writer.written(), "create cancelled");
            return Err(e);
        }
        let digest = match engine.hash(&wf.abs_path, opts.algorithm) {
            Ok(d) => d,
            Err(e) => {
                progress.finish();
                return Err(e);
            }
        };
        writer.append(&digest, &wf.rel_path)?;
        tracing::debug!(path = %wf.rel_path, %digest, "hashed");
        progress.advance(&wf.rel_path);
    }
    progress.finish();
    let entries = writer.finish()?;
    tracing::info!(manifest = %manifest_path.display(), entries, algorithm = %opts.algorithm, "manifest written");
    Ok(CreateSummary { manifest: manifest_path, algorithm: opts.algorithm, entries })
}

pub struct ValidateOptions {
    pub root: PathBuf,
    /// Overrides the algorithm inferred from the manifest extension.
    pub algorithm: Option<Algorithm>,
    pub manifest: Option<PathBuf>,
    /// Extra files left out of the snapshot, e.g. report output under the root.
    /// The manifest itself is always excluded.
    pub exclude: Vec<PathBuf>,
}

impl ValidateOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), algorithm: None, manifest: None, exclude: Vec::new() }
    }

    /// Manifest location plus the algorithm to read it with.
    ///
    /// Explicit path wins; otherwise `<root>/manifest.<algorithm>` when an
    /// algorithm is given; otherwise the single `manifest.*` under the root.
    pub fn resolve(&self) -> Result<(PathBuf, Algorithm)> {
        match (&self.manifest, self.algorithm) {
            (Some(p), alg) => Ok((p.clone(), manifest::resolve_algorithm(p, alg)?)),
            (None, Some(alg)) => Ok((manifest::default_manifest_path(&self.root, alg), alg)),
            (None, None) => manifest::discover(&self.root),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValidateOutcome {
    pub manifest: PathBuf,
    pub algorithm: Algorithm,
    pub result: ReconciliationResult,
}

/// Read the manifest and reconcile it against a recursive snapshot of the root.
pub fn validate(
    opts: &ValidateOptions,
    engine: &DigestEngine,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<ValidateOutcome> {
    let (manifest_path, algorithm) = opts.resolve()?;
    engine.ensure_supported(algorithm)?;
    let mf = manifest::read_manifest(&manifest_path, Some(algorithm))?;
    let mut exclude = opts.exclude.clone();
    exclude.push(manifest_path.clone());
    let cfg = ReconcileConfig { algorithm: Some(algorithm), exclude };
    let result = reconcile::reconcile_with(&mf, &opts.root, engine, &cfg, progress, cancel)?;
    tracing::info!(
        manifest = %manifest_path.display(),
        correct = result.correct.len(),
        incorrect = result.incorrect.len(),
        missing = result.missing.len(),
        additional = result.additional.len(),
        "validation finished"
    );
    Ok(ValidateOutcome { manifest: manifest_path, algorithm, result })
}
