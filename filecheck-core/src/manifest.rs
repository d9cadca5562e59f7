//! Manifest text format.
//!
//! One entry per line: `<lowercase-hex-digest> *./<relative-path>\n`. The
//! digest algorithm is not recorded inside the file; it is carried by the
//! file extension (`manifest.sha256`) or supplied by the caller.

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::path_safety;
use crate::walk::{strip_rel_prefix, with_rel_prefix};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the manifest root, without the `./` prefix.
    pub rel_path: String,
    pub digest: String,
}

/// In-memory manifest: path -> digest mapping with one algorithm.
///
/// Keys keep the order in which they were first inserted; inserting an
/// existing key replaces its digest in place.
#[derive(Clone, Debug)]
pub struct Manifest {
    algorithm: Algorithm,
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm, entries: Vec::new(), index: HashMap::new() }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Insert or overwrite. Returns the digest previously stored for the path.
    pub fn insert(&mut self, rel_path: &str, digest: &str) -> Option<String> {
        let key = strip_rel_prefix(rel_path).to_string();
        let digest = digest.to_ascii_lowercase();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].digest, digest)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(ManifestEntry { rel_path: key, digest });
                None
            }
        }
    }

    pub fn get(&self, rel_path: &str) -> Option<&str> {
        self.index
            .get(strip_rel_prefix(rel_path))
            .map(|&i| self.entries[i].digest.as_str())
    }

    pub fn contains(&self, rel_path: &str) -> bool {
        self.index.contains_key(strip_rel_prefix(rel_path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries.iter().map(|e| (e.rel_path.clone(), e.digest.clone())).collect()
    }
}

/// `<root>/manifest.<algorithm>`.
pub fn default_manifest_path(root: &Path, algorithm: Algorithm) -> PathBuf {
    root.join(algorithm.manifest_file_name())
}

pub fn format_line(digest: &str, rel_path: &str) -> String {
    format!("{} *{}\n", digest.to_ascii_lowercase(), with_rel_prefix(rel_path))
}

/// Split one manifest line (terminator already removed) into digest and bare path.
pub fn parse_line(line: &str) -> std::result::Result<(String, String), String> {
    let (digest, rest) = line.split_once(' ').ok_or("expected '<digest> *<path>'")?;
    if digest.is_empty() {
        return Err("empty digest".into());
    }
    let rest = rest.strip_prefix('*').ok_or("missing '*' before path")?;
    let rel = strip_rel_prefix(rest);
    if rel.is_empty() {
        return Err("empty path".into());
    }
    path_safety::validate_rel(rel)?;
    Ok((digest.to_ascii_lowercase(), rel.to_string()))
}

/// Algorithm for a manifest: the override, else the file extension.
pub fn resolve_algorithm(path: &Path, algorithm: Option<Algorithm>) -> Result<Algorithm> {
    if let Some(a) = algorithm {
        return Ok(a);
    }
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.parse(),
        _ => Err(Error::config(format!(
            "cannot infer algorithm from {}: no file extension",
            path.display()
        ))),
    }
}

/// Find the single `manifest.<alg>` file directly under `root`.
pub fn discover(root: &Path) -> Result<(PathBuf, Algorithm)> {
    let found: Vec<(PathBuf, Algorithm)> = Algorithm::ALL
        .iter()
        .map(|&a| (default_manifest_path(root, a), a))
        .filter(|(p, _)| p.is_file())
        .collect();
    match found.as_slice() {
        [one] => Ok(one.clone()),
        [] => Err(Error::config(format!(
            "no manifest.<algorithm> file in {}; pass --manifest or --algorithm",
            root.display()
        ))),
        _ => {
            let names: Vec<String> = found
                .iter()
                .map(|(p, _)| p.file_name().unwrap_or_default().to_string_lossy().to_string())
                .collect();
            Err(Error::config(format!(
                "several manifests in {} ({}); pass --manifest or --algorithm",
                root.display(),
                names.join(", ")
            )))
        }
    }
}

/// Parse a manifest file. Any malformed line rejects the whole file.
pub fn read_manifest(path: &Path, algorithm: Option<Algorithm>) -> Result<Manifest> {
    let algorithm = resolve_algorithm(path, algorithm)?;
    let f = File::open(path).map_err(|e| Error::file_access(path, e))?;
    let mut reader = BufReader::new(f);
    let mut manifest = Manifest::new(algorithm);
    let mut raw = Vec::new();
    let mut line_no = 0usize;
    loop {
        raw.clear();
        let n = reader.read_until(b'\n', &mut raw).map_err(|e| Error::file_access(path, e))?;
        if n == 0 {
            break;
        }
        line_no += 1;
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        let line = std::str::from_utf8(&raw)
            .map_err(|_| Error::parse(path, line_no, "invalid UTF-8"))?;
        let (digest, rel) = parse_line(line).map_err(|m| Error::parse(path, line_no, m))?;
        if manifest.insert(&rel, &digest).is_some() {
            tracing::debug!(line = line_no, path = %rel, "duplicate manifest entry overrides earlier one");
        }
    }
    tracing::debug!(manifest = %path.display(), entries = manifest.len(), %algorithm, "read manifest");
    Ok(manifest)
}

/// Appends entries to a freshly truncated manifest, flushing after each line
/// so an interrupted run leaves a valid prefix.
pub struct ManifestWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: usize,
}

impl ManifestWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let f = File::create(path).map_err(|e| Error::file_access(path, e))?;
        Ok(Self { path: path.to_path_buf(), out: BufWriter::new(f), written: 0 })
    }

    pub fn append(&mut self, digest: &str, rel_path: &str) -> Result<()> {
        let line = format_line(digest, rel_path);
        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| Error::file_access(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out.flush().map_err(|e| Error::file_access(&self.path, e))?;
        Ok(self.written)
    }
}

/// Write a whole in-memory manifest.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let mut w = ManifestWriter::create(path)?;
    for e in manifest.entries() {
        w.append(&e.digest, &e.rel_path)?;
    }
    w.finish()?;
    Ok(())
}
