//! Directory enumeration for manifest creation and validation snapshots.

use crate::algorithm::Algorithm;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Prefix carried by every relative path the enumerator yields.
pub const REL_PREFIX: &str = "./";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkedFile {
    pub abs_path: PathBuf,
    /// `./`-prefixed, `/`-separated path relative to the walk root.
    pub rel_path: String,
}

#[derive(Clone, Debug, Default)]
pub struct WalkOptions {
    pub recursive: bool,
    /// Extension allow-list; `None` admits every non-ignored file.
    pub formats: Option<Vec<String>>,
    /// Files never yielded (e.g. a manifest stored under the root).
    pub exclude: Vec<PathBuf>,
}

impl WalkOptions {
    pub fn recursive() -> Self {
        Self { recursive: true, ..Self::default() }
    }
}

/// Adds the `./` prefix if missing. The rest of the path is left untouched.
pub fn with_rel_prefix(rel: &str) -> String {
    if rel.starts_with(REL_PREFIX) {
        rel.to_string()
    } else {
        format!("{REL_PREFIX}{rel}")
    }
}

/// Inverse of [`with_rel_prefix`]; repeated `./` prefixes are all removed.
pub fn strip_rel_prefix(mut rel: &str) -> &str {
    while let Some(rest) = rel.strip_prefix(REL_PREFIX) {
        rel = rest;
    }
    rel
}

/// `/`-joined UTF-8 form of a relative path, or `None` if any component is not
/// valid UTF-8 (the manifest cannot represent it).
fn rel_string(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(name) => parts.push(name.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn normalize_format(f: &str) -> String {
    f.trim().trim_start_matches('.').to_lowercase()
}

fn is_excluded(exclude: &[PathBuf], path: &Path) -> bool {
    exclude.iter().any(|x| {
        x.file_name() == path.file_name()
            && (x == path || path.canonicalize().map(|c| &c == x).unwrap_or(false))
    })
}

/// Lazily enumerate regular files under `root`.
///
/// Files whose extension names a digest algorithm are always skipped so a
/// directory's own manifests never end up in it. Unreadable subtrees are
/// logged and skipped.
pub fn enumerate(root: &Path, opts: &WalkOptions) -> impl Iterator<Item = WalkedFile> {
    let root = root.to_path_buf();
    let formats: Option<Vec<String>> =
        opts.formats.as_ref().map(|v| v.iter().map(|f| normalize_format(f)).collect());
    let exclude: Vec<PathBuf> = opts
        .exclude
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();
    let mut walker = WalkDir::new(&root).min_depth(1).follow_links(false).sort_by_file_name();
    if !opts.recursive {
        walker = walker.max_depth(1);
    }
    walker.into_iter().filter_map(move |ent| {
        let ent = match ent {
            Ok(ent) => ent,
            Err(e) => {
                let at = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(path = %at, error = %e, "skipping unreadable entry");
                return None;
            }
        };
        if !ent.file_type().is_file() {
            return None;
        }
        let path = ent.path();
        let ext = extension_of(path);
        if let Some(ext) = &ext {
            if Algorithm::is_known_extension(ext) {
                return None;
            }
        }
        if let Some(formats) = &formats {
            match &ext {
                Some(ext) if formats.iter().any(|f| f == ext) => {}
                _ => return None,
            }
        }
        if is_excluded(&exclude, path) {
            return None;
        }
        let rel = pathdiff::diff_paths(path, &root)?;
        let Some(rel) = rel_string(&rel) else {
            tracing::warn!(path = %path.display(), "skipping file whose name is not valid UTF-8");
            return None;
        };
        Some(WalkedFile { abs_path: path.to_path_buf(), rel_path: with_rel_prefix(&rel) })
    })
}
