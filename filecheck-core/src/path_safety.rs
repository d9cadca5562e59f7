use std::path::{Component, Path};

/// Ensure a manifest path stays under the directory it is resolved against:
/// no absolute paths, no `..` components.
pub fn validate_rel(rel: &str) -> Result<(), String> {
    let p = Path::new(rel);
    // `\` only separates components on Windows; elsewhere it is a name character.
    let backslash_sep = cfg!(windows);
    if p.is_absolute() || rel.starts_with('/') || (backslash_sep && rel.starts_with('\\')) {
        return Err(format!("absolute paths are not allowed: {rel:?}"));
    }
    for comp in p.components() {
        match comp {
            Component::ParentDir => return Err(format!("parent traversal not allowed: {rel:?}")),
            Component::Prefix(_) | Component::RootDir => {
                return Err(format!("absolute paths are not allowed: {rel:?}"))
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    let is_sep = |c: char| c == '/' || (backslash_sep && c == '\\');
    if rel.split(is_sep).any(|seg| seg == "..") {
        return Err(format!("parent traversal not allowed: {rel:?}"));
    }
    Ok(())
}
