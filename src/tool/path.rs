//! Path jail: every filesystem path a tool touches is resolved and
//! validated against the session's working directory.

use anyhow::{Result, anyhow};
use std::path::{Component, Path, PathBuf};

/// Resolve a user-supplied path against the working directory and verify the
/// result stays inside it. Returns the absolute, normalized path.
///
/// Paths that do not exist yet are validated lexically (creation tools depend
/// on this); existing paths are canonicalized so a symlink pointing outside
/// the root is rejected.
pub fn resolve_path(working_dir: &Path, requested: &str) -> Result<PathBuf> {
    let requested_path = Path::new(requested);
    let joined = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        working_dir.join(requested_path)
    };

    let root = canonical_root(working_dir)?;
    let resolved = deep_canonicalize(&joined);

    validate_within(&root, &resolved, requested)?;
    Ok(resolved)
}

/// Relative form of an absolute path for logs and tool output, so full
/// system paths never leak to the model.
pub fn sanitize_for_display(working_dir: &Path, abs: &Path) -> String {
    let root = working_dir
        .canonicalize()
        .unwrap_or_else(|_| working_dir.to_path_buf());
    match abs.strip_prefix(&root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string()),
    }
}

fn canonical_root(working_dir: &Path) -> Result<PathBuf> {
    working_dir
        .canonicalize()
        .map_err(|e| anyhow!("invalid working directory '{}': {}", working_dir.display(), e))
}

fn validate_within(root: &Path, resolved: &Path, display: &str) -> Result<()> {
    if resolved.strip_prefix(root).is_ok() {
        return Ok(());
    }
    Err(anyhow!("path '{}' is outside working directory", display))
}

/// Canonicalize the longest existing prefix of `path`, then re-append the
/// non-existent remainder. Resolves symlinks in the parts that exist while
/// still permitting paths that are about to be created.
fn deep_canonicalize(path: &Path) -> PathBuf {
    let normalized = normalize(path);
    let mut existing = normalized.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        if let Ok(canon) = existing.canonicalize() {
            let mut out = canon;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Lexical normalization: collapse `.` and resolve `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}
