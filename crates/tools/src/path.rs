//! Resolve tool-supplied paths against a base directory.
//!
//! Relative paths are joined onto the base. Any `..` component is
//! rejected outright, and the resolved path (or its nearest existing
//! ancestor, for paths about to be created) must canonicalize to somewhere
//! under the base, so symlinks cannot escape it either.

use aru_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

pub fn resolve_within(base: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let requested_path = Path::new(requested);

    if requested_path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ToolError::PathRejected(format!("path traversal in '{requested}'")));
    }

    let base = base
        .canonicalize()
        .map_err(|e| ToolError::PathRejected(format!("base directory {}: {e}", base.display())))?;

    let joined = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        base.join(requested_path)
    };

    // Canonicalize the deepest part that exists and re-attach the rest.
    let mut existing = joined.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing
        .canonicalize()
        .map_err(|e| ToolError::PathRejected(format!("'{requested}': {e}")))?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }

    if !resolved.starts_with(&base) {
        return Err(ToolError::PathRejected(format!(
            "'{requested}' is outside {}",
            base.display()
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_resolves_under_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        let resolved = resolve_within(dir.path(), "notes.txt").unwrap();
        assert!(resolved.ends_with("notes.txt"));
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn missing_nested_path_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_within(dir.path(), "a/b/c.txt").unwrap();
        assert!(resolved.ends_with("a/b/c.txt"));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_within(dir.path(), "../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("traversal"));
    }

    #[test]
    fn absolute_path_outside_base_is_rejected() {
        let base = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let target = other.path().join("x.txt");
        let err = resolve_within(base.path(), target.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ToolError::PathRejected(_)));
    }

    #[test]
    fn absolute_path_inside_base_is_allowed() {
        let base = tempfile::tempdir().unwrap();
        let target = base.path().join("inside.txt");
        assert!(resolve_within(base.path(), target.to_str().unwrap()).is_ok());
    }
}
