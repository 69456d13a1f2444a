//! Keeps tool paths inside the working directory.

use std::path::{Component, Path, PathBuf};

use tiller_core::error::ToolError;

/// Join `requested` onto `root`, refusing absolute paths, `..` components and
/// symlinks that lead out of `root`.
pub(crate) async fn resolve_within(
    root: &Path,
    requested: &str,
    tool_name: &str,
) -> Result<PathBuf, ToolError> {
    let denied = || ToolError::PermissionDenied {
        tool_name: tool_name.into(),
        reason: format!("{requested:?} is outside the working directory"),
    };

    let relative = Path::new(requested);
    let lexically_inside = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !lexically_inside {
        return Err(denied());
    }

    let full = root.join(relative);
    // A missing target is left for the caller to report as an I/O error.
    if let (Ok(root), Ok(target)) = (
        tokio::fs::canonicalize(root).await,
        tokio::fs::canonicalize(&full).await,
    ) && !target.starts_with(&root)
    {
        return Err(denied());
    }

    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relative_paths_resolve_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let path = resolve_within(dir.path(), "src/./lib.rs", "read_file").await.unwrap();
        assert_eq!(path, dir.path().join("src/./lib.rs"));
        assert!(resolve_within(dir.path(), ".", "list_files").await.is_ok());
    }

    #[tokio::test]
    async fn escapes_are_denied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        for requested in ["/etc/passwd", "..", "../secret", "src/../../secret"] {
            let err = resolve_within(dir.path(), requested, "read_file").await.unwrap_err();
            assert!(
                matches!(err, ToolError::PermissionDenied { ref tool_name, .. } if tool_name == "read_file"),
                "{requested} was not denied"
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_denied() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "key").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let err = resolve_within(dir.path(), "escape/secret.txt", "read_file")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }
}
