use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use stanhub_schema::{FileContentRequest, FileContentResponse};

use crate::error::{parse_body, ApiError};
use crate::state::AppState;

pub async fn file_content(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FileContentResponse>, ApiError> {
    let params: FileContentRequest = parse_body(&body)?;
    let file = params
        .file
        .filter(|f| !f.is_empty())
        .ok_or(ApiError::BadRequest("File path is required"))?;

    let path = resolve_within_root(&state.project_root, &file).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    Ok(Json(FileContentResponse {
        content: String::from_utf8_lossy(&bytes).into_owned(),
    }))
}

/// Canonicalizes `requested` (relative paths are taken from `root`) and
/// accepts it only if it is a regular file inside `root`. Symbolic links are
/// followed before the check. A path that cannot be canonicalized is
/// `Forbidden` when it lies outside `root` lexically, so callers cannot test
/// for files elsewhere on disk.
pub async fn resolve_within_root(root: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    let root = tokio::fs::canonicalize(root)
        .await
        .context("project root is not accessible")?;

    let candidate = root.join(requested);
    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => return Err(ApiError::Forbidden),
        Err(_) if !normalize_lexically(&candidate).starts_with(&root) => {
            return Err(ApiError::Forbidden)
        }
        Err(_) => return Err(ApiError::NotFound("File not found")),
    };

    if !resolved.starts_with(&root) {
        tracing::warn!(requested, resolved = %resolved.display(), "rejected file outside project root");
        return Err(ApiError::Forbidden);
    }

    let is_file = tokio::fs::metadata(&resolved)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ApiError::NotFound("File not found"));
    }

    Ok(resolved)
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn accepts_relative_and_absolute_paths_inside_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/A.php"), "<?php").unwrap();

        let relative = resolve_within_root(tmp.path(), "src/A.php").await.unwrap();
        let absolute = tmp.path().join("src/A.php");
        let absolute = resolve_within_root(tmp.path(), absolute.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(relative, absolute);
    }

    #[tokio::test]
    async fn rejects_parent_traversal() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();

        let result = resolve_within_root(&root, "../secret.txt").await;
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn sibling_with_common_prefix_is_outside() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("app");
        let sibling = outer.path().join("app2");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("x.php"), "<?php").unwrap();

        let result = resolve_within_root(&root, sibling.join("x.php").to_str().unwrap()).await;
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn directories_and_missing_files_are_not_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();

        assert!(matches!(
            resolve_within_root(tmp.path(), "src").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            resolve_within_root(tmp.path(), "src/Missing.php").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_files_outside_root_are_forbidden() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("project");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(outer.path().join("exists.txt"), "x").unwrap();

        for requested in ["../exists.txt", "../missing.txt", "src/../../missing.txt"] {
            let result = resolve_within_root(&root, requested).await;
            assert!(matches!(result, Err(ApiError::Forbidden)), "{requested}");
        }
        let absolute = outer.path().join("missing.txt");
        let result = resolve_within_root(&root, absolute.to_str().unwrap()).await;
        assert!(matches!(result, Err(ApiError::Forbidden)));

        let result = resolve_within_root(&root, "src/../Missing.php").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn lexical_normalization() {
        assert_eq!(
            normalize_lexically(Path::new("/p/src/./../lib/A.php")),
            PathBuf::from("/p/lib/A.php")
        );
        assert_eq!(normalize_lexically(Path::new("/p/../../x")), PathBuf::from("/x"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_root_is_forbidden() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("target.php");
        std::fs::write(&target, "<?php echo 'outside';").unwrap();
        std::os::unix::fs::symlink(&target, root.path().join("link.php")).unwrap();

        let result = resolve_within_root(root.path(), "link.php").await;
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }
}
