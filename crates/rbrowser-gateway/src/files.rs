//! Editor file saving for `SAVEFILE`.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolve a client-supplied path against the session working directory.
///
/// No sanitization: absolute paths and `..` are honoured as given.
pub fn resolve(raw: &str, workdir: &Path) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workdir.join(path)
    }
}

/// Write `content` to `path` in place.
///
/// Symlinks are followed and an existing file keeps its permissions.
pub async fn save_file(path: &Path, content: &str) -> std::io::Result<()> {
    tokio::fs::write(path, content.as_bytes()).await?;
    debug!(path = %path.display(), bytes = content.len(), "Saved file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let workdir = Path::new("/work");
        assert_eq!(resolve("a/b.txt", workdir), PathBuf::from("/work/a/b.txt"));
        assert_eq!(resolve("/etc/x", workdir), PathBuf::from("/etc/x"));
    }

    #[tokio::test]
    async fn test_save_overwrites_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "old content that is longer").unwrap();

        save_file(&path, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_save_through_symlink_keeps_link_and_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.sh");
        let link = dir.path().join("link.sh");
        std::fs::write(&real, "old").unwrap();
        std::fs::set_permissions(&real, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        save_file(&link, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&real).unwrap(), "new");
        assert!(
            std::fs::symlink_metadata(&link)
                .unwrap()
                .file_type()
                .is_symlink()
        );

        save_file(&real, "newer").await.unwrap();
        let mode = std::fs::metadata(&real).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "newer");
    }

    #[tokio::test]
    async fn test_save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/notes.txt");
        assert!(save_file(&path, "x").await.is_err());
    }
}
