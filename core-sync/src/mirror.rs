//! # Local Mirror
//!
//! Streams remote file content into the on-disk mirror tree.
//!
//! ## Overview
//!
//! Each member owns a subtree under `<out>/members/<member_id>/`, with the
//! remote path re-rooted beneath it. Writes stream straight to disk via
//! `tokio::io::copy`, never buffering a whole file. Deletes are soft: a
//! path that is already absent counts as removed.
//!
//! Remote paths are not trusted as-is. The leading slash is stripped, `..`
//! and empty components are dropped, and unprintable characters are
//! removed so every write lands inside the member's subtree.

use crate::{Result, SyncError};
use async_trait::async_trait;
use remote_traits::MemberId;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

/// POSIX errno for a full filesystem.
const ENOSPC: i32 = 28;

// ============================================================================
// Mirror Trait
// ============================================================================

/// Destination for mirrored file content.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Stream `content` into the mirror at the member's remote path.
    /// Overwrites any previous version. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// `SyncError::QuotaExceeded` when the destination is out of space,
    /// `SyncError::Io` for any other filesystem failure.
    async fn write_file(
        &self,
        member: &MemberId,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64>;

    /// Remove the mirrored path, whether it is a file or a whole folder.
    /// Returns `false` when the path was already absent.
    async fn remove(&self, member: &MemberId, path: &str) -> Result<bool>;
}

// ============================================================================
// Local Filesystem Implementation
// ============================================================================

/// Mirror over the local filesystem.
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute target path for a member's remote path.
    fn target_path(&self, member: &MemberId, remote_path: &str) -> PathBuf {
        self.root
            .join("members")
            .join(member.as_str())
            .join(sanitize_relative(remote_path))
    }
}

/// Turn a remote display path into a safe relative path.
///
/// Strips the leading slash, drops empty, `.` and `..` components, and
/// removes unprintable characters within each component.
fn sanitize_relative(remote_path: &str) -> PathBuf {
    let mut relative = PathBuf::new();

    for component in remote_path.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            continue;
        }

        let cleaned: String = component.chars().filter(|c| !c.is_control()).collect();
        if cleaned.is_empty() {
            continue;
        }

        relative.push(cleaned);
    }

    relative
}

fn map_io_error(path: &Path, error: std::io::Error) -> SyncError {
    if error.raw_os_error() == Some(ENOSPC) {
        SyncError::QuotaExceeded(path.display().to_string())
    } else {
        SyncError::Io(format!("{}: {}", path.display(), error))
    }
}

#[async_trait]
impl Mirror for LocalMirror {
    async fn write_file(
        &self,
        member: &MemberId,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        let target = self.target_path(member, path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(parent, e))?;
        }

        let mut file = fs::File::create(&target)
            .await
            .map_err(|e| map_io_error(&target, e))?;

        let bytes = tokio::io::copy(content, &mut file)
            .await
            .map_err(|e| map_io_error(&target, e))?;

        file.flush().await.map_err(|e| map_io_error(&target, e))?;

        debug!(path = %target.display(), bytes, "Mirrored file");
        Ok(bytes)
    }

    async fn remove(&self, member: &MemberId, path: &str) -> Result<bool> {
        let target = self.target_path(member, path);

        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = %target.display(), "Removed mirrored file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                // A deleted entry can name a whole folder; unlink refuses
                // directories (EISDIR on Linux, EPERM elsewhere), so check
                // what is actually there and take the subtree down.
                let is_dir = fs::metadata(&target)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    return Err(map_io_error(&target, e));
                }

                fs::remove_dir_all(&target)
                    .await
                    .map_err(|e| map_io_error(&target, e))?;
                debug!(path = %target.display(), "Removed mirrored directory");
                Ok(true)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_leading_slash() {
        assert_eq!(
            sanitize_relative("/Docs/Plan.md"),
            PathBuf::from("Docs/Plan.md")
        );
    }

    #[test]
    fn test_sanitize_drops_traversal_components() {
        assert_eq!(
            sanitize_relative("/../../etc/passwd"),
            PathBuf::from("etc/passwd")
        );
        assert_eq!(sanitize_relative("/a/./b//c"), PathBuf::from("a/b/c"));
    }

    #[test]
    fn test_sanitize_removes_unprintable_chars() {
        assert_eq!(
            sanitize_relative("/re\u{0007}port\u{0000}.pdf"),
            PathBuf::from("report.pdf")
        );
        // A component that is nothing but control characters vanishes.
        assert_eq!(sanitize_relative("/\u{0001}\u{0002}/file"), PathBuf::from("file"));
    }

    #[tokio::test]
    async fn test_write_and_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::new(dir.path());
        let member = MemberId::new("dbmid:ada");

        let mut content = std::io::Cursor::new(b"hello mirror".to_vec());
        let bytes = mirror
            .write_file(&member, "/Projects/notes.txt", &mut content)
            .await
            .unwrap();
        assert_eq!(bytes, 12);

        let on_disk = dir
            .path()
            .join("members/dbmid:ada/Projects/notes.txt");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"hello mirror");

        assert!(mirror.remove(&member, "/Projects/notes.txt").await.unwrap());
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::new(dir.path());
        let member = MemberId::new("dbmid:ada");

        let mut first = std::io::Cursor::new(b"version one".to_vec());
        mirror.write_file(&member, "/a.txt", &mut first).await.unwrap();

        let mut second = std::io::Cursor::new(b"v2".to_vec());
        mirror.write_file(&member, "/a.txt", &mut second).await.unwrap();

        let on_disk = dir.path().join("members/dbmid:ada/a.txt");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_remove_folder_path_takes_down_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::new(dir.path());
        let member = MemberId::new("dbmid:ada");

        let mut content = std::io::Cursor::new(b"draft".to_vec());
        mirror
            .write_file(&member, "/Docs/plan.md", &mut content)
            .await
            .unwrap();

        assert!(mirror.remove(&member, "/Docs").await.unwrap());
        assert!(!dir.path().join("members/dbmid:ada/Docs").exists());
    }

    #[tokio::test]
    async fn test_remove_absent_path_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::new(dir.path());
        let member = MemberId::new("dbmid:ada");

        assert!(!mirror.remove(&member, "/never/existed.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_traversal_path_stays_under_member_root() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::new(dir.path());
        let member = MemberId::new("dbmid:ada");

        let mut content = std::io::Cursor::new(b"trapped".to_vec());
        mirror
            .write_file(&member, "/../../escape.txt", &mut content)
            .await
            .unwrap();

        let inside = dir.path().join("members/dbmid:ada/escape.txt");
        assert!(inside.exists());
        assert!(!dir.path().join("escape.txt").exists());
    }
}
