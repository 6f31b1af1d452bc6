//! The download directory: created once at startup, written by downloads,
//! read by the file-serving route. Nothing here ever deletes a stored file.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::filename::{split_extension, MAX_FILENAME_LEN};

/// Staging directories start with a dot; sanitized names never do.
const STAGING_PREFIX: &str = ".staging-";

const MAX_DISAMBIGUATION_ATTEMPTS: usize = 1000;

/// An audio file persisted in the download directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudioFile {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DownloadDir {
    root: PathBuf,
}

/// `name` with `-n` inserted before the extension, shortening the base so
/// the result still fits in `MAX_FILENAME_LEN`.
fn disambiguated(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    let (base, ext) = split_extension(name);
    let suffix = format!("-{}{}", n, ext);
    let keep = MAX_FILENAME_LEN.saturating_sub(suffix.chars().count());
    let base: String = base.chars().take(keep).collect();
    format!("{}{}", base, suffix)
}

impl DownloadDir {
    /// Creates the directory (and parents) if absent.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// A private scratch directory inside the download directory, removed
    /// with everything in it when dropped.
    pub fn staging(&self) -> io::Result<TempDir> {
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
    }

    /// Moves `src` into the directory as `name`. Never overwrites: when the
    /// name is taken, `-1`, `-2`, ... is appended to the base name.
    pub async fn persist(&self, src: &Path, name: &str) -> io::Result<StoredAudioFile> {
        for n in 0..MAX_DISAMBIGUATION_ATTEMPTS {
            let candidate = disambiguated(name, n);
            let dest = self.root.join(&candidate);

            // Reserve the name first; the rename then replaces our empty placeholder.
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&dest)
                .await
            {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    log::warn!("[STORAGE] {} already exists, trying another name", candidate);
                    continue;
                }
                Err(e) => return Err(e),
            }

            if let Err(e) = tokio::fs::rename(src, &dest).await {
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e);
            }

            return Ok(StoredAudioFile {
                name: candidate,
                path: dest,
            });
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {}", name),
        ))
    }

    /// Maps a requested file name to a path directly inside the directory.
    /// Anything that is not a plain, visible file name resolves to `None`.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        if !plain || name.starts_with('.') {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("a/b/downloads");
        DownloadDir::create(&root).unwrap();
        std::fs::write(root.join("keep.mp3"), b"x").unwrap();
        DownloadDir::create(&root).unwrap();
        assert!(root.join("keep.mp3").exists());
    }

    #[test]
    fn resolve_only_accepts_plain_names() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DownloadDir::create(tmp.path()).unwrap();
        assert_eq!(dir.resolve("song.mp3"), Some(tmp.path().join("song.mp3")));
        for bad in ["", ".", "..", "../secret", "a/b.mp3", "/etc/passwd", ".staging-abc"] {
            assert_eq!(dir.resolve(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn disambiguation_keeps_extension_and_length() {
        assert_eq!(disambiguated("song_20240101_000000.mp3", 0), "song_20240101_000000.mp3");
        assert_eq!(disambiguated("song_20240101_000000.mp3", 2), "song_20240101_000000-2.mp3");
        let long = format!("{}.mp3", "a".repeat(251));
        let d = disambiguated(&long, 7);
        assert_eq!(d.len(), MAX_FILENAME_LEN);
        assert!(d.ends_with("-7.mp3"));
    }

    #[tokio::test]
    async fn persist_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DownloadDir::create(tmp.path()).unwrap();

        let mut stored = Vec::new();
        for body in ["first", "second", "third"] {
            let staging = dir.staging().unwrap();
            let src = staging.path().join("audio.mp3");
            std::fs::write(&src, body).unwrap();
            stored.push(dir.persist(&src, "title_20240101_000000.mp3").await.unwrap());
        }

        let names: Vec<_> = stored.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "title_20240101_000000.mp3",
                "title_20240101_000000-1.mp3",
                "title_20240101_000000-2.mp3"
            ]
        );
        assert_eq!(std::fs::read_to_string(&stored[0].path).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&stored[2].path).unwrap(), "third");
    }

    #[test]
    fn staging_is_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DownloadDir::create(tmp.path()).unwrap();
        let staging = dir.staging().unwrap();
        std::fs::write(staging.path().join("partial.webm"), b"half").unwrap();
        let staged_path = staging.path().to_path_buf();
        drop(staging);
        assert!(!staged_path.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
