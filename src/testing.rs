//! Fake extraction collaborator for handler and downloader tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::metadata::VideoMetadata;
use crate::validate::VideoReference;
use crate::ytdlp::{Extractor, ExtractorError, STAGED_AUDIO_STEM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    FailInfo,
    /// Writes half a file into the staging directory, then fails.
    FailMidDownload,
}

pub struct FakeExtractor {
    pub title: String,
    pub behavior: Behavior,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(title: &str, behavior: Behavior) -> Self {
        Self {
            title: title.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn failure(&self) -> ExtractorError {
        ExtractorError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "Video unavailable",
        ))
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn video_info(&self, _video: &VideoReference) -> Result<VideoMetadata, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::FailInfo {
            return Err(self.failure());
        }
        Ok(VideoMetadata {
            title: self.title.clone(),
            author: "Some Channel".to_string(),
            length: 212,
            thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string(),
        })
    }

    async fn download_audio(
        &self,
        _video: &VideoReference,
        staging_dir: &Path,
    ) -> Result<PathBuf, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = staging_dir.join(format!("{}.mp3", STAGED_AUDIO_STEM));
        match self.behavior {
            Behavior::FailInfo => Err(self.failure()),
            Behavior::FailMidDownload => {
                tokio::fs::write(&out, b"ID3 partial").await?;
                Err(self.failure())
            }
            Behavior::Succeed => {
                tokio::fs::write(&out, b"ID3 fake audio bytes").await?;
                Ok(out)
            }
        }
    }
}

/// Lists the download directory, including hidden staging entries.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
