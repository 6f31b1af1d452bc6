//! The extraction collaborator: everything that knows how to talk to `yt-dlp`.
//!
//! Handlers only see the [`Extractor`] trait so the HTTP surface can run
//! against a fake in tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::AppConfig;
use crate::metadata::VideoMetadata;
use crate::validate::VideoReference;

const STDERR_TAIL_LINES: usize = 50;

/// Stem of the file the collaborator writes inside the staging directory.
pub const STAGED_AUDIO_STEM: &str = "audio";

#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("Failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("yt-dlp exited with error (status={status}): {stderr_tail}")]
    Failed {
        status: ExitStatus,
        stderr_tail: String,
    },

    #[error("Failed to parse yt-dlp JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("yt-dlp reported no title for this video")]
    MissingTitle,

    #[error("Download succeeded but no audio file was produced")]
    MissingOutput,

    #[error("Download succeeded but the audio file is empty")]
    EmptyOutput,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn video_info(&self, video: &VideoReference) -> Result<VideoMetadata, ExtractorError>;

    /// Writes the best audio-only stream into `staging_dir` and returns the
    /// path of the produced file.
    async fn download_audio(
        &self,
        video: &VideoReference,
        staging_dir: &Path,
    ) -> Result<PathBuf, ExtractorError>;
}

/// Subset of `yt-dlp -J` output we care about.
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

pub fn parse_video_info(stdout: &[u8]) -> Result<VideoMetadata, ExtractorError> {
    let info: InfoJson = serde_json::from_slice(stdout)?;
    let title = info.title.ok_or(ExtractorError::MissingTitle)?;

    Ok(VideoMetadata {
        title,
        author: info.uploader.or(info.channel).unwrap_or_default(),
        length: info
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0),
        thumbnail_url: info.thumbnail.unwrap_or_default(),
    })
}

async fn collect_stderr(
    stderr: tokio::process::ChildStderr,
    buf: Arc<AsyncMutex<VecDeque<String>>>,
) {
    let mut r = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match r.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let l = line.trim_end().to_string();
                if !l.is_empty() {
                    log::debug!("[yt-dlp] {}", l);
                    let mut g = buf.lock().await;
                    if g.len() >= STDERR_TAIL_LINES {
                        g.pop_front();
                    }
                    g.push_back(l);
                }
            }
            Err(_) => break,
        }
    }
}

async fn render_tail(buf: &AsyncMutex<VecDeque<String>>) -> String {
    let g = buf.lock().await;
    if g.is_empty() {
        return "no stderr output captured".to_string();
    }
    g.iter().cloned().collect::<Vec<_>>().join("\n")
}

/// Last `STDERR_TAIL_LINES` non-empty lines of a captured stderr.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return "no stderr output captured".to_string();
    }
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

fn find_ffmpeg(cfg: &AppConfig) -> Option<PathBuf> {
    if let Some(p) = &cfg.ffmpeg_bin {
        return Some(p.clone());
    }
    // Common Linux/Homebrew locations.
    ["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/opt/homebrew/bin/ffmpeg"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Finds the file yt-dlp wrote for `STAGED_AUDIO_STEM`, whatever extension
/// the selected stream (or the mp3 conversion) gave it.
async fn find_staged_audio(staging_dir: &Path) -> Result<PathBuf, ExtractorError> {
    let mut entries = tokio::fs::read_dir(staging_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let p = entry.path();
        let is_audio = p.file_stem().and_then(|s| s.to_str()) == Some(STAGED_AUDIO_STEM);
        if is_audio && entry.file_type().await?.is_file() {
            return Ok(p);
        }
    }
    Err(ExtractorError::MissingOutput)
}

pub struct YtDlp {
    config: Arc<AppConfig>,
}

impl YtDlp {
    pub fn new(config: Arc<AppConfig>) -> Self {
        if find_ffmpeg(&config).is_none() {
            log::warn!("ffmpeg not found; audio is stored in the stream's native container");
        }
        Self { config }
    }

    fn base_command(&self) -> Command {
        let cfg = self.config.as_ref();
        let mut cmd = Command::new(&cfg.ytdlp_bin);
        cmd.env("PATH", &cfg.ytdlp_path);

        if !cfg.inherit_proxy_env {
            // Avoid being accidentally bound to a dead local proxy (common in shell env).
            cmd.env_remove("http_proxy")
                .env_remove("https_proxy")
                .env_remove("HTTP_PROXY")
                .env_remove("HTTPS_PROXY")
                .env_remove("no_proxy")
                .env_remove("NO_PROXY");
        }

        if let Some(p) = &cfg.ytdlp_proxy {
            cmd.arg("--proxy").arg(p);
        }
        if let Some(cookies) = &cfg.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }

        cmd.arg("--no-playlist").arg("--no-cache-dir").arg("--no-part");
        cmd
    }

    fn audio_command(&self, url: &str, staging_dir: &Path) -> Command {
        let mut cmd = self.base_command();
        let out_template = staging_dir.join(format!("{}.%(ext)s", STAGED_AUDIO_STEM));
        cmd.arg("-o").arg(out_template);
        cmd.arg("-f").arg("bestaudio/best");

        if let Some(ffmpeg) = find_ffmpeg(&self.config) {
            cmd.arg("--ffmpeg-location")
                .arg(ffmpeg)
                .arg("--extract-audio")
                .arg("--audio-format")
                .arg("mp3");
        }

        cmd.arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn video_info(&self, video: &VideoReference) -> Result<VideoMetadata, ExtractorError> {
        let mut cmd = self.base_command();
        cmd.arg("-J")
            .arg(video.as_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let out = cmd.output().await.map_err(ExtractorError::Spawn)?;
        if !out.status.success() {
            return Err(ExtractorError::Failed {
                status: out.status,
                stderr_tail: stderr_tail(&String::from_utf8_lossy(&out.stderr)),
            });
        }

        parse_video_info(&out.stdout)
    }

    async fn download_audio(
        &self,
        video: &VideoReference,
        staging_dir: &Path,
    ) -> Result<PathBuf, ExtractorError> {
        let mut cmd = self.audio_command(video.as_str(), staging_dir);
        let mut child = cmd.spawn().map_err(ExtractorError::Spawn)?;
        if let Some(pid) = child.id() {
            log::info!("[DOWNLOAD] yt-dlp started (pid={})", pid);
        }

        let tail_buf: Arc<AsyncMutex<VecDeque<String>>> = Arc::new(AsyncMutex::new(VecDeque::new()));
        let stderr_task = child.stderr.take().map(|stderr| {
            let buf = tail_buf.clone();
            tokio::spawn(async move { collect_stderr(stderr, buf).await })
        });

        let status = child.wait().await?;
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        if !status.success() {
            return Err(ExtractorError::Failed {
                status,
                stderr_tail: render_tail(&tail_buf).await,
            });
        }

        let produced = find_staged_audio(staging_dir).await?;
        if tokio::fs::metadata(&produced).await?.len() == 0 {
            return Err(ExtractorError::EmptyOutput);
        }
        Ok(produced)
    }
}
