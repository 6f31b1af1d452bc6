use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// 16 MiB request bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub download_dir: PathBuf,
    pub max_body_bytes: usize,

    pub ytdlp_bin: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_bin: Option<PathBuf>,
    // Preferred: explicit yt-dlp proxy (e.g. socks5://127.0.0.1:7890).
    pub ytdlp_proxy: Option<String>,
    // Whether to let yt-dlp inherit http_proxy/https_proxy from the service environment.
    pub inherit_proxy_env: bool,
    pub cookies_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    listen_addr: Option<String>,
    download_dir: Option<String>,
    max_body_bytes: Option<usize>,

    ytdlp_bin: Option<String>,
    ytdlp_path: Option<String>,
    ffmpeg_bin: Option<String>,
    ytdlp_proxy: Option<String>,
    inherit_proxy_env: Option<bool>,
    cookies_file: Option<String>,
}

fn default_ytdlp_path() -> String {
    // Prefer inheriting PATH from the service process; override via config.toml when needed.
    std::env::var("PATH").unwrap_or_else(|_| {
        "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin".to_string()
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() { None } else { Some(s) }
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(AppConfigFile::default())
    }
}

impl AppConfig {
    /// Loads `path`. A missing file is only tolerated when `required` is false,
    /// in which case the built-in defaults are used.
    pub fn load(path: impl AsRef<Path>, required: bool) -> Result<Self> {
        let path = path.as_ref();
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config file: {}",
                path.to_string_lossy().as_ref()
            )
        })?;

        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: AppConfigFile = toml::from_str(raw).context("Failed to parse config.toml")?;
        let cfg = Self::from_file(file);

        if cfg.max_body_bytes == 0 {
            return Err(anyhow!("Invalid max_body_bytes: must be greater than 0"));
        }
        if cfg.download_dir.as_os_str().is_empty() {
            return Err(anyhow!("Invalid download_dir: must not be empty"));
        }

        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        Self {
            listen_addr: file.listen_addr.unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            download_dir: PathBuf::from(file.download_dir.unwrap_or_else(|| "downloads".to_string())),
            max_body_bytes: file.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),

            ytdlp_bin: PathBuf::from(file.ytdlp_bin.unwrap_or_else(|| "yt-dlp".to_string())),
            ytdlp_path: file.ytdlp_path.unwrap_or_else(default_ytdlp_path),
            ffmpeg_bin: non_empty(file.ffmpeg_bin).map(PathBuf::from),
            ytdlp_proxy: non_empty(file.ytdlp_proxy),
            inherit_proxy_env: file.inherit_proxy_env.unwrap_or(false),
            cookies_file: non_empty(file.cookies_file).map(PathBuf::from),
        }
    }
}
