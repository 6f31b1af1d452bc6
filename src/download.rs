use crate::error::ServiceError;
use crate::filename;
use crate::storage::{DownloadDir, StoredAudioFile};
use crate::validate::VideoReference;
use crate::ytdlp::Extractor;

fn download_error(video: &VideoReference, e: impl std::fmt::Display) -> ServiceError {
    log::error!("Download error for {}: {}", video, e);
    ServiceError::Download(e.to_string())
}

/// Fetches the best audio-only stream for `video` and stores it under a
/// sanitized, timestamped name derived from the video title.
///
/// The collaborator writes into a staging directory that is dropped on every
/// exit path, so a failed download leaves nothing behind in `dir`.
pub async fn download(
    extractor: &dyn Extractor,
    dir: &DownloadDir,
    video: &VideoReference,
) -> Result<StoredAudioFile, ServiceError> {
    let meta = extractor
        .video_info(video)
        .await
        .map_err(|e| download_error(video, e))?;
    let name = filename::sanitize(&format!("{}{}", meta.title, filename::DEFAULT_EXTENSION));

    let staging = dir.staging().map_err(|e| download_error(video, e))?;
    let produced = extractor
        .download_audio(video, staging.path())
        .await
        .map_err(|e| download_error(video, e))?;

    let stored = dir
        .persist(&produced, &name)
        .await
        .map_err(|e| download_error(video, e))?;

    log::info!("[DOWNLOAD] Stored {} as {}", video, stored.path.display());
    Ok(stored)
}
