use serde::Serialize;

use crate::error::ServiceError;
use crate::validate::VideoReference;
use crate::ytdlp::Extractor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author: String,
    /// Whole seconds; 0 when the collaborator reports no duration.
    pub length: u64,
    pub thumbnail_url: String,
}

/// Single attempt: any collaborator failure surfaces immediately.
pub async fn fetch(
    extractor: &dyn Extractor,
    video: &VideoReference,
) -> Result<VideoMetadata, ServiceError> {
    extractor.video_info(video).await.map_err(|e| {
        log::error!("Error getting video info for {}: {}", video, e);
        ServiceError::MetadataFetch(e.to_string())
    })
}
