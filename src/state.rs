use std::sync::Arc;

use crate::storage::DownloadDir;
use crate::ytdlp::Extractor;

pub struct AppState {
    pub storage: DownloadDir,
    pub extractor: Arc<dyn Extractor>,
}
