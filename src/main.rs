use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{web, HttpServer};
use anyhow::Context;

mod config;
mod download;
mod error;
mod filename;
mod handlers;
mod metadata;
mod pages;
mod state;
mod storage;
mod validate;
mod ytdlp;

#[cfg(test)]
mod testing;

use crate::state::AppState;
use crate::storage::DownloadDir;
use crate::ytdlp::YtDlp;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let explicit_cfg = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1);
    let cfg_path = explicit_cfg.clone().unwrap_or_else(|| "config.toml".to_string());

    let cfg = config::AppConfig::load(&cfg_path, explicit_cfg.is_some())
        .with_context(|| format!("Failed to load config {}", cfg_path))?;
    let cfg = Arc::new(cfg);

    let storage = DownloadDir::create(&cfg.download_dir).with_context(|| {
        format!(
            "Failed to create download directory {}",
            cfg.download_dir.display()
        )
    })?;

    log::info!("YouTube audio service listening on http://{}", cfg.listen_addr);
    log::info!(
        "Storing audio in {}",
        std::fs::canonicalize(storage.path())
            .unwrap_or_else(|_| PathBuf::from(storage.path()))
            .display()
    );

    let state = web::Data::new(AppState {
        storage,
        extractor: Arc::new(YtDlp::new(cfg.clone())),
    });

    let max_body_bytes = cfg.max_body_bytes;
    HttpServer::new(move || {
        handlers::app(state.clone(), max_body_bytes).wrap(actix_web::middleware::Logger::default())
    })
    .bind(cfg.listen_addr.as_str())
    .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?
    .run()
    .await?;

    Ok(())
}
