use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::error::{JsonPayloadError, PayloadError};
use actix_web::http::{header, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{web, App, HttpRequest, HttpResponse, Responder};
use async_stream::stream;
use serde::Deserialize;
use tokio::io::AsyncReadExt;

use crate::error::ServiceError;
use crate::state::AppState;
use crate::{download as audio, metadata, pages, validate};

#[derive(Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

pub async fn index() -> impl Responder {
    pages::index()
}

pub async fn video_info(
    req: web::Json<UrlRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("[INFO] Request: url={}", req.url);

    let video = validate::validate(&req.url)?;
    let data = metadata::fetch(state.extractor.as_ref(), &video).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": data
    })))
}

pub async fn download(
    req: web::Json<UrlRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("[DOWNLOAD] Request: url={}", req.url);

    let video = validate::validate(&req.url)?;
    let stored = audio::download(state.extractor.as_ref(), &state.storage, &video).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "download_url": format!("/download/{}", stored.name)
    })))
}

pub async fn serve_file(
    filename: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let filename = filename.into_inner();
    let missing = |reason: &dyn std::fmt::Display| {
        log::warn!("[SERVE] {}: {}", filename, reason);
        ServiceError::FileNotFound(filename.clone())
    };

    let path = state
        .storage
        .resolve(&filename)
        .ok_or_else(|| missing(&"not a plain file name"))?;

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| missing(&e))?;
    let meta = file.metadata().await.map_err(|e| {
        log::error!("[SERVE] {}: {}", filename, e);
        ServiceError::Internal
    })?;
    if !meta.is_file() {
        return Err(missing(&"not a regular file"));
    }

    let body = stream! {
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => yield Ok(bytes::Bytes::copy_from_slice(&buffer[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(HttpResponse::Ok()
        .content_type(content_type.to_string())
        .append_header((header::CONTENT_LENGTH, meta.len().to_string()))
        .append_header((
            header::CONTENT_DISPOSITION,
            format!(r#"attachment; filename="{}""#, filename),
        ))
        .streaming(body))
}

/// Body-level failures on the JSON endpoints: oversized bodies are 413,
/// anything else (bad JSON, missing `url`) is reported like any other bad input.
pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let service_err = match &err {
        JsonPayloadError::OverflowKnownLength { .. }
        | JsonPayloadError::Overflow { .. }
        | JsonPayloadError::Payload(PayloadError::Overflow) => ServiceError::PayloadTooLarge,
        _ => ServiceError::BadRequest(err.to_string()),
    };
    log::warn!("Rejected request body: {}", err);
    service_err.into()
}

pub async fn not_found(req: HttpRequest) -> HttpResponse {
    log::info!("[404] {} {}", req.method(), req.path());
    pages::error(StatusCode::NOT_FOUND, "Page not found")
}

/// Replaces any 500 response with the rendered error page.
pub fn internal_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let (req, _) = res.into_parts();
    let page = pages::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    let res = ServiceResponse::new(req, page).map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default().limit(limit).error_handler(json_error)
}

/// The whole HTTP surface: routes, body limit, and the 404/500 pages.
pub fn app(
    state: web::Data<AppState>,
    max_body_bytes: usize,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .app_data(json_config(max_body_bytes))
        .service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/api/video-info").route(web::post().to(video_info)))
        .service(web::resource("/api/download").route(web::post().to(download)))
        .service(web::resource("/download/{filename}").route(web::get().to(serve_file)))
        .default_service(web::to(not_found))
        .wrap(ErrorHandlers::new().handler(StatusCode::INTERNAL_SERVER_ERROR, internal_error))
}
