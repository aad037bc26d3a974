//! HTTP surface over a shared [`CompressorPanel`].

use crate::panel::CompressorPanel;
use crate::service::CompressionService;
use crate::types::*;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError, Result};
use base64::{engine::general_purpose, Engine as _};
use uuid::Uuid;

impl ResponseError for PanelError {
    fn status_code(&self) -> StatusCode {
        match self {
            PanelError::NoFileSelected | PanelError::AlreadyCompressing => StatusCode::CONFLICT,
            PanelError::NoResult => StatusCode::NOT_FOUND,
            PanelError::NotAnImage { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PanelError::InvalidQuality { .. } | PanelError::EmptyFile { .. } | PanelError::Base64(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            error: self.to_string(),
        })
    }
}

pub fn configure<S: CompressionService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/state", web::get().to(get_state::<S>))
        .route("/api/file", web::post().to(select_file::<S>))
        .route("/api/quality", web::put().to(set_quality::<S>))
        .route("/api/compress", web::post().to(compress::<S>))
        .route("/api/download", web::get().to(download::<S>))
        .route("/api/stats", web::get().to(stats::<S>))
        .route("/blob/{id}", web::get().to(get_blob::<S>));
}

async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "image-compressor",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn get_state<S: CompressionService + 'static>(
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(panel.view()))
}

async fn select_file<S: CompressionService + 'static>(
    req: web::Json<SelectFileRequest>,
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse, PanelError> {
    let req = req.into_inner();
    log::info!("File upload received: {} ({})", req.name, req.mime_type);

    let content = general_purpose::STANDARD.decode(req.content.trim())?;
    if content.is_empty() {
        log::warn!("Empty file content for: {}", req.name);
        return Err(PanelError::EmptyFile { name: req.name });
    }

    let file = OriginalFile::new(req.name, content, req.mime_type);
    if !file.is_image() {
        log::warn!("Rejected non-image upload {} ({})", file.name, file.mime_type);
        return Err(PanelError::NotAnImage { mime_type: file.mime_type });
    }

    Ok(HttpResponse::Ok().json(panel.select_file(file)))
}

async fn set_quality<S: CompressionService + 'static>(
    req: web::Json<QualityRequest>,
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse, PanelError> {
    let quality = Quality::new(req.quality)?;
    Ok(HttpResponse::Ok().json(panel.set_quality(quality)))
}

async fn compress<S: CompressionService + 'static>(
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse, PanelError> {
    let view = panel.compress().await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn download<S: CompressionService + 'static>(
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse, PanelError> {
    let download = panel.download()?;
    log::info!("Serving download {} ({} bytes)", download.filename, download.content.len());

    Ok(HttpResponse::Ok()
        .content_type(download.mime_type)
        .append_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", download.filename),
        ))
        .append_header(("Cache-Control", "no-cache"))
        .body(download.content))
}

async fn get_blob<S: CompressionService + 'static>(
    path: web::Path<Uuid>,
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse> {
    let id = path.into_inner();

    match panel.blobs().get(&id) {
        Some(blob) => Ok(HttpResponse::Ok()
            .content_type(blob.mime_type)
            .append_header(("Cache-Control", "no-cache"))
            .body(blob.content)),
        None => {
            log::warn!("Display handle not found: {}", id);
            Ok(HttpResponse::NotFound().json(ErrorResponse {
                success: false,
                error: format!("Display handle {} not found", id),
            }))
        }
    }
}

async fn stats<S: CompressionService + 'static>(
    panel: web::Data<CompressorPanel<S>>,
) -> Result<HttpResponse> {
    let (count, total_size) = panel.blobs().stats();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "display_handles": count,
        "display_handle_bytes": total_size,
        "busy": panel.with_state(|s| s.is_busy()),
        "max_output_size": format_megabytes((MAX_OUTPUT_SIZE_MB * MEGABYTE as f64) as u64),
        "quality_range": [Quality::MIN, Quality::MAX],
    })))
}
