use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{AppState, ErrorResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct StorageHealth {
    pub status: String,
    pub timestamp: String,
}

#[utoipa::path(
    context_path = "/api",
    tag = "Health",
    get,
    path = "/health/storage",
    responses(
        (status = 200, description = "Bucket reachable", body = StorageHealth),
        (status = 503, description = "Bucket unreachable", body = ErrorResponse)
    )
)]
pub async fn storage_health(data: web::Data<AppState>) -> impl Responder {
    match data.storage.probe().await {
        Ok(()) => HttpResponse::Ok().json(StorageHealth {
            status: "ok".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
        Err(e) => {
            log::error!("Storage probe failed: {}", e);
            HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
                "ServiceUnavailable",
                "No se pudo acceder al almacenamiento",
            ))
        }
    }
}
