use actix_web::{web, HttpResponse, Responder};

use super::models::{DocumentRequest, GenerationOutcome};
use super::orchestrator::GenerationError;
use crate::{AppState, ErrorResponse};

fn generation_error_response(error: &GenerationError) -> HttpResponse {
    match error {
        GenerationError::InvalidIntake(message) => {
            log::warn!("Rejected intake: {}", message);
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(message))
        }
        GenerationError::Timeout { step } => {
            log::error!("Document generation timed out at {}", step);
            HttpResponse::GatewayTimeout().json(ErrorResponse::new(
                "GatewayTimeout",
                "El procesamiento tardó demasiado, intenta de nuevo.",
            ))
        }
        other => {
            log::error!("Document generation failed: {}", other);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Error al procesar el documento."))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Documents",
    post,
    path = "/documents",
    request_body = DocumentRequest,
    responses(
        (status = 200, description = "Questions for an incomplete intake, or the preview and download token", body = GenerationOutcome),
        (status = 400, description = "Intake is not a JSON object", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse),
        (status = 504, description = "An upstream capability timed out", body = ErrorResponse)
    )
)]
pub async fn process_document_request(
    data: web::Data<AppState>,
    body: web::Json<DocumentRequest>,
) -> impl Responder {
    log::info!("Processing document request");

    match data.pipeline.process(&body.form_data).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => generation_error_response(&e),
    }
}
