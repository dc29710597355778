use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, Either, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Instant;
use utoipa::{IntoParams, ToSchema};

use super::gateway::GatewayError;
use super::models::{Transaction, TransactionStatus};
use super::PaymentError;
use crate::download::{DownloadDecision, DOWNLOAD_DENIED_MESSAGE};
use crate::validation::{validate_payment_choice, validate_token, ValidationErrors};
use crate::{AppState, ErrorResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub status: TransactionStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConfirmQuery {
    pub ref_payco: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmResponse {
    pub success: bool,
    pub status: TransactionStatus,
    pub transaction: Transaction,
}

/// Status lookup by document token or by gateway reference.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct StatusQuery {
    pub token: Option<String>,
    pub ref_payco: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: TransactionStatus,
    pub details: Transaction,
    #[serde(rename = "downloadUrl", skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentOptionRequest {
    pub token: Option<String>,
    pub option: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessingMetadata {
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentOptionResponse {
    pub success: bool,
    pub message: String,
    pub metadata: ProcessingMetadata,
}

fn payment_error_response(error: &PaymentError) -> HttpResponse {
    match error {
        PaymentError::MissingFields(fields) => {
            log::warn!("Payment notification rejected: {}", error);
            let details = fields
                .iter()
                .map(|f| (f.to_string(), "Campo requerido".to_string()))
                .collect();
            HttpResponse::BadRequest().json(
                ErrorResponse::bad_request("Faltan campos requeridos en la notificación")
                    .with_details(details),
            )
        }
        PaymentError::InvalidToken(e) => {
            log::warn!("Payment notification with invalid token: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e.to_string()))
        }
        PaymentError::Gateway(e) => gateway_error_response(e),
        PaymentError::Store(e) => {
            log::error!("Failed to persist transaction: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Error al registrar la transacción"))
        }
    }
}

fn gateway_error_response(error: &GatewayError) -> HttpResponse {
    match error {
        GatewayError::InvalidReference => {
            HttpResponse::BadRequest().json(ErrorResponse::bad_request("ref_payco inválido"))
        }
        GatewayError::Rejected(reason) => {
            log::warn!("Gateway did not confirm reference: {}", reason);
            HttpResponse::NotFound().json(ErrorResponse::not_found(
                "La pasarela no reconoce la referencia de pago",
            ))
        }
        GatewayError::Http(_) | GatewayError::Status(_) => {
            log::error!("Payment gateway unavailable: {}", error);
            HttpResponse::BadGateway().json(ErrorResponse::new(
                "BadGateway",
                "No fue posible consultar la pasarela de pagos",
            ))
        }
    }
}

fn form_to_payload(form: HashMap<String, String>) -> Map<String, Value> {
    form.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}

#[utoipa::path(
    context_path = "/api",
    tag = "Payments",
    post,
    path = "/payments/webhook",
    request_body(content = Object, description = "ePayco confirmation fields (JSON or form-urlencoded)"),
    responses(
        (status = 200, description = "Notification recorded", body = WebhookResponse),
        (status = 400, description = "Missing fields or invalid token", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn payment_webhook(
    data: web::Data<AppState>,
    payload: Either<web::Json<Map<String, Value>>, web::Form<HashMap<String, String>>>,
) -> impl Responder {
    let payload = match payload {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form_to_payload(form.into_inner()),
    };
    log::info!("Received payment webhook with {} fields", payload.len());

    match data.payments.record_payload(payload).await {
        Ok(transaction) => HttpResponse::Ok().json(WebhookResponse {
            success: true,
            status: transaction.status,
        }),
        Err(e) => payment_error_response(&e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Payments",
    get,
    path = "/payments/confirm",
    params(ConfirmQuery),
    responses(
        (status = 200, description = "Gateway state recorded", body = ConfirmResponse),
        (status = 400, description = "Missing or invalid reference", body = ErrorResponse),
        (status = 404, description = "Reference unknown to the gateway", body = ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = ErrorResponse)
    )
)]
pub async fn confirm_payment(
    data: web::Data<AppState>,
    query: web::Query<ConfirmQuery>,
) -> impl Responder {
    let Some(ref_payco) = query.ref_payco.as_deref().filter(|r| !r.trim().is_empty()) else {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request("ref_payco es requerido"));
    };
    log::info!("Confirming payment reference {}", ref_payco);

    let payload = match data.gateway.fetch_reference(ref_payco).await {
        Ok(payload) => payload,
        Err(e) => return gateway_error_response(&e),
    };

    match data.payments.record_payload(payload).await {
        Ok(transaction) => HttpResponse::Ok().json(ConfirmResponse {
            success: true,
            status: transaction.status,
            transaction,
        }),
        Err(e) => payment_error_response(&e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Payments",
    get,
    path = "/payments/status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Current status, with a download URL once paid", body = StatusResponse),
        (status = 400, description = "Neither token nor ref_payco given, or token invalid", body = ErrorResponse),
        (status = 403, description = "Download already used or expired", body = StatusResponse),
        (status = 404, description = "No transaction for this token", body = ErrorResponse)
    )
)]
pub async fn get_transaction_status(
    data: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> impl Responder {
    transaction_status(&data, query.into_inner()).await
}

#[utoipa::path(
    context_path = "/api",
    tag = "Payments",
    post,
    path = "/payments/status",
    request_body = StatusQuery,
    responses(
        (status = 200, description = "Current status, with a download URL once paid", body = StatusResponse),
        (status = 400, description = "Neither token nor ref_payco given, or token invalid", body = ErrorResponse),
        (status = 403, description = "Download already used or expired", body = StatusResponse),
        (status = 404, description = "No transaction for this token", body = ErrorResponse)
    )
)]
pub async fn post_transaction_status(
    data: web::Data<AppState>,
    body: web::Json<StatusQuery>,
) -> impl Responder {
    transaction_status(&data, body.into_inner()).await
}

async fn transaction_status(data: &AppState, query: StatusQuery) -> HttpResponse {
    let transaction = match (query.token.as_deref(), query.ref_payco.as_deref()) {
        (Some(raw_token), _) => {
            let mut errors = ValidationErrors::new();
            let Some(token) = validate_token(Some(raw_token), "token", &mut errors) else {
                return HttpResponse::BadRequest().json(
                    ErrorResponse::validation("Token inválido", errors.to_details()),
                );
            };
            log::info!("Status poll for token {}...", token.log_prefix());
            data.payments.get_transaction(&token).await
        }
        (None, Some(ref_payco)) if !ref_payco.trim().is_empty() => {
            log::info!("Status poll for reference {}", ref_payco);
            resolve_by_reference(data, ref_payco.trim()).await
        }
        _ => {
            return HttpResponse::BadRequest()
                .json(ErrorResponse::bad_request("Se requiere token o ref_payco"));
        }
    };

    let transaction = match transaction {
        Ok(Some(transaction)) => transaction,
        Ok(None) => {
            log::info!("No transaction found for status poll");
            return HttpResponse::NotFound()
                .json(ErrorResponse::not_found("Transacción no encontrada"));
        }
        Err(e) => return payment_error_response(&e),
    };

    if transaction.status != TransactionStatus::Success {
        return HttpResponse::Ok().json(StatusResponse {
            status: transaction.status,
            details: transaction,
            download_url: None,
            message: None,
        });
    }

    let decision = data
        .downloads
        .authorize(
            &transaction.token,
            data.payment_options.as_ref(),
            data.storage.as_ref(),
        )
        .await;

    match decision {
        Ok(DownloadDecision::Authorized { url, .. }) => HttpResponse::Ok().json(StatusResponse {
            status: TransactionStatus::Success,
            details: transaction,
            download_url: Some(url),
            message: None,
        }),
        Ok(DownloadDecision::Denied) => HttpResponse::Forbidden().json(StatusResponse {
            status: TransactionStatus::Expired,
            details: transaction,
            download_url: None,
            message: Some(DOWNLOAD_DENIED_MESSAGE.to_string()),
        }),
        Err(e) => {
            log::error!("Download authorization failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Error al autorizar la descarga"))
        }
    }
}

/// Find the transaction for a gateway reference, asking the gateway and
/// recording its answer when it has not been seen locally yet.
async fn resolve_by_reference(
    data: &AppState,
    ref_payco: &str,
) -> Result<Option<Transaction>, PaymentError> {
    if let Some(transaction) = data.payments.find_by_ref_payco(ref_payco).await? {
        return Ok(Some(transaction));
    }
    let payload = data.gateway.fetch_reference(ref_payco).await?;
    Ok(Some(data.payments.record_payload(payload).await?))
}

/// JSON extractor config for the payment option endpoint: non-JSON bodies
/// get a 415, malformed JSON a 400.
pub fn payment_option_json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        let response = match &err {
            JsonPayloadError::ContentType => HttpResponse::UnsupportedMediaType().json(
                ErrorResponse::new("UnsupportedMediaType", "Content-Type debe ser application/json"),
            ),
            other => HttpResponse::BadRequest()
                .json(ErrorResponse::bad_request(&format!("JSON inválido: {}", other))),
        };
        InternalError::from_response(err, response).into()
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Payments",
    post,
    path = "/payment-options",
    request_body = PaymentOptionRequest,
    responses(
        (status = 200, description = "Option saved", body = PaymentOptionResponse),
        (status = 400, description = "Invalid token or option", body = ErrorResponse),
        (status = 415, description = "Body is not JSON", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn save_payment_option(
    data: web::Data<AppState>,
    body: web::Json<PaymentOptionRequest>,
) -> impl Responder {
    let started = Instant::now();
    log::info!("Saving payment option");

    let mut errors = ValidationErrors::new();
    let token = validate_token(body.token.as_deref(), "token", &mut errors);
    let option = validate_payment_choice(body.option.as_deref(), "option", &mut errors);

    let (Some(token), Some(option)) = (token, option) else {
        log::warn!("Rejected payment option: {}", errors);
        return HttpResponse::BadRequest()
            .json(ErrorResponse::validation("Datos inválidos", errors.to_details()));
    };

    let now = chrono::Utc::now();
    match data
        .payment_options
        .upsert_payment_option(&token, option, now)
        .await
    {
        Ok(saved) => {
            log::info!(
                "Saved option {} for token {}...",
                saved.option.as_str(),
                token.log_prefix()
            );
            HttpResponse::Ok().json(PaymentOptionResponse {
                success: true,
                message: "Opción guardada con éxito".to_string(),
                metadata: ProcessingMetadata {
                    processing_time_ms: started.elapsed().as_millis() as u64,
                    timestamp: now.to_rfc3339(),
                },
            })
        }
        Err(e) => {
            log::error!("Failed to save payment option: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Error al guardar la opción de pago"))
        }
    }
}
