//! Pipeline counters, exposed in the prometheus text format.

use actix_web::{HttpResponse, Responder};
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

use crate::payment::models::TransactionStatus;

lazy_static! {
    static ref DOCUMENT_GENERATIONS: IntCounterVec = register_int_counter_vec!(
        "lexagen_document_generations_total",
        "Document generation requests by outcome",
        &["outcome"]
    )
    .expect("Failed to register document generation counter");
    static ref PAYMENT_NOTIFICATIONS: IntCounterVec = register_int_counter_vec!(
        "lexagen_payment_notifications_total",
        "Recorded payment notifications by resulting status",
        &["status"]
    )
    .expect("Failed to register payment notification counter");
    static ref DOWNLOAD_DECISIONS: IntCounterVec = register_int_counter_vec!(
        "lexagen_download_decisions_total",
        "Download gate decisions",
        &["decision"]
    )
    .expect("Failed to register download decision counter");
}

pub fn record_generation(outcome: &str) {
    DOCUMENT_GENERATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_payment_status(status: TransactionStatus) {
    PAYMENT_NOTIFICATIONS
        .with_label_values(&[status.as_str()])
        .inc();
}

pub fn record_download(granted: bool) {
    let decision = if granted { "authorized" } else { "denied" };
    DOWNLOAD_DECISIONS.with_label_values(&[decision]).inc();
}

pub async fn pipeline_metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        log::error!("Failed to encode pipeline metrics: {}", e);
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
