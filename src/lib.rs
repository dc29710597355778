use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod db;
pub mod document;
pub mod download;
pub mod health;
pub mod metrics;
pub mod payment;
pub mod storage;
pub mod token;
pub mod validation;

pub use crate::db::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }

    /// Bad request carrying a field → message map.
    pub fn validation(message: &str, details: BTreeMap<String, String>) -> Self {
        Self::new("ValidationError", message).with_details(details)
    }

    pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::document::handlers::process_document_request,
        crate::payment::handlers::payment_webhook,
        crate::payment::handlers::confirm_payment,
        crate::payment::handlers::get_transaction_status,
        crate::payment::handlers::post_transaction_status,
        crate::payment::handlers::save_payment_option,
        crate::health::storage_health
    ),
    components(
        schemas(
            document::models::DocumentRequest,
            document::models::ValidationQuestion,
            document::models::GenerationOutcome,
            payment::models::Transaction,
            payment::models::TransactionStatus,
            payment::models::PaymentChoice,
            payment::handlers::WebhookResponse,
            payment::handlers::ConfirmResponse,
            payment::handlers::StatusQuery,
            payment::handlers::StatusResponse,
            payment::handlers::PaymentOptionRequest,
            payment::handlers::PaymentOptionResponse,
            payment::handlers::ProcessingMetadata,
            health::StorageHealth,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Documents", description = "Intake validation and document generation."),
        (name = "Payments", description = "Payment confirmation, status and delivery."),
        (name = "Health", description = "Dependency probes.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost")
    )
)]
pub struct ApiDoc;

/// Register every HTTP route. Shared by the server and the integration tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/documents")
                    .route(web::post().to(document::handlers::process_document_request)),
            )
            .service(
                web::resource("/payments/webhook")
                    .route(web::post().to(payment::handlers::payment_webhook)),
            )
            .service(
                web::resource("/payments/confirm")
                    .route(web::get().to(payment::handlers::confirm_payment)),
            )
            .service(
                web::resource("/payments/status")
                    .route(web::get().to(payment::handlers::get_transaction_status))
                    .route(web::post().to(payment::handlers::post_transaction_status)),
            )
            .service(
                web::resource("/payment-options")
                    .app_data(payment::handlers::payment_option_json_config())
                    .route(web::post().to(payment::handlers::save_payment_option)),
            )
            .service(
                web::resource("/health/storage").route(web::get().to(health::storage_health)),
            ),
    )
    .service(web::resource("/metrics/pipeline").route(web::get().to(metrics::pipeline_metrics)));
}

const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "http://127.0.0.1:8080",
];

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::AppConfig::from_env()?;
    let app_state = match AppState::new_with_config(&config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!(
                "Failed to initialise application state. Check DATABASE_URL and the storage settings in .env. Error: {}",
                e
            );
            anyhow::bail!("startup failed: {}", e);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("lexagen_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create Prometheus metrics middleware: {}", e))?;

    let allowed_origins: Vec<String> = if config.allowed_origins.is_empty() {
        DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()
    } else {
        config.allowed_origins.clone()
    };

    log::info!(
        "Starting server at http://{}:{}",
        config.bind_address,
        config.port
    );

    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
