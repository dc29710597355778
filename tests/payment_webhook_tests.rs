mod common;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use lexagen_server::configure_routes;
use lexagen_server::db::TransactionStore;
use lexagen_server::token::DocumentToken;
use serde_json::{json, Value};

use common::{setup_test_context, webhook_payload};

#[actix_web::test]
async fn test_form_encoded_webhook_is_recorded() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/payments/webhook")
        .set_form([
            ("x_ref_payco", "88001"),
            ("x_transaction_id", "55001"),
            ("x_extra1", "form-token"),
            ("x_cod_response", "2"),
            ("x_amount", "12000.5"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": true, "status": "rejected"}));

    let token = DocumentToken::parse("form-token").unwrap();
    let tx = ctx.store.get_transaction(&token).await.unwrap().unwrap();
    assert_eq!(tx.valor, 12000.5);
    assert_eq!(tx.metodo_pago, "ePayco");
    assert_eq!(tx.descripcion, "Documento Legal");
    assert_eq!(tx.raw["x_transaction_id"], "55001");
}

#[actix_web::test]
async fn test_redelivered_webhook_is_idempotent() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;
    let token = DocumentToken::parse("dup-token").unwrap();

    let mut snapshots = Vec::new();
    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/api/payments/webhook")
            .set_json(webhook_payload(token.as_str(), "1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let tx = ctx.store.get_transaction(&token).await.unwrap().unwrap();
        snapshots.push(serde_json::to_value(&tx).unwrap());
    }
    assert!(snapshots.windows(2).all(|pair| pair[0] == pair[1]));
}

#[actix_web::test]
async fn test_unknown_code_is_accepted() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/payments/webhook")
        .set_json(webhook_payload("odd-code", "77"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "unknown");
}

#[actix_web::test]
async fn test_missing_fields_are_rejected_without_write() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/payments/webhook")
        .set_json(json!({ "x_extra1": "lonely-token", "x_cod_response": "1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["details"]["x_ref_payco"].is_string());
    assert!(body["details"]["x_transaction_id"].is_string());

    let token = DocumentToken::parse("lonely-token").unwrap();
    assert!(ctx.store.get_transaction(&token).await.unwrap().is_none());
}

#[actix_web::test]
async fn test_path_like_token_is_rejected() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/payments/webhook")
        .set_json(webhook_payload("../other/documento.pdf", "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_status_requires_token_or_reference() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/api/payments/status").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/payments/status?token=bad%23token")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/payments/status?token=never-seen")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_status_by_reference_asks_gateway() {
    let ctx = setup_test_context();
    ctx.gateway.insert(
        "REF-900",
        json!({
            "x_ref_payco": "REF-900",
            "x_transaction_id": "TX-900",
            "x_extra1": "gw-token",
            "x_cod_response": 3
        }),
    );
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::get()
        .uri("/api/payments/status?ref_payco=REF-900")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["details"]["token"], "gw-token");

    let req = test::TestRequest::get()
        .uri("/api/payments/status?ref_payco=REF-404")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_confirm_payment_records_gateway_state() {
    let ctx = setup_test_context();
    ctx.gateway.insert(
        "REF-1",
        json!({
            "x_ref_payco": "REF-1",
            "x_transaction_id": "TX-1",
            "x_id_invoice": "invoice-token",
            "x_cod_response": "1",
            "x_amount": 50000
        }),
    );
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::get()
        .uri("/api/payments/confirm?ref_payco=REF-1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["transaction"]["valor"], 50000.0);

    let req = test::TestRequest::get().uri("/api/payments/confirm").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_payment_option_validation() {
    let ctx = setup_test_context();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/payment-options")
        .insert_header(("content-type", "text/plain"))
        .set_payload("token=abc&option=pdf")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );

    let req = test::TestRequest::post()
        .uri("/api/payment-options")
        .set_json(json!({ "token": "a b", "option": "docx" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Datos inválidos");
    assert!(body["details"]["token"].is_string());
    assert!(body["details"]["option"].is_string());

    let req = test::TestRequest::post()
        .uri("/api/payment-options")
        .set_json(json!({ "token": "x".repeat(1501), "option": "pdf" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/payment-options")
        .set_json(json!({ "token": "good-token", "option": "pdf" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Opción guardada con éxito");
    assert!(body["metadata"]["processingTime"].is_u64());
    assert!(body["metadata"]["timestamp"].is_string());
}
