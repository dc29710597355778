#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use lexagen_server::db::{Capabilities, MemoryStore};
use lexagen_server::document::llm::{LanguageModel, LlmError};
use lexagen_server::document::orchestrator::PipelineSettings;
use lexagen_server::document::prompts::{COMPLETENESS_PROMPT, COMPLETE_MARKER};
use lexagen_server::document::render::{DocumentRenderer, RenderError, RenderedDocument};
use lexagen_server::payment::gateway::{GatewayError, PaymentGateway};
use lexagen_server::storage::InMemoryStorage;
use lexagen_server::AppState;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Intakes whose `detalles` is shorter than this get follow-up questions.
pub const MIN_DETAILS_LEN: usize = 40;

pub const QUESTIONS_REPLY: &str =
    r#"[{"field":"detalles","question":"¿Qué solicitud concreta desea presentar?"}]"#;

/// Language model fake: judges completeness by the length of `detalles`
/// and drafts a fixed Markdown document.
#[derive(Default)]
pub struct FakeLanguageModel {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn invoke(&self, role_prompt: &str, context: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(role_prompt.to_string());

        if role_prompt == COMPLETENESS_PROMPT {
            let intake: Value = serde_json::from_str(context).unwrap_or(Value::Null);
            let details = intake
                .get("detalles")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if details.chars().count() >= MIN_DETAILS_LEN {
                return Ok(COMPLETE_MARKER.to_string());
            }
            return Ok(QUESTIONS_REPLY.to_string());
        }

        Ok("# Derecho de Petición\n\nSeñores entidad,\n\nSolicito respuesta de fondo.".to_string())
    }
}

/// Renderer fake: a real multi-page PDF built with lopdf and a minimal
/// zip container standing in for the DOCX.
pub struct FakeRenderer {
    pub pages: usize,
}

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn render(&self, markdown: &str) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            pdf: sample_pdf(self.pages, markdown),
            docx: sample_docx(markdown),
        })
    }
}

/// Gateway fake answering from a fixed table of references.
#[derive(Default)]
pub struct FakeGateway {
    pub references: Mutex<HashMap<String, Map<String, Value>>>,
}

impl FakeGateway {
    pub fn insert(&self, ref_payco: &str, payload: Value) {
        if let Value::Object(map) = payload {
            self.references.lock().insert(ref_payco.to_string(), map);
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn fetch_reference(&self, ref_payco: &str) -> Result<Map<String, Value>, GatewayError> {
        self.references
            .lock()
            .get(ref_payco)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected("Referencia no encontrada".to_string()))
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<InMemoryStorage>,
    pub llm: Arc<FakeLanguageModel>,
    pub gateway: Arc<FakeGateway>,
}

pub fn setup_test_context() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let storage = Arc::new(InMemoryStorage::new());
    let llm = Arc::new(FakeLanguageModel::default());
    let gateway = Arc::new(FakeGateway::default());

    let capabilities = Capabilities {
        storage: storage.clone(),
        llm: llm.clone(),
        renderer: Arc::new(FakeRenderer { pages: 2 }),
        gateway: gateway.clone(),
    };
    let settings = PipelineSettings {
        capability_timeout: Duration::from_secs(10),
        ..PipelineSettings::default()
    };

    TestContext {
        state: web::Data::new(AppState::new_with_store(store.clone(), capabilities, settings)),
        store,
        storage,
        llm,
        gateway,
    }
}

pub fn sample_pdf(page_count: usize, text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let first_line = text.lines().next().unwrap_or_default().to_string();
    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 760.into()]),
                Operation::new("Tj", vec![Object::string_literal(first_line.clone())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn sample_docx(markdown: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(markdown.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn complete_intake() -> Value {
    serde_json::json!({
        "tipoDocumento": "Derecho de Petición",
        "nombre": "Ana Pérez",
        "identificacion": "1020304050",
        "ciudad": "Bogotá",
        "entidad": "EPS Salud Total",
        "detalles": "El 3 de marzo de 2024 solicité la autorización de una cirugía y a la fecha no he recibido respuesta. Pido que se autorice el procedimiento."
    })
}

pub fn incomplete_intake() -> Value {
    serde_json::json!({
        "tipoDocumento": "Derecho de Petición",
        "nombre": "Ana Pérez",
        "detalles": "tengo un problema"
    })
}

/// Webhook body for `token` with the given response code.
pub fn webhook_payload(token: &str, code: &str) -> Value {
    serde_json::json!({
        "x_ref_payco": format!("REF-{}", token),
        "x_transaction_id": format!("TX-{}", token),
        "x_extra1": token,
        "x_cod_response": code,
        "x_amount": "35000",
        "x_transaction_date": "2024-03-05 14:22:01"
    })
}
