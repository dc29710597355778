//! Two-phase generation: completeness check, then drafting, rendering,
//! redaction, packaging and upload.

use futures::try_join;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::artifact::Artifact;
use super::completeness::parse_verdict;
use super::llm::{LanguageModel, LlmError};
use super::models::{CompletenessVerdict, GenerationOutcome};
use super::package::{package_documents, PackageError};
use super::preview::{PreviewError, PreviewRedactor, RedactionPolicy};
use super::prompts::{drafting_prompt, COMPLETENESS_PROMPT};
use super::render::{DocumentRenderer, RenderError};
use crate::metrics;
use crate::storage::ObjectStorage;
use crate::token::DocumentToken;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid intake: {0}")]
    InvalidIntake(String),
    #[error("could not interpret the validation reply: {0}")]
    ValidationParse(String),
    #[error("the language model returned an empty document")]
    EmptyGeneration,
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{step} timed out")]
    Timeout { step: &'static str },
    #[error("internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Label used for the failure counter.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIntake(_) => "invalid_intake",
            Self::ValidationParse(_) => "validation_parse",
            Self::EmptyGeneration => "empty_generation",
            Self::Llm(_) => "llm",
            Self::Render(_) => "render",
            Self::Preview(_) => "preview",
            Self::Package(_) => "package",
            Self::Storage(_) => "storage",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound for each external call.
    pub capability_timeout: Duration,
    pub preview_ttl_secs: u64,
    pub redaction: RedactionPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            capability_timeout: Duration::from_secs(120),
            preview_ttl_secs: 300,
            redaction: RedactionPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct DocumentPipeline {
    llm: Arc<dyn LanguageModel + Send + Sync>,
    renderer: Arc<dyn DocumentRenderer + Send + Sync>,
    storage: Arc<dyn ObjectStorage + Send + Sync>,
    redactor: PreviewRedactor,
    settings: PipelineSettings,
}

impl DocumentPipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel + Send + Sync>,
        renderer: Arc<dyn DocumentRenderer + Send + Sync>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            llm,
            renderer,
            storage,
            redactor: PreviewRedactor::new(settings.redaction.clone()),
            settings,
        }
    }

    pub async fn process(&self, form_data: &Value) -> Result<GenerationOutcome, GenerationError> {
        let result = self.run(form_data).await;
        match &result {
            Ok(GenerationOutcome::Complete { .. }) => metrics::record_generation("complete"),
            Ok(GenerationOutcome::Incomplete { .. }) => metrics::record_generation("incomplete"),
            Err(e) => metrics::record_generation(e.kind()),
        }
        result
    }

    async fn run(&self, form_data: &Value) -> Result<GenerationOutcome, GenerationError> {
        if !form_data.is_object() {
            return Err(GenerationError::InvalidIntake(
                "formData debe ser un objeto JSON".to_string(),
            ));
        }
        let context = serde_json::to_string(form_data)
            .map_err(|e| GenerationError::Internal(e.to_string()))?;

        let reply = self
            .bounded("validation", self.llm.invoke(COMPLETENESS_PROMPT, &context))
            .await?;
        match parse_verdict(&reply).map_err(GenerationError::ValidationParse)? {
            CompletenessVerdict::NeedsInput(questions) => {
                log::info!("Intake incomplete, returning {} questions", questions.len());
                return Ok(GenerationOutcome::Incomplete { questions });
            }
            CompletenessVerdict::Complete => {}
        }

        let document_type = form_data.get("tipoDocumento").and_then(Value::as_str);
        let prompt = drafting_prompt(document_type);
        let markdown = self
            .bounded("drafting", self.llm.invoke(&prompt, &context))
            .await?;
        if markdown.trim().is_empty() {
            return Err(GenerationError::EmptyGeneration);
        }

        let rendered = self
            .bounded("render", self.renderer.render(&markdown))
            .await?;

        let token = DocumentToken::mint();

        let redactor = self.redactor.clone();
        let full_pdf = rendered.pdf.clone();
        let preview = tokio::task::spawn_blocking(move || redactor.redact(&full_pdf))
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))??;

        let archive = package_documents(&rendered.pdf, &rendered.docx)?;

        try_join!(
            self.upload(&token, Artifact::FullPdf, &rendered.pdf),
            self.upload(&token, Artifact::Preview, &preview),
        )?;
        self.upload(&token, Artifact::Docx, &rendered.docx).await?;
        self.upload(&token, Artifact::Archive, &archive).await?;

        let preview_path = Artifact::Preview.path(&token);
        let preview_url = self
            .bounded("sign", async {
                self.storage
                    .signed_url(&preview_path, self.settings.preview_ttl_secs)
                    .await
                    .map_err(GenerationError::Storage)
            })
            .await?;

        log::info!("Generated document set for token {}...", token.log_prefix());
        Ok(GenerationOutcome::Complete {
            preview_url,
            download_token: token.to_string(),
        })
    }

    async fn upload(
        &self,
        token: &DocumentToken,
        artifact: Artifact,
        data: &[u8],
    ) -> Result<(), GenerationError> {
        let path = artifact.path(token);
        self.bounded("upload", async {
            self.storage
                .upload_file(&path, data, artifact.content_type())
                .await
                .map_err(GenerationError::Storage)
        })
        .await
    }

    /// Run one external call under the capability timeout.
    async fn bounded<T, E, F>(&self, step: &'static str, call: F) -> Result<T, GenerationError>
    where
        F: Future<Output = Result<T, E>>,
        GenerationError: From<E>,
    {
        match tokio::time::timeout(self.settings.capability_timeout, call).await {
            Ok(result) => result.map_err(GenerationError::from),
            Err(_) => {
                log::error!("{} exceeded {:?}", step, self.settings.capability_timeout);
                Err(GenerationError::Timeout { step })
            }
        }
    }
}
