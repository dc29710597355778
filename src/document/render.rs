//! Markdown rendering engine.
//!
//! Handles writing the drafted Markdown to a temporary directory, invoking
//! pandoc for the PDF and DOCX outputs, and reading the results back.

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;

use super::artifact::{has_expected_magic, Artifact};
use crate::config::RenderConfig;

const SOURCE_FILENAME: &str = "document.md";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write markdown source: {0}")]
    WriteSource(#[source] std::io::Error),
    #[error("{tool} execution failed: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with status {code}: {stderr}")]
    Exit {
        tool: String,
        code: i32,
        stderr: String,
    },
    #[error("failed to read rendered {0}: {1}")]
    ReadOutput(&'static str, #[source] std::io::Error),
    #[error("rendered {0} is not a valid file")]
    UnexpectedOutput(&'static str),
}

/// Both renditions of one drafted document.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub pdf: Vec<u8>,
    pub docx: Vec<u8>,
}

#[async_trait]
pub trait DocumentRenderer {
    async fn render(&self, markdown: &str) -> Result<RenderedDocument, RenderError>;
}

/// Renders Markdown through the pandoc CLI, one temporary directory per call.
///
/// Child processes are killed when the render future is dropped, so a
/// caller-side timeout also stops pandoc.
#[derive(Debug, Clone, Default)]
pub struct PandocRenderEngine {
    config: RenderConfig,
}

impl PandocRenderEngine {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    async fn convert(
        &self,
        temp_dir: &TempDir,
        output_filename: &'static str,
        extra_args: &[&str],
    ) -> Result<Vec<u8>, RenderError> {
        let output_path = temp_dir.path().join(output_filename);

        let output = Command::new(&self.config.pandoc_bin)
            .arg(SOURCE_FILENAME)
            .arg("-o")
            .arg(&output_path)
            .args(extra_args)
            .current_dir(temp_dir.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                tool: self.config.pandoc_bin.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Exit {
                tool: self.config.pandoc_bin.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fs::read(&output_path)
            .await
            .map_err(|e| RenderError::ReadOutput(output_filename, e))
    }
}

#[async_trait]
impl DocumentRenderer for PandocRenderEngine {
    async fn render(&self, markdown: &str) -> Result<RenderedDocument, RenderError> {
        let temp_dir = tempdir().map_err(RenderError::TempDir)?;
        fs::write(temp_dir.path().join(SOURCE_FILENAME), markdown)
            .await
            .map_err(RenderError::WriteSource)?;

        let pdf_engine = format!("--pdf-engine={}", self.config.pdf_engine);
        let pdf = self
            .convert(&temp_dir, "document.pdf", &[pdf_engine.as_str()])
            .await?;
        if !has_expected_magic(Artifact::FullPdf, &pdf) {
            return Err(RenderError::UnexpectedOutput("pdf"));
        }

        let docx = self.convert(&temp_dir, "document.docx", &[]).await?;
        if !has_expected_magic(Artifact::Docx, &docx) {
            return Err(RenderError::UnexpectedOutput("docx"));
        }

        Ok(RenderedDocument { pdf, docx })
    }
}
