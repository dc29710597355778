//! Document generation pipeline.
//!
//! - `completeness` - decoding of the validation reply
//! - `prompts` - fixed role prompts
//! - `llm` - language model capability
//! - `render` - Markdown to PDF/DOCX capability
//! - `preview` - lower-half redaction of the full PDF
//! - `package` - zip bundle
//! - `artifact` - blob names and storage paths
//! - `orchestrator` - the end-to-end flow

pub mod artifact;
pub mod completeness;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod package;
pub mod preview;
pub mod prompts;
pub mod render;
