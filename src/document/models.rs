use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentRequest {
    #[serde(rename = "formData")]
    #[schema(value_type = Object)]
    pub form_data: Value,
}

/// Follow-up question for a field the model found insufficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationQuestion {
    pub field: String,
    pub question: String,
}

/// Decoded completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletenessVerdict {
    Complete,
    NeedsInput(Vec<ValidationQuestion>),
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerationOutcome {
    Incomplete {
        questions: Vec<ValidationQuestion>,
    },
    Complete {
        #[serde(rename = "previewUrl")]
        preview_url: String,
        #[serde(rename = "downloadToken")]
        download_token: String,
    },
}
