//! Decoding of the completeness check reply.

use super::models::{CompletenessVerdict, ValidationQuestion};
use super::prompts::COMPLETE_MARKER;

/// Decode the model's reply. Only the exact marker or a non-empty JSON
/// array of `{field, question}` objects is accepted; the error carries a
/// short reason for the logs.
pub fn parse_verdict(reply: &str) -> Result<CompletenessVerdict, String> {
    let reply = reply.trim();
    if reply == COMPLETE_MARKER {
        return Ok(CompletenessVerdict::Complete);
    }

    let questions: Vec<ValidationQuestion> = serde_json::from_str(reply)
        .map_err(|e| format!("reply is neither the marker nor a question list: {}", e))?;

    if questions.is_empty() {
        return Err("question list is empty".to_string());
    }
    if questions
        .iter()
        .any(|q| q.field.trim().is_empty() || q.question.trim().is_empty())
    {
        return Err("question with blank field or text".to_string());
    }

    Ok(CompletenessVerdict::NeedsInput(questions))
}
