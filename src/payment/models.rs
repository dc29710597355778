use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::PaymentError;
use crate::token::DocumentToken;

/// Payment status of a transaction, as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Rejected,
    Canceled,
    Failed,
    Reversed,
    Held,
    Expired,
    Abandoned,
    Unknown,
}

impl TransactionStatus {
    /// Map an ePayco `x_cod_response` value onto a status. This is the only
    /// place the gateway codes are interpreted.
    pub fn from_gateway_code(code: &str) -> Self {
        match code.trim().parse::<u32>() {
            Ok(1) => Self::Success,
            Ok(2) => Self::Rejected,
            Ok(3) | Ok(8) => Self::Pending,
            Ok(4) => Self::Failed,
            Ok(6) => Self::Reversed,
            Ok(7) => Self::Held,
            Ok(9) => Self::Expired,
            Ok(10) => Self::Abandoned,
            Ok(11) => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Reversed => "reversed",
            Self::Held => "held",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of `as_str`, used when reading rows back.
    pub fn from_db(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "success" => Self::Success,
            "rejected" => Self::Rejected,
            "canceled" => Self::Canceled,
            "failed" => Self::Failed,
            "reversed" => Self::Reversed,
            "held" => Self::Held,
            "expired" => Self::Expired,
            "abandoned" => Self::Abandoned,
            _ => Self::Unknown,
        }
    }
}

/// Durable payment record, keyed by document token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[schema(value_type = String)]
    pub token: DocumentToken,
    pub status: TransactionStatus,
    pub transaction_id: Option<String>,
    pub ref_payco: Option<String>,
    pub valor: f64,
    pub metodo_pago: String,
    pub descripcion: String,
    pub fecha: String,
    #[schema(value_type = Object)]
    pub raw: Value,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_DESCRIPTION: &str = "Documento Legal";
pub const PAYMENT_METHOD: &str = "ePayco";

/// A gateway confirmation, normalized from a webhook body or a validation
/// API response. Fields the gateway did not send stay `None` so a merge can
/// preserve what is already stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotification {
    pub token: DocumentToken,
    pub ref_payco: String,
    pub transaction_id: String,
    pub status: Option<TransactionStatus>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub transaction_date: Option<String>,
    pub raw: Value,
}

impl PaymentNotification {
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, PaymentError> {
        let ref_payco = field(&payload, "x_ref_payco");
        let transaction_id = field(&payload, "x_transaction_id");
        let raw_token = field(&payload, "x_extra1").or_else(|| field(&payload, "x_id_invoice"));

        let mut missing = Vec::new();
        if ref_payco.is_none() {
            missing.push("x_ref_payco");
        }
        if transaction_id.is_none() {
            missing.push("x_transaction_id");
        }
        if raw_token.is_none() {
            missing.push("x_extra1");
        }

        let (Some(ref_payco), Some(transaction_id), Some(raw_token)) =
            (ref_payco, transaction_id, raw_token)
        else {
            return Err(PaymentError::MissingFields(missing));
        };

        let token = DocumentToken::parse(&raw_token)?;

        Ok(Self {
            token,
            ref_payco,
            transaction_id,
            status: field(&payload, "x_cod_response")
                .map(|code| TransactionStatus::from_gateway_code(&code)),
            amount: field(&payload, "x_amount").and_then(|v| v.parse::<f64>().ok()),
            description: field(&payload, "x_description"),
            transaction_date: field(&payload, "x_transaction_date"),
            raw: Value::Object(payload),
        })
    }
}

/// Read a gateway field as a non-empty string. The gateway sends some
/// numeric fields as JSON numbers and others as strings.
fn field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Bundle the client chose before paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PaymentChoice {
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "pdf-word")]
    PdfWord,
}

impl PaymentChoice {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pdf" => Some(Self::Pdf),
            "pdf-word" => Some(Self::PdfWord),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PdfWord => "pdf-word",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    #[schema(value_type = String)]
    pub token: DocumentToken,
    pub option: PaymentChoice,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
