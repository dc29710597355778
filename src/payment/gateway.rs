//! ePayco validation API client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid payment reference")]
    InvalidReference,
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway responded with status {0}")]
    Status(u16),
    #[error("gateway did not confirm the reference: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PaymentGateway {
    /// Fetch the gateway's current view of a payment, as the same `x_*`
    /// field map a webhook would carry.
    async fn fetch_reference(&self, ref_payco: &str) -> Result<Map<String, Value>, GatewayError>;
}

pub struct EpaycoClient {
    validation_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ValidationResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    title_response: Option<String>,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

impl EpaycoClient {
    pub fn new(validation_url: String, client: reqwest::Client) -> Self {
        Self {
            validation_url: validation_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

fn is_valid_reference(ref_payco: &str) -> bool {
    !ref_payco.is_empty()
        && ref_payco.len() <= 128
        && ref_payco
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl PaymentGateway for EpaycoClient {
    async fn fetch_reference(&self, ref_payco: &str) -> Result<Map<String, Value>, GatewayError> {
        let ref_payco = ref_payco.trim();
        if !is_valid_reference(ref_payco) {
            return Err(GatewayError::InvalidReference);
        }

        let url = format!("{}/{}", self.validation_url, ref_payco);
        log::debug!("Querying ePayco reference {}", ref_payco);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status().as_u16()));
        }

        let body: ValidationResponse = response.json().await?;
        match body.data {
            Some(data) if body.success => Ok(data),
            _ => Err(GatewayError::Rejected(
                body.title_response
                    .unwrap_or_else(|| "sin datos".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_validation() {
        assert!(is_valid_reference("123456789"));
        assert!(is_valid_reference("abc-DEF_1"));
        assert!(!is_valid_reference(""));
        assert!(!is_valid_reference("../admin"));
        assert!(!is_valid_reference("a b"));
    }

    #[tokio::test]
    async fn test_fetch_reference_returns_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/validation/v1/reference/REF123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"success":true,"title_response":"OK","data":{"x_ref_payco":"REF123","x_cod_response":1,"x_extra1":"tok"}}"#,
            )
            .create_async()
            .await;

        let client = EpaycoClient::new(
            format!("{}/validation/v1/reference/", server.url()),
            reqwest::Client::new(),
        );
        let data = client.fetch_reference("REF123").await.unwrap();

        assert_eq!(data["x_extra1"], "tok");
        assert_eq!(data["x_cod_response"], 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unsuccessful_validation_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/ref/NOPE")
            .with_status(200)
            .with_body(r#"{"success":false,"title_response":"Referencia no encontrada"}"#)
            .create_async()
            .await;

        let client = EpaycoClient::new(format!("{}/ref", server.url()), reqwest::Client::new());
        let err = client.fetch_reference("NOPE").await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(msg) if msg == "Referencia no encontrada"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/ref/R1")
            .with_status(502)
            .create_async()
            .await;

        let client = EpaycoClient::new(format!("{}/ref", server.url()), reqwest::Client::new());
        assert!(matches!(
            client.fetch_reference("R1").await,
            Err(GatewayError::Status(502))
        ));
    }
}
