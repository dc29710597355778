use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::models::{PaymentNotification, Transaction};
use super::PaymentError;
use crate::db::TransactionStore;
use crate::metrics;
use crate::token::DocumentToken;

/// Sole writer of transaction records. Every notification, pushed or
/// pulled, goes through `record_transaction`.
#[derive(Clone)]
pub struct PaymentStateMachine {
    store: Arc<dyn TransactionStore + Send + Sync>,
}

impl PaymentStateMachine {
    pub fn new(store: Arc<dyn TransactionStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Normalize a raw gateway payload and record it.
    pub async fn record_payload(
        &self,
        payload: Map<String, Value>,
    ) -> Result<Transaction, PaymentError> {
        let notification = PaymentNotification::from_payload(payload)?;
        self.record_transaction(notification).await
    }

    pub async fn record_transaction(
        &self,
        notification: PaymentNotification,
    ) -> Result<Transaction, PaymentError> {
        let transaction = self
            .store
            .upsert_transaction(&notification, Utc::now())
            .await?;

        metrics::record_payment_status(transaction.status);
        log::info!(
            "Recorded transaction {} for token {}... with status {}",
            notification.transaction_id,
            transaction.token.log_prefix(),
            transaction.status.as_str()
        );
        Ok(transaction)
    }

    pub async fn get_transaction(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<Transaction>, PaymentError> {
        Ok(self.store.get_transaction(token).await?)
    }

    pub async fn find_by_ref_payco(
        &self,
        ref_payco: &str,
    ) -> Result<Option<Transaction>, PaymentError> {
        Ok(self.store.find_by_ref_payco(ref_payco).await?)
    }
}
