//! In-process store with the same merge and gating semantics as the
//! Postgres tables. Each operation holds the map lock for its whole
//! read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::{DownloadLedger, PaymentOptionStore, StoreError, TransactionStore};
use crate::payment::models::{
    PaymentChoice, PaymentNotification, PaymentOption, Transaction, TransactionStatus,
    DEFAULT_DESCRIPTION, PAYMENT_METHOD,
};
use crate::token::DocumentToken;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    pub descargado: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    transactions: Mutex<HashMap<DocumentToken, Transaction>>,
    payment_options: Mutex<HashMap<DocumentToken, PaymentOption>>,
    downloads: Mutex<HashMap<DocumentToken, LedgerEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a ledger entry.
    pub fn insert_ledger_entry(&self, token: &DocumentToken, entry: LedgerEntry) {
        self.downloads.lock().insert(token.clone(), entry);
    }

    pub fn ledger_entry(&self, token: &DocumentToken) -> Option<LedgerEntry> {
        self.downloads.lock().get(token).copied()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn upsert_transaction(
        &self,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        let mut transactions = self.transactions.lock();
        let existing = transactions.get(&notification.token);
        let merged = match existing {
            Some(existing) => Transaction {
                token: existing.token.clone(),
                status: notification.status.unwrap_or(existing.status),
                transaction_id: Some(notification.transaction_id.clone()),
                ref_payco: Some(notification.ref_payco.clone()),
                valor: notification.amount.unwrap_or(existing.valor),
                metodo_pago: PAYMENT_METHOD.to_string(),
                descripcion: notification
                    .description
                    .clone()
                    .unwrap_or_else(|| existing.descripcion.clone()),
                fecha: notification
                    .transaction_date
                    .clone()
                    .unwrap_or_else(|| existing.fecha.clone()),
                raw: notification.raw.clone(),
                updated_at: existing.updated_at,
            },
            None => Transaction {
                token: notification.token.clone(),
                status: notification.status.unwrap_or(TransactionStatus::Pending),
                transaction_id: Some(notification.transaction_id.clone()),
                ref_payco: Some(notification.ref_payco.clone()),
                valor: notification.amount.unwrap_or(0.0),
                metodo_pago: PAYMENT_METHOD.to_string(),
                descripcion: notification
                    .description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                fecha: notification
                    .transaction_date
                    .clone()
                    .unwrap_or_else(|| now.to_rfc3339()),
                raw: notification.raw.clone(),
                updated_at: now,
            },
        };
        if let Some(existing) = existing {
            if *existing == merged {
                return Ok(merged);
            }
        }
        let merged = Transaction {
            updated_at: now,
            ..merged
        };
        transactions.insert(merged.token.clone(), merged.clone());
        Ok(merged)
    }

    async fn get_transaction(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transactions.lock().get(token).cloned())
    }

    async fn find_by_ref_payco(
        &self,
        ref_payco: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .transactions
            .lock()
            .values()
            .filter(|t| t.ref_payco.as_deref() == Some(ref_payco))
            .max_by_key(|t| t.updated_at)
            .cloned())
    }
}

#[async_trait]
impl PaymentOptionStore for MemoryStore {
    async fn upsert_payment_option(
        &self,
        token: &DocumentToken,
        option: PaymentChoice,
        now: DateTime<Utc>,
    ) -> Result<PaymentOption, StoreError> {
        let mut options = self.payment_options.lock();
        let created_at = options.get(token).map(|o| o.created_at).unwrap_or(now);
        let record = PaymentOption {
            token: token.clone(),
            option,
            created_at,
            updated_at: now,
        };
        options.insert(token.clone(), record.clone());
        Ok(record)
    }

    async fn get_payment_option(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<PaymentOption>, StoreError> {
        Ok(self.payment_options.lock().get(token).cloned())
    }
}

#[async_trait]
impl DownloadLedger for MemoryStore {
    async fn check_and_register(
        &self,
        token: &DocumentToken,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let mut downloads = self.downloads.lock();
        match downloads.entry(token.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(LedgerEntry {
                    descargado: true,
                    timestamp: now,
                });
                Ok(true)
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.descargado || now - entry.timestamp > window {
                    return Ok(false);
                }
                entry.descargado = true;
                Ok(true)
            }
        }
    }
}
