//! Database module - AppState and the durable stores
//!
//! - `transaction` - payment records keyed by document token
//! - `payment_option` - the bundle a client chose before paying
//! - `download` - single-use download ledger
//! - `memory` - in-process implementation of every store

mod download;
mod memory;
mod payment_option;
mod transaction;

pub use memory::{LedgerEntry, MemoryStore};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::document::llm::{LanguageModel, OpenAiClient};
use crate::document::orchestrator::{DocumentPipeline, PipelineSettings};
use crate::document::render::{DocumentRenderer, PandocRenderEngine};
use crate::download::DownloadGate;
use crate::payment::gateway::{EpaycoClient, PaymentGateway};
use crate::payment::models::{PaymentChoice, PaymentNotification, PaymentOption, Transaction};
use crate::payment::state_machine::PaymentStateMachine;
use crate::storage::{ObjectStorage, SupabaseStorage};
use crate::token::DocumentToken;

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait TransactionStore {
    /// Merge a notification into the record for its token, creating it on
    /// first sight. Returns the merged record.
    async fn upsert_transaction(
        &self,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError>;

    async fn get_transaction(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn find_by_ref_payco(&self, ref_payco: &str)
        -> Result<Option<Transaction>, StoreError>;
}

#[async_trait]
pub trait PaymentOptionStore {
    async fn upsert_payment_option(
        &self,
        token: &DocumentToken,
        option: PaymentChoice,
        now: DateTime<Utc>,
    ) -> Result<PaymentOption, StoreError>;

    async fn get_payment_option(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<PaymentOption>, StoreError>;
}

#[async_trait]
pub trait DownloadLedger {
    /// Atomically decide whether `token` may be downloaded now and, if so,
    /// mark it consumed. Entries that were never consumed stop being
    /// eligible once they are older than `window`.
    async fn check_and_register(
        &self,
        token: &DocumentToken,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, StoreError>;
}

/// Postgres-backed implementation of every store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they are missing. Safe to run on every start.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// External capabilities the application talks to.
pub struct Capabilities {
    pub storage: Arc<dyn ObjectStorage + Send + Sync>,
    pub llm: Arc<dyn LanguageModel + Send + Sync>,
    pub renderer: Arc<dyn DocumentRenderer + Send + Sync>,
    pub gateway: Arc<dyn PaymentGateway + Send + Sync>,
}

#[derive(Clone)]
pub struct AppState {
    pub payment_options: Arc<dyn PaymentOptionStore + Send + Sync>,
    pub storage: Arc<dyn ObjectStorage + Send + Sync>,
    pub gateway: Arc<dyn PaymentGateway + Send + Sync>,
    pub payments: PaymentStateMachine,
    pub downloads: DownloadGate,
    pub pipeline: DocumentPipeline,
}

impl AppState {
    pub async fn new_with_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(100)
            .min_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(900))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .connect(&config.database_url)
            .await?;

        let store = PgStore::new(pool);
        store.ensure_schema().await?;

        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(std::time::Duration::from_secs(900))
            .user_agent("lexagen-server/1.0")
            .build()?;

        let capabilities = Capabilities {
            storage: Arc::new(SupabaseStorage::new(
                config.supabase.clone(),
                http_client.clone(),
            )),
            llm: Arc::new(OpenAiClient::new(config.openai.clone(), http_client.clone())),
            renderer: Arc::new(PandocRenderEngine::new(config.render.clone())),
            gateway: Arc::new(EpaycoClient::new(
                config.epayco_validation_url.clone(),
                http_client,
            )),
        };

        let settings = PipelineSettings {
            capability_timeout: config.capability_timeout,
            ..PipelineSettings::default()
        };

        Ok(Self::new_with_store(Arc::new(store), capabilities, settings))
    }

    /// Wire the state from a store that implements every persistence trait.
    pub fn new_with_store<S>(store: Arc<S>, capabilities: Capabilities, settings: PipelineSettings) -> Self
    where
        S: TransactionStore + PaymentOptionStore + DownloadLedger + Send + Sync + 'static,
    {
        let Capabilities {
            storage,
            llm,
            renderer,
            gateway,
        } = capabilities;

        AppState {
            payment_options: store.clone(),
            storage: storage.clone(),
            gateway,
            payments: PaymentStateMachine::new(store.clone()),
            downloads: DownloadGate::new(store),
            pipeline: DocumentPipeline::new(llm, renderer, storage, settings),
        }
    }
}
