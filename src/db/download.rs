//! Download ledger database operations

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{DownloadLedger, PgStore, StoreError};
use crate::token::DocumentToken;

#[async_trait]
impl DownloadLedger for PgStore {
    async fn check_and_register(
        &self,
        token: &DocumentToken,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, StoreError> {
        // One statement: the row lock taken by ON CONFLICT serializes
        // concurrent callers, and RETURNING yields a row only for the
        // caller whose insert or conditional update went through.
        let granted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO downloads (token, descargado, "timestamp")
            VALUES ($1, TRUE, $2)
            ON CONFLICT (token) DO UPDATE SET descargado = TRUE
            WHERE downloads.descargado = FALSE AND downloads."timestamp" >= $3
            RETURNING token
            "#,
        )
        .bind(token.as_str())
        .bind(now)
        .bind(now - window)
        .fetch_optional(&self.pool)
        .await?;

        Ok(granted.is_some())
    }
}
