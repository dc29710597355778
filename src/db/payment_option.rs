//! Payment option database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{PaymentOptionStore, PgStore, StoreError};
use crate::payment::models::{PaymentChoice, PaymentOption};
use crate::token::DocumentToken;

#[derive(sqlx::FromRow)]
struct PaymentOptionRow {
    token: String,
    option: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentOptionRow> for PaymentOption {
    type Error = StoreError;

    fn try_from(row: PaymentOptionRow) -> Result<Self, Self::Error> {
        let token = DocumentToken::parse(&row.token)
            .map_err(|e| StoreError::Corrupt(format!("payment option token: {}", e)))?;
        let option = PaymentChoice::parse(&row.option)
            .ok_or_else(|| StoreError::Corrupt(format!("payment option value: {}", row.option)))?;
        Ok(PaymentOption {
            token,
            option,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentOptionStore for PgStore {
    async fn upsert_payment_option(
        &self,
        token: &DocumentToken,
        option: PaymentChoice,
        now: DateTime<Utc>,
    ) -> Result<PaymentOption, StoreError> {
        let row = sqlx::query_as::<_, PaymentOptionRow>(
            r#"
            INSERT INTO payment_options (token, option, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (token) DO UPDATE
            SET option = EXCLUDED.option, updated_at = EXCLUDED.updated_at
            RETURNING token, option, created_at, updated_at
            "#,
        )
        .bind(token.as_str())
        .bind(option.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_payment_option(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<PaymentOption>, StoreError> {
        let row = sqlx::query_as::<_, PaymentOptionRow>(
            "SELECT token, option, created_at, updated_at FROM payment_options WHERE token = $1",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentOption::try_from).transpose()
    }
}
