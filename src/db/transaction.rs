//! Transaction database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{PgStore, StoreError, TransactionStore};
use crate::payment::models::{
    PaymentNotification, Transaction, TransactionStatus, DEFAULT_DESCRIPTION, PAYMENT_METHOD,
};
use crate::token::DocumentToken;

#[derive(sqlx::FromRow)]
struct TransactionRow {
    token: String,
    status: String,
    transaction_id: Option<String>,
    ref_payco: Option<String>,
    valor: f64,
    metodo_pago: String,
    descripcion: String,
    fecha: String,
    raw: Value,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let token = DocumentToken::parse(&row.token)
            .map_err(|e| StoreError::Corrupt(format!("transaction token: {}", e)))?;
        Ok(Transaction {
            token,
            status: TransactionStatus::from_db(&row.status),
            transaction_id: row.transaction_id,
            ref_payco: row.ref_payco,
            valor: row.valor,
            metodo_pago: row.metodo_pago,
            descripcion: row.descripcion,
            fecha: row.fecha,
            raw: row.raw,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str =
    "token, status, transaction_id, ref_payco, valor, metodo_pago, descripcion, fecha, raw, updated_at";

#[async_trait]
impl TransactionStore for PgStore {
    async fn upsert_transaction(
        &self,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        // Absent fields keep their stored value; a brand new row starts
        // from the defaults. A redelivery that changes nothing leaves the
        // row untouched, so RETURNING is empty and the stored row is read.
        let sql = format!(
            r#"
            INSERT INTO transactions AS t ({COLUMNS})
            VALUES ($1, COALESCE($2::text, 'pending'), $3, $4, COALESCE($5::float8, 0),
                    $6, COALESCE($7::text, $8), COALESCE($9::text, $10), $11, $12)
            ON CONFLICT (token) DO UPDATE SET
                status = COALESCE($2::text, t.status),
                transaction_id = EXCLUDED.transaction_id,
                ref_payco = EXCLUDED.ref_payco,
                valor = COALESCE($5::float8, t.valor),
                metodo_pago = EXCLUDED.metodo_pago,
                descripcion = COALESCE($7::text, t.descripcion),
                fecha = COALESCE($9::text, t.fecha),
                raw = EXCLUDED.raw,
                updated_at = EXCLUDED.updated_at
            WHERE (t.status, t.transaction_id, t.ref_payco, t.valor, t.metodo_pago,
                   t.descripcion, t.fecha, t.raw)
                IS DISTINCT FROM
                  (COALESCE($2::text, t.status), EXCLUDED.transaction_id, EXCLUDED.ref_payco,
                   COALESCE($5::float8, t.valor), EXCLUDED.metodo_pago,
                   COALESCE($7::text, t.descripcion), COALESCE($9::text, t.fecha), EXCLUDED.raw)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(notification.token.as_str())
            .bind(notification.status.map(|s| s.as_str()))
            .bind(&notification.transaction_id)
            .bind(&notification.ref_payco)
            .bind(notification.amount)
            .bind(PAYMENT_METHOD)
            .bind(notification.description.as_deref())
            .bind(DEFAULT_DESCRIPTION)
            .bind(notification.transaction_date.as_deref())
            .bind(now.to_rfc3339())
            .bind(&notification.raw)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => self
                .get_transaction(&notification.token)
                .await?
                .ok_or_else(|| StoreError::Corrupt("transaction vanished during upsert".to_string())),
        }
    }

    async fn get_transaction(
        &self,
        token: &DocumentToken,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE token = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn find_by_ref_payco(
        &self,
        ref_payco: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions WHERE ref_payco = $1 ORDER BY updated_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(ref_payco)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Transaction::try_from).transpose()
    }
}
