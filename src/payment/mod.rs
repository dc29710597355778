//! Payment confirmation: gateway notifications, the status state machine and
//! the client's pre-purchase bundle choice.

pub mod gateway;
pub mod handlers;
pub mod models;
pub mod state_machine;

use thiserror::Error;

use crate::db::StoreError;
use crate::token::TokenError;
use gateway::GatewayError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
