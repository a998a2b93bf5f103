use std::time::Duration;

use debt_memo::MemoError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Marker every failure string returned across the caller boundary starts with.
pub const ERROR_PREFIX: &str = "Error:";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid debt claim: {0}")]
    InvalidClaim(MemoError),

    #[error("debt details are too long for a memo ({size} bytes, limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("could not connect to the ledger at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("fee payer {payer} has no spendable balance: {reason}")]
    Funding { payer: Pubkey, reason: String },

    #[error("fee payer {payer} stayed busy with another submission for {waited:?}")]
    PayerBusy { payer: Pubkey, waited: Duration },

    #[error("ledger rejected the transaction: {0}")]
    Submission(String),

    #[error("transaction was not confirmed: {0}")]
    ConfirmationTimeout(String),

    #[error("unexpected failure: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl RecordError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidClaim(_) => "invalid_claim",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Connection { .. } => "connection",
            Self::Funding { .. } => "funding",
            Self::PayerBusy { .. } => "payer_busy",
            Self::Submission(_) => "submission",
            Self::ConfirmationTimeout(_) => "confirmation_timeout",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// The claim itself is at fault; resubmitting it unchanged cannot succeed.
    pub fn is_claim_error(&self) -> bool {
        matches!(self, Self::InvalidClaim(_) | Self::PayloadTooLarge { .. })
    }

    /// Renders the error in the caller-facing string form.
    pub fn to_marked_string(&self) -> String {
        format!("{} {}", ERROR_PREFIX, self)
    }
}

impl From<MemoError> for RecordError {
    fn from(err: MemoError) -> Self {
        match err {
            MemoError::TooLarge { size, limit } => Self::PayloadTooLarge { size, limit },
            other => Self::InvalidClaim(other),
        }
    }
}

pub fn is_error_string(outcome: &str) -> bool {
    outcome.starts_with(ERROR_PREFIX)
}
