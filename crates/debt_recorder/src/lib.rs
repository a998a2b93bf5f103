//! Records salary-debt claims as memo transactions on a Solana ledger.
//!
//! [`DebtRecorder::record_debt`] is the caller-facing entry point: it returns
//! the confirmed transaction signature, or a message starting with `Error:`.

pub mod config;
pub mod error;
pub mod fee_payer;
pub mod ledger;
pub mod nft;
pub mod recorder;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{FundingMode, RecorderConfig};
pub use debt_memo::{DebtAmount, DebtClaim};
pub use error::{ERROR_PREFIX, RecordError, is_error_string};
pub use ledger::{Ledger, RpcLedger, SignatureState};
pub use nft::{CrossmintMinter, NftMinter};
pub use recorder::DebtRecorder;
