use std::time::Duration;

use memo_transaction_util::MEMO_PROGRAM_ID;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

pub const DEVNET_URL: &str = "https://api.devnet.solana.com";

/// Headroom on top of the sleep budget for the RPC round trips themselves.
pub const RPC_ALLOWANCE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingMode {
    /// A fresh keypair per call, funded from the test network faucet.
    Ephemeral,
    /// One long-lived keypair supplied at construction.
    Persisted,
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub endpoint: String,
    pub memo_program: Pubkey,
    pub funding_mode: FundingMode,
    /// Funding attempts and transaction drafts allowed per call.
    pub retry_budget: u32,
    /// Status polls per draft before it is rebuilt.
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub airdrop_lamports: u64,
    pub funding_wait: Duration,
    pub funding_poll_interval: Duration,
    /// Bound on one call, counted from the moment the fee payer is ours.
    pub submission_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let mut config = Self {
            endpoint: DEVNET_URL.to_string(),
            memo_program: MEMO_PROGRAM_ID,
            funding_mode: FundingMode::Ephemeral,
            retry_budget: 3,
            poll_attempts: 10,
            poll_interval: Duration::from_secs(2),
            max_poll_interval: Duration::from_secs(10),
            airdrop_lamports: 2 * LAMPORTS_PER_SOL,
            funding_wait: Duration::from_secs(30),
            funding_poll_interval: Duration::from_secs(1),
            submission_timeout: Duration::ZERO,
        };
        config.submission_timeout = config.budget_timeout();
        config
    }
}

impl RecorderConfig {
    /// Delay before the given (zero based) status poll: doubles each time, capped.
    pub fn poll_delay(&self, poll: u32) -> Duration {
        let factor = 1u32.checked_shl(poll.min(16)).unwrap_or(u32::MAX);
        self.poll_interval
            .saturating_mul(factor)
            .min(self.max_poll_interval)
    }

    /// Pause after the given (one based) rejected airdrop request.
    pub fn airdrop_retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1).min(16))
            .unwrap_or(u32::MAX);
        self.funding_poll_interval
            .saturating_mul(factor)
            .min(self.funding_wait)
    }

    /// Sleep time of a call in which every funding attempt and every draft
    /// runs to the end of its budget.
    pub fn budgeted_duration(&self) -> Duration {
        let funding = (1..=self.retry_budget).fold(Duration::ZERO, |total, attempt| {
            total
                .saturating_add(self.funding_wait)
                .saturating_add(self.funding_poll_interval)
                .saturating_add(self.airdrop_retry_delay(attempt))
        });
        let per_draft = (0..self.poll_attempts).fold(Duration::ZERO, |total, poll| {
            total.saturating_add(self.poll_delay(poll))
        });
        funding.saturating_add(per_draft.saturating_mul(self.retry_budget))
    }

    /// Smallest `submission_timeout` that never cuts the retry budget short.
    pub fn budget_timeout(&self) -> Duration {
        self.budgeted_duration().saturating_add(RPC_ALLOWANCE)
    }
}
