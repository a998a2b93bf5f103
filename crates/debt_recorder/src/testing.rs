//! Scripted in-memory [`Ledger`] for exercising the recording workflow
//! without a node.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::ledger::{Ledger, SignatureState};

const CURRENT_BLOCK_HEIGHT: u64 = 1_000;
const BLOCKHASH_VALIDITY: u64 = 150;

/// In-memory ledger with scripted answers and per-operation call counters.
#[derive(Default)]
pub struct ScriptedLedger {
    pub unreachable: bool,
    /// Airdrops are acknowledged but never credited.
    pub withhold_airdrop: bool,
    pub rejected_with: Option<String>,
    pub failed_with: Option<String>,
    /// Number of drafts, in send order, whose blockhash is already past its validity.
    pub expired_drafts: usize,
    /// Status polls answered with `Pending` before answering `Confirmed`.
    pub pending_polls: AtomicUsize,
    pub balance: AtomicU64,
    /// Airdrop requests refused (as a rate limited faucet would) before one goes through.
    pub airdrop_failures: AtomicUsize,
    /// Status calls that fail outright before the node answers again.
    pub status_failures: AtomicUsize,
    pub height_failures: AtomicUsize,

    pub health_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub airdrop_calls: AtomicUsize,
    pub blockhash_calls: AtomicUsize,
    pub height_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    /// Sends made while another transaction of the same payer was still unconfirmed.
    pub overlapping_sends: AtomicUsize,

    pub sent_transactions: Mutex<Vec<Transaction>>,
    pub unconfirmed: Mutex<HashMap<Signature, Pubkey>>,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

impl ScriptedLedger {
    pub fn sent(&self) -> Vec<Transaction> {
        self.sent_transactions
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        [
            &self.health_calls,
            &self.balance_calls,
            &self.airdrop_calls,
            &self.blockhash_calls,
            &self.height_calls,
            &self.send_calls,
            &self.status_calls,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    async fn check_health(&self) -> Result<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(anyhow!("Connection refused"));
        }
        Ok(())
    }

    async fn balance(&self, _account: &Pubkey) -> Result<u64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn request_airdrop(&self, _account: &Pubkey, lamports: u64) -> Result<Signature> {
        self.airdrop_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.airdrop_failures) {
            return Err(anyhow!("Failed to request airdrop: 429 Too Many Requests"));
        }
        if !self.withhold_airdrop {
            self.balance.fetch_add(lamports, Ordering::SeqCst);
        }
        Ok(Signature::new_unique())
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok((Hash::new_unique(), CURRENT_BLOCK_HEIGHT + BLOCKHASH_VALIDITY))
    }

    async fn block_height(&self) -> Result<u64> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.height_failures) {
            return Err(anyhow!("Failed to get block height: 503 Service Unavailable"));
        }
        if self.send_calls.load(Ordering::SeqCst) <= self.expired_drafts {
            return Ok(CURRENT_BLOCK_HEIGHT + 2 * BLOCKHASH_VALIDITY);
        }
        Ok(CURRENT_BLOCK_HEIGHT)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.rejected_with {
            return Err(anyhow!("Failed to send transaction: {}", reason));
        }
        transaction
            .verify()
            .map_err(|e| anyhow!("Signature verification failed: {}", e))?;

        let signature = transaction.signatures[0];
        let payer = transaction.message.account_keys[0];
        {
            let mut unconfirmed = self
                .unconfirmed
                .lock()
                .map_err(|e| anyhow!("Poisoned: {}", e))?;
            if unconfirmed.values().any(|pending| *pending == payer) {
                self.overlapping_sends.fetch_add(1, Ordering::SeqCst);
            }
            unconfirmed.insert(signature, payer);
        }
        self.sent_transactions
            .lock()
            .map_err(|e| anyhow!("Poisoned: {}", e))?
            .push(transaction.clone());
        Ok(signature)
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureState> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.status_failures) {
            return Err(anyhow!(
                "Failed to get status of {}: 503 Service Unavailable",
                signature
            ));
        }
        if let Some(reason) = &self.failed_with {
            return Ok(SignatureState::Failed(reason.clone()));
        }
        if take_one(&self.pending_polls) {
            return Ok(SignatureState::Pending);
        }
        self.unconfirmed
            .lock()
            .map_err(|e| anyhow!("Poisoned: {}", e))?
            .remove(signature);
        Ok(SignatureState::Confirmed)
    }
}
