use std::sync::Arc;

use anyhow::{Result, bail};
use debt_memo::{DebtClaim, encode_memo};
use memo_transaction_util::MemoTransaction;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer as SolanaSigner,
};
use tokio::{
    sync::{Mutex, MutexGuard},
    time::{sleep, timeout},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::{FundingMode, RecorderConfig},
    error::RecordError,
    fee_payer::{FeePayer, ensure_funded, fund_ephemeral},
    ledger::{Ledger, RpcLedger, SignatureState},
};

enum PollOutcome {
    Confirmed(Signature),
    /// The ledger moved past the draft's last valid block height.
    Expired,
    /// Still valid, but no confirmation within the poll budget.
    Exhausted,
}

/// The long-lived fee payer shared by every call of one recorder.
struct PersistedPayer {
    pubkey: Pubkey,
    keypair: Mutex<Keypair>,
}

/// Records debt claims as memo transactions.
pub struct DebtRecorder {
    config: RecorderConfig,
    ledger: Arc<dyn Ledger>,
    builder: MemoTransaction,
    persisted_payer: Option<PersistedPayer>,
}

impl DebtRecorder {
    /// `persisted_payer` is required in [`FundingMode::Persisted`] and ignored otherwise.
    pub fn new(
        config: RecorderConfig,
        ledger: Arc<dyn Ledger>,
        persisted_payer: Option<Keypair>,
    ) -> Result<Self> {
        let persisted_payer = match (config.funding_mode, persisted_payer) {
            (FundingMode::Persisted, Some(keypair)) => Some(PersistedPayer {
                pubkey: keypair.pubkey(),
                keypair: Mutex::new(keypair),
            }),
            (FundingMode::Persisted, None) => {
                bail!("Persisted funding mode requires a fee payer keypair")
            }
            (FundingMode::Ephemeral, Some(_)) => {
                warn!("Ignoring the configured fee payer, funding mode is ephemeral");
                None
            }
            (FundingMode::Ephemeral, None) => None,
        };

        if config.submission_timeout < config.budget_timeout() {
            warn!(
                "Submission timeout {:?} is shorter than the retry budget needs ({:?}), late drafts may never be tried",
                config.submission_timeout,
                config.budget_timeout()
            );
        }

        Ok(Self {
            builder: MemoTransaction::new(config.memo_program),
            config,
            ledger,
            persisted_payer,
        })
    }

    /// Builds a recorder talking to `config.endpoint` over JSON-RPC.
    pub fn connect(config: RecorderConfig, persisted_payer: Option<Keypair>) -> Result<Self> {
        let ledger = Arc::new(RpcLedger::new(config.endpoint.clone()));
        Self::new(config, ledger, persisted_payer)
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Returns the transaction signature, or a message starting with `Error:`.
    pub async fn record_debt(&self, claim: &DebtClaim) -> String {
        match self.record(claim).await {
            Ok(signature) => signature.to_string(),
            Err(err) => err.to_marked_string(),
        }
    }

    pub async fn record(&self, claim: &DebtClaim) -> Result<Signature, RecordError> {
        let result = self.record_bounded(claim).await;
        if let Err(err) = &result {
            error!(kind = err.kind(), "❌ Failed to record debt: {}", err);
        }
        result
    }

    async fn record_bounded(&self, claim: &DebtClaim) -> Result<Signature, RecordError> {
        // Local validation first, a bad claim must not cost a round trip.
        let memo = encode_memo(claim)?;
        info!("📝 Prepared memo of {} bytes", memo.len());

        // Queueing behind another submission is not part of this call's budget.
        let guard = match &self.persisted_payer {
            Some(shared) => {
                match timeout(self.config.submission_timeout, shared.keypair.lock()).await {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        return Err(RecordError::PayerBusy {
                            payer: shared.pubkey,
                            waited: self.config.submission_timeout,
                        });
                    }
                }
            }
            None => None,
        };

        match timeout(
            self.config.submission_timeout,
            self.record_unbounded(&memo, guard),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RecordError::ConfirmationTimeout(format!(
                "gave up after {:?}",
                self.config.submission_timeout
            ))),
        }
    }

    async fn record_unbounded(
        &self,
        memo: &[u8],
        persisted: Option<MutexGuard<'_, Keypair>>,
    ) -> Result<Signature, RecordError> {
        info!("🔌 Connecting to {}", self.config.endpoint);
        self.ledger
            .check_health()
            .await
            .map_err(|e| RecordError::Connection {
                endpoint: self.config.endpoint.clone(),
                reason: format!("{:#}", e),
            })?;

        let payer = self.acquire_fee_payer(persisted).await?;
        self.submit_and_confirm(memo, payer.keypair()).await
    }

    async fn acquire_fee_payer<'a>(
        &self,
        persisted: Option<MutexGuard<'a, Keypair>>,
    ) -> Result<FeePayer<'a>, RecordError> {
        match persisted {
            Some(guard) => {
                let balance = ensure_funded(self.ledger.as_ref(), &guard).await?;
                debug!("Persisted fee payer holds {} lamports", balance);
                Ok(FeePayer::Persisted(guard))
            }
            None => {
                let keypair = fund_ephemeral(self.ledger.as_ref(), &self.config).await?;
                Ok(FeePayer::Ephemeral(keypair))
            }
        }
    }

    async fn submit_and_confirm(
        &self,
        memo: &[u8],
        payer: &Keypair,
    ) -> Result<Signature, RecordError> {
        let mut drafts: Vec<Signature> = Vec::new();

        for draft in 1..=self.config.retry_budget {
            let (blockhash, last_valid_block_height) = self.ledger.latest_blockhash().await?;
            let transaction = self.builder.prepare(payer, memo, blockhash);

            info!(
                "🚀 Sending memo transaction (draft {}/{})",
                draft, self.config.retry_budget
            );
            let signature = self
                .ledger
                .send_transaction(&transaction)
                .await
                .map_err(|e| RecordError::Submission(format!("{:#}", e)))?;
            info!("🔗 Transaction submitted: {}", signature);
            drafts.push(signature);

            match self
                .poll_confirmation(&drafts, last_valid_block_height)
                .await?
            {
                PollOutcome::Confirmed(confirmed) => {
                    info!("✅ Transaction confirmed: {}", confirmed);
                    return Ok(confirmed);
                }
                PollOutcome::Expired => warn!(
                    "Draft {} expired after block height {}, rebuilding",
                    signature, last_valid_block_height
                ),
                PollOutcome::Exhausted => warn!(
                    "Draft {} unconfirmed after {} polls, rebuilding",
                    signature, self.config.poll_attempts
                ),
            }
        }

        Err(RecordError::ConfirmationTimeout(format!(
            "no confirmation after {} drafts",
            drafts.len()
        )))
    }

    /// Polls every draft sent so far, so an earlier one landing late still counts.
    async fn poll_confirmation(
        &self,
        drafts: &[Signature],
        last_valid_block_height: u64,
    ) -> Result<PollOutcome, RecordError> {
        for poll in 0..self.config.poll_attempts {
            sleep(self.config.poll_delay(poll)).await;

            // A draft is already in flight, so a failed lookup only means "no answer yet".
            for signature in drafts.iter().rev() {
                match self.ledger.signature_status(signature).await {
                    Ok(SignatureState::Confirmed) => {
                        return Ok(PollOutcome::Confirmed(*signature));
                    }
                    Ok(SignatureState::Failed(reason)) => {
                        return Err(RecordError::Submission(format!(
                            "transaction {} failed: {}",
                            signature, reason
                        )));
                    }
                    Ok(SignatureState::Pending) => {}
                    Err(err) => warn!("Status of {} unavailable: {:#}", signature, err),
                }
            }

            match self.ledger.block_height().await {
                Ok(block_height) => {
                    debug!(
                        "Poll {}: block height {}, valid until {}",
                        poll + 1,
                        block_height,
                        last_valid_block_height
                    );
                    if block_height > last_valid_block_height {
                        return Ok(PollOutcome::Expired);
                    }
                }
                Err(err) => warn!("Block height unavailable: {:#}", err),
            }
        }
        Ok(PollOutcome::Exhausted)
    }
}
