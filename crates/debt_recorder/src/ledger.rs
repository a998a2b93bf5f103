use anyhow::{Result, anyhow};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// Not yet seen at the requested commitment.
    Pending,
    Confirmed,
    /// Landed, but the transaction itself failed.
    Failed(String),
}

/// The ledger operations the recording workflow relies on.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn check_health(&self) -> Result<()>;
    async fn balance(&self, account: &Pubkey) -> Result<u64>;
    async fn request_airdrop(&self, account: &Pubkey, lamports: u64) -> Result<Signature>;
    /// Latest blockhash together with the last block height at which it is still valid.
    async fn latest_blockhash(&self) -> Result<(Hash, u64)>;
    async fn block_height(&self) -> Result<u64>;
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature>;
    async fn signature_status(&self, signature: &Signature) -> Result<SignatureState>;
}

/// [`Ledger`] backed by a JSON-RPC node at `confirmed` commitment.
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    pub fn new<T>(solana_url: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            client: RpcClient::new_with_commitment(solana_url.into(), CommitmentConfig::confirmed()),
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn check_health(&self) -> Result<()> {
        let version = self
            .client
            .get_version()
            .await
            .map_err(|e| anyhow!("Failed to reach {}: {}", self.client.url(), e))?;
        info!(
            "Connected to {} (node version {})",
            self.client.url(),
            version.solana_core
        );
        Ok(())
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64> {
        self.client
            .get_balance(account)
            .await
            .map_err(|e| anyhow!("Failed to get balance of {}: {}", account, e))
    }

    async fn request_airdrop(&self, account: &Pubkey, lamports: u64) -> Result<Signature> {
        self.client
            .request_airdrop(account, lamports)
            .await
            .map_err(|e| anyhow!("Failed to request airdrop: {}", e))
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        self.client
            .get_latest_blockhash_with_commitment(CommitmentConfig::confirmed())
            .await
            .map_err(|e| anyhow!("Failed to get latest blockhash: {}", e))
    }

    async fn block_height(&self) -> Result<u64> {
        self.client
            .get_block_height()
            .await
            .map_err(|e| anyhow!("Failed to get block height: {}", e))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(|e| anyhow!("Failed to send transaction: {}", e))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureState> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, CommitmentConfig::confirmed())
            .await
            .map_err(|e| anyhow!("Failed to get status of {}: {}", signature, e))?;
        Ok(match status {
            None => SignatureState::Pending,
            Some(Ok(())) => SignatureState::Confirmed,
            Some(Err(err)) => SignatureState::Failed(err.to_string()),
        })
    }
}
