use std::path::Path;

use anyhow::{Result, anyhow};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, read_keypair_file},
    signer::Signer as SolanaSigner,
};
use tokio::{
    sync::MutexGuard,
    time::{Instant, sleep},
};
use tracing::{info, warn};

use crate::{config::RecorderConfig, error::RecordError, ledger::Ledger};

/// The signing identity paying for one submission.
pub enum FeePayer<'a> {
    Ephemeral(Keypair),
    /// Holding the guard keeps other submissions off the shared keypair.
    Persisted(MutexGuard<'a, Keypair>),
}

impl FeePayer<'_> {
    pub fn keypair(&self) -> &Keypair {
        match self {
            Self::Ephemeral(keypair) => keypair,
            Self::Persisted(guard) => &**guard,
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair().pubkey()
    }
}

#[allow(deprecated)]
pub fn keypair_from_base58(secret: &str) -> Result<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|e| anyhow!("Failed to decode fee payer secret: {}", e))?;
    Keypair::from_bytes(&bytes).map_err(|e| anyhow!("Invalid fee payer secret: {}", e))
}

pub fn load_keypair_file<P: AsRef<Path>>(path: P) -> Result<Keypair> {
    read_keypair_file(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read keypair file {}: {}",
            path.as_ref().display(),
            e
        )
    })
}

/// Generates a fresh keypair and funds it from the faucet.
///
/// Each attempt requests an airdrop and waits up to `funding_wait` for the
/// credit to show up. A keypair is only returned once its balance is non-zero.
pub(crate) async fn fund_ephemeral(
    ledger: &dyn Ledger,
    config: &RecorderConfig,
) -> Result<Keypair, RecordError> {
    let payer = Keypair::new();
    let pubkey = payer.pubkey();
    info!("🔑 Generated temporary fee payer {}", pubkey);

    let mut reason = String::from("no funding attempt was made");
    for attempt in 1..=config.retry_budget {
        info!(
            "💸 Requesting airdrop of {} lamports (attempt {}/{})",
            config.airdrop_lamports, attempt, config.retry_budget
        );
        if let Err(err) = ledger.request_airdrop(&pubkey, config.airdrop_lamports).await {
            warn!("Airdrop request failed: {:#}", err);
            reason = err.to_string();
            // Faucets rate limit, give it a moment before asking again.
            if attempt < config.retry_budget {
                sleep(config.airdrop_retry_delay(attempt)).await;
            }
            continue;
        }

        match wait_for_balance(ledger, &pubkey, config).await {
            Ok(balance) if balance > 0 => {
                info!("💰 Fee payer {} funded with {} lamports", pubkey, balance);
                return Ok(payer);
            }
            Ok(_) => {
                reason = format!("balance still zero after {:?}", config.funding_wait);
                warn!("Airdrop to {} not credited: {}", pubkey, reason);
            }
            Err(err) => {
                warn!("Failed to observe airdrop credit: {:#}", err);
                reason = err.to_string();
            }
        }
    }

    Err(RecordError::Funding {
        payer: pubkey,
        reason,
    })
}

async fn wait_for_balance(
    ledger: &dyn Ledger,
    account: &Pubkey,
    config: &RecorderConfig,
) -> Result<u64> {
    let deadline = Instant::now() + config.funding_wait;
    loop {
        let balance = ledger.balance(account).await?;
        if balance > 0 || Instant::now() >= deadline {
            return Ok(balance);
        }
        sleep(config.funding_poll_interval).await;
    }
}

/// Persisted payers are never topped up here, an empty one is a hard failure.
pub(crate) async fn ensure_funded(ledger: &dyn Ledger, payer: &Keypair) -> Result<u64, RecordError> {
    let balance = ledger.balance(&payer.pubkey()).await?;
    if balance == 0 {
        return Err(RecordError::Funding {
            payer: payer.pubkey(),
            reason: "balance is zero".to_string(),
        });
    }
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_keypair_from_base58_roundtrip() {
        let keypair = Keypair::new();
        let secret = bs58::encode(keypair.to_bytes()).into_string();

        let restored = keypair_from_base58(&secret).unwrap();
        assert_eq!(restored.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_keypair_from_base58_rejects_garbage() {
        assert!(keypair_from_base58("0OIl").is_err());
        assert!(keypair_from_base58("3mJr7AoUXx2Wqd").is_err());
    }

    #[test]
    fn test_load_keypair_file() {
        let keypair = Keypair::new();
        let path = std::env::temp_dir().join(format!("payguard-fee-payer-{}.json", keypair.pubkey()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap().as_bytes())
            .unwrap();

        let loaded = load_keypair_file(&path).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        std::fs::remove_file(&path).unwrap();
        assert!(load_keypair_file(&path).is_err());
    }
}
