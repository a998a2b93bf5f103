use std::{path::PathBuf, time::Duration};

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use debt_recorder::{
    CrossmintMinter, DebtAmount, DebtClaim, FundingMode, RecorderConfig,
    config::DEVNET_URL,
    fee_payer::{keypair_from_base58, load_keypair_file},
    nft::CROSSMINT_BASE_URL,
};
use memo_transaction_util::{MEMO_PROGRAM_ADDRESS, parse_program_address};
use solana_sdk::signature::Keypair;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FundingModeArg {
    Ephemeral,
    Persisted,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cfg {
    #[arg(long, env = "PORT", default_value_t = 9000)]
    pub port: u16,

    #[arg(long, env = "SOLANA_RPC_URL", default_value = DEVNET_URL)]
    pub solana_rpc_url: String,

    #[arg(long, env = "MEMO_PROGRAM_ADDRESS", default_value = MEMO_PROGRAM_ADDRESS)]
    pub memo_program_address: String,

    #[arg(long, env = "FUNDING_MODE", value_enum, default_value_t = FundingModeArg::Ephemeral)]
    pub funding_mode: FundingModeArg,

    #[arg(long, env = "FEE_PAYER_SECRET", hide_env_values = true)]
    pub fee_payer_secret: Option<String>,

    #[arg(long, env = "FEE_PAYER_KEYPAIR_PATH")]
    pub fee_payer_keypair_path: Option<PathBuf>,

    #[arg(long, env = "RETRY_BUDGET", default_value_t = 3)]
    pub retry_budget: u32,

    #[arg(long, env = "POLL_ATTEMPTS", default_value_t = 10)]
    pub poll_attempts: u32,

    #[arg(long, env = "POLL_INTERVAL", default_value = "2s")]
    pub poll_interval: String,

    #[arg(long, env = "MAX_POLL_INTERVAL", default_value = "10s")]
    pub max_poll_interval: String,

    #[arg(long, env = "FUNDING_WAIT", default_value = "30s")]
    pub funding_wait: String,

    #[arg(long, env = "FUNDING_POLL_INTERVAL", default_value = "1s")]
    pub funding_poll_interval: String,

    /// Defaults to the time the retry budget can take in the worst case.
    #[arg(long, env = "SUBMISSION_TIMEOUT")]
    pub submission_timeout: Option<String>,

    #[arg(long, env = "AIRDROP_LAMPORTS", default_value_t = 2_000_000_000)]
    pub airdrop_lamports: u64,

    // NFT minting is skipped unless both of these are set
    #[arg(long, env = "CROSSMINT_API_KEY", hide_env_values = true)]
    pub crossmint_api_key: Option<String>,

    #[arg(long, env = "CROSSMINT_COLLECTION_ID")]
    pub crossmint_collection_id: Option<String>,

    #[arg(long, env = "CROSSMINT_BASE_URL", default_value = CROSSMINT_BASE_URL)]
    pub crossmint_base_url: String,

    #[arg(long, env = "NFT_IMAGE_URL", default_value = "")]
    pub nft_image_url: String,

    #[arg(long, env = "EXPLORER_CLUSTER", default_value = "devnet")]
    pub explorer_cluster: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a single debt claim, print the transaction id and exit.
    Record {
        #[arg(long)]
        employer_name: String,

        #[arg(long)]
        employee_wallet: String,

        /// Either a number or text with a unit, e.g. "5000 USD".
        #[arg(long)]
        debt_amount: DebtAmount,

        #[arg(long)]
        due_date: String,
    },
}

impl Command {
    pub fn claim(&self) -> DebtClaim {
        match self {
            Self::Record {
                employer_name,
                employee_wallet,
                debt_amount,
                due_date,
            } => DebtClaim {
                employer_name: employer_name.clone(),
                employee_wallet: employee_wallet.clone(),
                debt_amount: debt_amount.clone(),
                due_date: due_date.clone(),
            },
        }
    }
}

fn parse_duration_arg(name: &str, value: &str) -> Result<Duration> {
    parse_duration::parse(value).map_err(|e| anyhow!("Invalid {} {:?}: {}", name, value, e))
}

impl Cfg {
    pub fn recorder_config(&self) -> Result<RecorderConfig> {
        let mut config = RecorderConfig {
            endpoint: self.solana_rpc_url.clone(),
            memo_program: parse_program_address(&self.memo_program_address)?,
            funding_mode: match self.funding_mode {
                FundingModeArg::Ephemeral => FundingMode::Ephemeral,
                FundingModeArg::Persisted => FundingMode::Persisted,
            },
            retry_budget: self.retry_budget,
            poll_attempts: self.poll_attempts,
            poll_interval: parse_duration_arg("poll interval", &self.poll_interval)?,
            max_poll_interval: parse_duration_arg("max poll interval", &self.max_poll_interval)?,
            airdrop_lamports: self.airdrop_lamports,
            funding_wait: parse_duration_arg("funding wait", &self.funding_wait)?,
            funding_poll_interval: parse_duration_arg(
                "funding poll interval",
                &self.funding_poll_interval,
            )?,
            submission_timeout: Duration::ZERO,
        };
        config.submission_timeout = match &self.submission_timeout {
            Some(value) => parse_duration_arg("submission timeout", value)?,
            None => config.budget_timeout(),
        };
        Ok(config)
    }

    /// Loads the persisted fee payer; `None` in ephemeral mode.
    pub fn fee_payer(&self) -> Result<Option<Keypair>> {
        if self.funding_mode == FundingModeArg::Ephemeral {
            return Ok(None);
        }
        match (&self.fee_payer_secret, &self.fee_payer_keypair_path) {
            (Some(secret), _) => Ok(Some(keypair_from_base58(secret)?)),
            (None, Some(path)) => Ok(Some(load_keypair_file(path)?)),
            (None, None) => {
                bail!("Persisted funding mode needs FEE_PAYER_SECRET or FEE_PAYER_KEYPAIR_PATH")
            }
        }
    }

    pub fn nft_minter(&self) -> Option<CrossmintMinter> {
        match (&self.crossmint_api_key, &self.crossmint_collection_id) {
            (Some(api_key), Some(collection_id)) => Some(CrossmintMinter::new(
                self.crossmint_base_url.clone(),
                api_key.clone(),
                collection_id.clone(),
                self.nft_image_url.clone(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memo_transaction_util::MEMO_PROGRAM_ID;

    fn parse(args: &[&str]) -> Cfg {
        let mut argv = vec!["payguard"];
        argv.extend_from_slice(args);
        Cfg::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_recorder_config_from_args() {
        let cfg = parse(&[
            "--solana-rpc-url",
            "http://127.0.0.1:8899",
            "--retry-budget",
            "5",
            "--poll-interval",
            "500ms",
            "--submission-timeout",
            "90s",
        ]);
        let config = cfg.recorder_config().unwrap();

        assert_eq!(config.endpoint, "http://127.0.0.1:8899");
        assert_eq!(config.memo_program, MEMO_PROGRAM_ID);
        assert_eq!(config.funding_mode, FundingMode::Ephemeral);
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.submission_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_default_submission_timeout_follows_the_budget() {
        let config = parse(&["--retry-budget", "5", "--poll-attempts", "4"])
            .recorder_config()
            .unwrap();
        assert_eq!(config.submission_timeout, config.budget_timeout());
        assert_eq!(
            RecorderConfig::default().submission_timeout,
            parse(&[]).recorder_config().unwrap().submission_timeout
        );
    }

    #[test]
    fn test_invalid_duration() {
        let cfg = parse(&["--funding-wait", "soon"]);
        assert!(cfg.recorder_config().is_err());
    }

    #[test]
    fn test_persisted_mode_needs_secret() {
        let cfg = parse(&["--funding-mode", "persisted"]);
        assert!(cfg.fee_payer().is_err());

        let cfg = parse(&["--funding-mode", "ephemeral"]);
        assert!(cfg.fee_payer().unwrap().is_none());
    }

    #[test]
    fn test_nft_minter_needs_key_and_collection() {
        assert!(parse(&["--crossmint-api-key", "secret"]).nft_minter().is_none());
        assert!(
            parse(&[
                "--crossmint-api-key",
                "secret",
                "--crossmint-collection-id",
                "default-solana",
            ])
            .nft_minter()
            .is_some()
        );
    }

    #[test]
    fn test_record_command_claim() {
        let cfg = parse(&[
            "record",
            "--employer-name",
            "Innovate Corp",
            "--employee-wallet",
            "7iY1gV1cbkggftQS5G5YgSH8EH4n2U1f1a5fGzS6j4qP",
            "--debt-amount",
            "5000 USD",
            "--due-date",
            "2025-09-15",
        ]);
        let claim = cfg.command.as_ref().unwrap().claim();
        assert_eq!(claim.employer_name, "Innovate Corp");
        assert_eq!(claim.debt_amount, DebtAmount::Text("5000 USD".to_string()));
    }
}
