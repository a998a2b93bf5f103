use anyhow::{Result, anyhow};
use async_trait::async_trait;
use debt_memo::{DebtAmount, DebtClaim};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CROSSMINT_BASE_URL: &str = "https://www.crossmint.com";
const CROSSMINT_API_VERSION: &str = "2022-06-09";

/// Mints the commemorative token for a recorded debt.
#[async_trait]
pub trait NftMinter: Send + Sync {
    async fn mint(&self, transaction_id: &str, claim: &DebtClaim) -> Result<String>;
}

#[derive(Debug, Serialize)]
pub struct Attribute {
    pub trait_type: &'static str,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct NftMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub recipient: String,
    pub metadata: NftMetadata,
    pub reupload_linked_files: bool,
}

#[derive(Debug, Deserialize)]
struct MintResponse {
    id: String,
}

fn amount_text(amount: &DebtAmount) -> String {
    match amount {
        DebtAmount::Number(number) => number.to_string(),
        DebtAmount::Text(text) => text.clone(),
    }
}

pub fn mint_request(transaction_id: &str, claim: &DebtClaim, image_url: &str) -> MintRequest {
    let attributes = vec![
        Attribute {
            trait_type: "Debt Amount",
            value: amount_text(&claim.debt_amount),
        },
        Attribute {
            trait_type: "Due Date",
            value: claim.due_date.clone(),
        },
        Attribute {
            trait_type: "Employer",
            value: claim.employer_name.clone(),
        },
        Attribute {
            trait_type: "Employee Wallet",
            value: claim.employee_wallet.clone(),
        },
        Attribute {
            trait_type: "Transaction",
            value: transaction_id.to_string(),
        },
    ];

    MintRequest {
        recipient: format!("solana:{}", claim.employee_wallet),
        metadata: NftMetadata {
            name: format!("Proof of Debt - {}", claim.employer_name),
            description: format!(
                "Acknowledgment of {} owed by {}, recorded on-chain in transaction {}",
                amount_text(&claim.debt_amount),
                claim.employer_name,
                transaction_id
            ),
            image: image_url.to_string(),
            attributes,
        },
        reupload_linked_files: true,
    }
}

/// [`NftMinter`] backed by the Crossmint collections API.
pub struct CrossmintMinter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    collection_id: String,
    image_url: String,
}

impl CrossmintMinter {
    pub fn new<T>(base_url: T, api_key: T, collection_id: T, image_url: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            collection_id: collection_id.into(),
            image_url: image_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/{}/collections/{}/nfts",
            self.base_url.trim_end_matches('/'),
            CROSSMINT_API_VERSION,
            self.collection_id
        )
    }
}

#[async_trait]
impl NftMinter for CrossmintMinter {
    async fn mint(&self, transaction_id: &str, claim: &DebtClaim) -> Result<String> {
        let request = mint_request(transaction_id, claim, &self.image_url);
        let response = self
            .client
            .post(self.endpoint())
            .header("X-CLIENT-SECRET", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach the mint service: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mint request failed with {}: {}", status, body));
        }

        let minted: MintResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse mint response: {}", e))?;
        info!("🎨 Minted proof of debt NFT {}", minted.id);
        Ok(minted.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn innovate_corp() -> DebtClaim {
        DebtClaim {
            employer_name: "Innovate Corp".to_string(),
            employee_wallet: "7iY1gV1cbkggftQS5G5YgSH8EH4n2U1f1a5fGzS6j4qP".to_string(),
            debt_amount: "5000 USD".into(),
            due_date: "2025-09-15".to_string(),
        }
    }

    #[test]
    fn test_mint_request_shape() {
        let request = mint_request("5gn1W", &innovate_corp(), "ipfs://proof.png");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json["recipient"],
            "solana:7iY1gV1cbkggftQS5G5YgSH8EH4n2U1f1a5fGzS6j4qP"
        );
        assert_eq!(json["reuploadLinkedFiles"], true);
        assert_eq!(json["metadata"]["name"], "Proof of Debt - Innovate Corp");
        assert_eq!(json["metadata"]["image"], "ipfs://proof.png");

        let attributes = json["metadata"]["attributes"].as_array().unwrap();
        assert_eq!(attributes.len(), 5);
        assert_eq!(attributes[0]["trait_type"], "Debt Amount");
        assert_eq!(attributes[0]["value"], "5000 USD");
        assert_eq!(attributes[4]["value"], "5gn1W");
    }

    #[test]
    fn test_numeric_amount_attribute() {
        let mut claim = innovate_corp();
        claim.debt_amount = serde_json::from_str("1250.5").unwrap();
        let request = mint_request("sig", &claim, "");
        assert_eq!(request.metadata.attributes[0].value, "1250.5");
    }

    #[test]
    fn test_endpoint() {
        let minter = CrossmintMinter::new(
            "https://staging.crossmint.com/",
            "secret",
            "default-solana",
            "",
        );
        assert_eq!(
            minter.endpoint(),
            "https://staging.crossmint.com/api/2022-06-09/collections/default-solana/nfts"
        );
    }
}
