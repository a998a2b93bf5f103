use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use debt_recorder::{DebtClaim, DebtRecorder, ERROR_PREFIX, NftMinter};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<DebtRecorder>,
    pub minter: Option<Arc<dyn NftMinter>>,
    pub cluster: String,
}

#[derive(Debug, Default, Serialize)]
pub struct DebtRecordResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub nft_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
}

pub fn explorer_url(transaction_id: &str, cluster: &str) -> String {
    if cluster.is_empty() || cluster == "mainnet-beta" {
        format!("https://explorer.solana.com/tx/{}", transaction_id)
    } else {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            transaction_id, cluster
        )
    }
}

/// Mints the proof-of-debt NFT for a recorded transaction.
///
/// The error side is already in the caller-facing `Error:` form.
pub async fn mint_nft(
    minter: &dyn NftMinter,
    transaction_id: &str,
    claim: &DebtClaim,
) -> Result<String, String> {
    minter.mint(transaction_id, claim).await.map_err(|err| {
        warn!("NFT mint for {} failed: {:#}", transaction_id, err);
        format!("{} {:#}", ERROR_PREFIX, err)
    })
}

/// Handler for GET /health
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: "success".to_string(),
        message: "Service is healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

/// Handler for POST /debts
pub async fn handle_record_debt(
    State(state): State<AppState>,
    Json(claim): Json<DebtClaim>,
) -> impl IntoResponse {
    info!("📨 Debt claim from {}", claim.employer_name);

    let transaction_id = match state.recorder.record(&claim).await {
        Ok(signature) => signature.to_string(),
        Err(err) => {
            let status = if err.is_claim_error() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::BAD_GATEWAY
            };
            let response = DebtRecordResponse {
                error: Some(err.to_marked_string()),
                ..Default::default()
            };
            return (status, Json(response));
        }
    };

    let mut response = DebtRecordResponse {
        explorer_url: Some(explorer_url(&transaction_id, &state.cluster)),
        ..Default::default()
    };

    // The debt is already on-chain, a failed mint does not fail the request.
    if let Some(minter) = &state.minter {
        match mint_nft(minter.as_ref(), &transaction_id, &claim).await {
            Ok(nft_id) => response.nft_id = Some(nft_id),
            Err(nft_error) => response.nft_error = Some(nft_error),
        }
    }

    response.transaction_id = Some(transaction_id);
    (StatusCode::OK, Json(response))
}
