use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    routing::{get, post},
    serve,
};
use clap::Parser;
use debt_recorder::{DebtRecorder, NftMinter, is_error_string};
use std::{process, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    cfg::{Cfg, Command},
    http_handler::{AppState, explorer_url, handle_record_debt, health_check, mint_nft},
};

mod cfg;
mod http_handler;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Cfg::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let recorder = Arc::new(DebtRecorder::connect(
        cfg.recorder_config()?,
        cfg.fee_payer()?,
    )?);

    let minter = cfg
        .nft_minter()
        .map(|minter| Arc::new(minter) as Arc<dyn NftMinter>);
    if minter.is_none() {
        info!("Crossmint credentials not set, NFT minting disabled");
    }

    if let Some(command) = &cfg.command {
        let claim = command.claim();
        let result = recorder.record_debt(&claim).await;
        if is_error_string(&result) {
            eprintln!("{}", result);
            process::exit(1);
        }
        println!("{}", result);
        println!("{}", explorer_url(&result, &cfg.explorer_cluster));

        // The debt is recorded either way, a failed mint only changes the exit code.
        if let Some(minter) = &minter {
            match mint_nft(minter.as_ref(), &result, &claim).await {
                Ok(nft_id) => println!("NFT: {}", nft_id),
                Err(nft_error) => {
                    eprintln!("NFT: {}", nft_error);
                    process::exit(2);
                }
            }
        }
        return Ok(());
    }

    let state = AppState {
        recorder,
        minter,
        cluster: cfg.explorer_cluster.clone(),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    let app = Router::new()
        .route("/", get(|| async { "PayGuard" }))
        .route("/health", get(health_check))
        .route("/debts", post(handle_record_debt))
        .layer(cors)
        .with_state(state);

    let tcp_listener = TcpListener::bind(format!("0.0.0.0:{}", cfg.port)).await?;

    info!("Starting server at port {}", cfg.port);
    serve(tcp_listener, app).await?;
    Ok(())
}
