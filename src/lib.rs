pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::core::{AssetType, MarketData, QuoteCache};
use crate::providers::{
    AltinkaynakProvider, Credentials, HttpTransport, IsYatirimProvider, ReqwestTransport,
    TcmbProvider, TefasProvider,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Quote { asset_type: AssetType, code: String },
    Refresh,
}

/// Wires one provider per asset type behind a shared quote cache.
pub fn build_market_data(
    config: &AppConfig,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
) -> MarketData {
    let providers = &config.providers;
    let credentials = match (
        providers.altinkaynak.username.clone(),
        providers.altinkaynak.password.clone(),
    ) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        _ => None,
    };

    MarketData::new(Arc::new(QuoteCache::new(Arc::clone(&clock))))
        .with_provider(Arc::new(TefasProvider::new(
            &providers.tefas.base_url,
            Arc::clone(&transport),
            Arc::clone(&clock),
        )))
        .with_provider(Arc::new(IsYatirimProvider::new(
            &providers.isyatirim.base_url,
            config.mode,
            Arc::clone(&transport),
            Arc::clone(&clock),
        )))
        .with_provider(Arc::new(AltinkaynakProvider::new(
            &providers.altinkaynak.base_url,
            credentials,
            Arc::clone(&transport),
            Arc::clone(&clock),
        )))
        .with_provider(Arc::new(TcmbProvider::new(
            &providers.tcmb.base_url,
            transport,
            clock,
        )))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    run_with_transport(command, &config, transport).await
}

/// Runs a command against an already loaded configuration and a given transport.
pub async fn run_with_transport(
    command: AppCommand,
    config: &AppConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<()> {
    info!(mode = ?config.mode, "quotekeeper starting...");
    debug!(holdings = config.holdings.len(), "Loaded config");

    let market = Arc::new(build_market_data(config, transport, Arc::new(SystemClock)));
    match command {
        AppCommand::Quote { asset_type, code } => cli::quote::run(&market, asset_type, &code).await,
        AppCommand::Refresh => cli::refresh::run(config, market).await.map(|_| ()),
    }
}
