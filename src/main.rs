// src/main.rs
use signal_fanout::adapter::TradingCoordinator;
use signal_fanout::application::dto::parser::parse_signal;
use signal_fanout::application::dto::SignalResponse;
use signal_fanout::application::usecase::{MonitorSupervisor, StopLossMonitor, TradeFanOut};
use signal_fanout::config::Config;
use signal_fanout::domain::errors::AppResult;
use signal_fanout::domain::repository::{
    AccountDirectory, MarketRepository, OrderGateway, SessionAuthenticator,
};
use signal_fanout::infrastructure::accounts::HttpAccountDirectory;
use signal_fanout::infrastructure::exchange::HttpOrderGateway;
use signal_fanout::infrastructure::http::HttpClient;
use signal_fanout::infrastructure::market::{
    TotpGenerator, VenueCredentials, VenueMarketClient, VenueSession,
};
use signal_fanout::infrastructure::persistence::{InstrumentTokenCache, OpenTradeLedger};

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration (CONFIG_FILE, otherwise environment)
    let config = Config::load()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting signal_fanout v{}", env!("CARGO_PKG_VERSION"));

    let coordinator = build_coordinator(&config).await?;

    let open = coordinator.resume().await?;
    log::info!("{} open position(s) found in {}", open, config.storage.ledger_path);

    log::info!("Reading signals from stdin, one JSON object per line. Press Ctrl+C to stop.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => {
                        log::info!("Signal input closed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = match parse_signal(&line) {
                    Ok(request) => coordinator.handle_signal(request).await,
                    Err(e) => {
                        log::warn!("Ignoring input line: {}", e);
                        SignalResponse::failure(e.to_string())
                    }
                };

                let mut encoded = serde_json::to_vec(&response)?;
                encoded.push(b'\n');
                stdout.write_all(&encoded).await?;
                stdout.flush().await?;
            }
            interrupted = ctrl_c() => {
                if let Err(e) = interrupted {
                    log::error!("Failed to listen for control-c event: {}", e);
                }
                log::info!("Interrupt received");
                break;
            }
        }
    }

    // Shutdown
    log::info!("Shutting down...");
    coordinator.shutdown().await;

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}

async fn build_coordinator(config: &Config) -> AppResult<TradingCoordinator> {
    let http = HttpClient::new(config.http_timeout());

    let session = Arc::new(VenueSession::new(
        http.clone(),
        &config.market.base_url,
        VenueCredentials {
            api_key: config.market.api_key.clone(),
            client_code: config.market.client_code.clone(),
            password: config.market.password.clone(),
            totp: TotpGenerator::from_base32(&config.market.totp_secret)?,
        },
    ));

    log::info!("Logging in to market venue...");
    if let Err(e) = session.refresh().await {
        // Price lookups retry the login on demand.
        log::warn!("Initial market venue login failed: {}", e);
    }

    let market: Arc<dyn MarketRepository> = Arc::new(VenueMarketClient::new(
        http.clone(),
        &config.market.base_url,
        &config.market.exchange,
        session,
        config.market.max_auth_attempts,
    ));

    let tokens = Arc::new(
        InstrumentTokenCache::load(&config.storage.token_cache_path, market.clone()).await?,
    );
    log::info!("{} instrument token(s) cached", tokens.len().await);

    let ledger = Arc::new(OpenTradeLedger::new(&config.storage.ledger_path));

    let gateway: Arc<dyn OrderGateway> = Arc::new(HttpOrderGateway::new(
        http.clone(),
        &config.broker.order_url,
        &config.broker.api_key,
    ));

    let directory: Arc<dyn AccountDirectory> = Arc::new(HttpAccountDirectory::new(
        http,
        &config.accounts.users_url,
        config.accounts.margin_url.clone(),
    ));

    let monitor = Arc::new(StopLossMonitor::new(
        ledger.clone(),
        tokens,
        market,
        gateway.clone(),
    ));
    let supervisor = Arc::new(MonitorSupervisor::new(monitor, config.poll_interval()));

    let fan_out = Arc::new(
        TradeFanOut::new(gateway, directory.clone(), ledger.clone())
            .with_monitor(supervisor.clone())
            .with_option_min_funds(config.risk.option_min_funds),
    );

    Ok(TradingCoordinator::new(directory, fan_out, supervisor, ledger))
}
