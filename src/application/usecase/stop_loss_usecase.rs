// src/application/usecase/stop_loss_usecase.rs
// Stop-loss monitoring of the open-trade ledger

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::errors::TradingResult;
use crate::domain::models::OpenPosition;
use crate::domain::repository::{MarketRepository, OrderGateway};
use crate::infrastructure::persistence::{InstrumentTokenCache, OpenTradeLedger};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Positions closed and removed from the ledger.
    pub closed: usize,
    /// Triggered positions whose counter-order failed; retried next cycle.
    pub failed: usize,
    /// Symbols without a price this cycle.
    pub skipped_symbols: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Ledger was empty; nothing left to watch.
    Drained,
    Completed(CycleReport),
}

/// One pass over the ledger: price every symbol, close what crossed its stop.
pub struct StopLossMonitor {
    ledger: Arc<OpenTradeLedger>,
    tokens: Arc<InstrumentTokenCache>,
    market: Arc<dyn MarketRepository>,
    gateway: Arc<dyn OrderGateway>,
    /// Closed at the broker but still in the ledger file.
    unrecorded_closes: StdMutex<Vec<(String, OpenPosition)>>,
}

impl StopLossMonitor {
    pub fn new(
        ledger: Arc<OpenTradeLedger>,
        tokens: Arc<InstrumentTokenCache>,
        market: Arc<dyn MarketRepository>,
        gateway: Arc<dyn OrderGateway>,
    ) -> Self {
        Self {
            ledger,
            tokens,
            market,
            gateway,
            unrecorded_closes: StdMutex::new(Vec::new()),
        }
    }

    pub async fn has_open_positions(&self) -> TradingResult<bool> {
        Ok(!self.ledger.load().await?.is_empty())
    }

    pub async fn run_cycle(&self) -> TradingResult<CycleOutcome> {
        self.record_pending_closes().await?;

        let ledger = self.ledger.load().await?;
        if ledger.is_empty() {
            return Ok(CycleOutcome::Drained);
        }

        let mut report = CycleReport::default();

        for (symbol, positions) in ledger.iter() {
            let price = match self.current_price(symbol).await {
                Ok(price) => price,
                Err(e) => {
                    log::warn!("No price for {} this cycle: {}", symbol, e);
                    report.skipped_symbols += 1;
                    continue;
                }
            };

            // Newest first.
            for position in positions.iter().rev() {
                if !position.should_trigger(price) {
                    continue;
                }

                log::warn!(
                    "Stop-loss hit for {} on {}: {} {} entry {} stop {:?} now {}",
                    position.pseudo_account,
                    symbol,
                    position.side,
                    position.quantity,
                    position.entry_price,
                    position.stop_loss_price,
                    price
                );

                let order = position.counter_order(price);
                match self.gateway.submit(&order).await {
                    Ok(response) => {
                        if let Err(e) = self.ledger.remove_position(symbol, position).await {
                            log::error!(
                                "Closed {} for {} (counter-order id {}) but the ledger was not \
                                 updated; holding it back from resubmission: {}",
                                symbol,
                                position.pseudo_account,
                                response.order_id,
                                e
                            );
                            self.hold_closed(symbol, position);
                            return Err(e.into());
                        }
                        report.closed += 1;
                        log::info!(
                            "Closed {} for {} with {} x{} @ {} (id {})",
                            symbol,
                            position.pseudo_account,
                            order.side,
                            order.quantity,
                            price,
                            response.order_id
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        log::error!(
                            "Counter-order for {} on {} failed, will retry: {}",
                            position.pseudo_account,
                            symbol,
                            e
                        );
                    }
                }
            }
        }

        Ok(CycleOutcome::Completed(report))
    }

    fn hold_closed(&self, symbol: &str, position: &OpenPosition) {
        if let Ok(mut pending) = self.unrecorded_closes.lock() {
            pending.push((symbol.to_string(), position.clone()));
        }
    }

    /// Retry ledger removal for positions already closed at the broker.
    async fn record_pending_closes(&self) -> TradingResult<()> {
        let pending = match self.unrecorded_closes.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return Ok(()),
        };

        let mut remaining = pending.into_iter();
        while let Some((symbol, position)) = remaining.next() {
            if let Err(e) = self.ledger.remove_position(&symbol, &position).await {
                self.hold_closed(&symbol, &position);
                for (symbol, position) in remaining {
                    self.hold_closed(&symbol, &position);
                }
                return Err(e.into());
            }
            log::info!(
                "Recorded earlier close of {} for {}",
                symbol,
                position.pseudo_account
            );
        }
        Ok(())
    }

    async fn current_price(&self, symbol: &str) -> TradingResult<Decimal> {
        let token = self.tokens.resolve(symbol).await?;
        Ok(self.market.last_price(symbol, &token).await?)
    }
}

/// Owns the background task running [`StopLossMonitor`] cycles.
///
/// At most one loop runs at a time. The loop ends when the ledger drains, when
/// a cycle fails, or on [`MonitorSupervisor::stop`].
pub struct MonitorSupervisor {
    monitor: Arc<StopLossMonitor>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    starts: AtomicUsize,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorSupervisor {
    pub fn new(monitor: Arc<StopLossMonitor>, poll_interval: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            monitor,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            starts: AtomicUsize::new(0),
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of loops spawned so far.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    /// Start the loop unless one is already running.
    ///
    /// Returns whether this call started it.
    pub async fn ensure_running(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let run = self.starts.fetch_add(1, Ordering::AcqRel) + 1;
        self.stop_tx.send_replace(false);
        let stop_rx = self.stop_tx.subscribe();
        let handle = tokio::spawn(run_loop(
            self.monitor.clone(),
            self.running.clone(),
            self.poll_interval,
            stop_rx,
            run,
        ));

        // Any previous handle belongs to a loop that already gave up the flag.
        *self.handle.lock().await = Some(handle);
        true
    }

    /// Signal the loop to stop and wait for it.
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Stop-loss monitor task ended abnormally: {}", e);
            }
        }
        self.running.store(false, Ordering::Release);
    }
}

async fn run_loop(
    monitor: Arc<StopLossMonitor>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
    run: usize,
) {
    log::info!(
        "Stop-loss monitor run #{} started (poll every {:?})",
        run,
        poll_interval
    );

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    log::info!("Stop-loss monitor stopped on request");
                    break;
                }
                continue;
            }
        }

        match monitor.run_cycle().await {
            Ok(CycleOutcome::Completed(report)) => {
                if report.closed > 0 || report.failed > 0 {
                    log::info!(
                        "Stop-loss cycle: {} closed, {} failed, {} symbol(s) unpriced",
                        report.closed,
                        report.failed,
                        report.skipped_symbols
                    );
                }
            }
            Ok(CycleOutcome::Drained) => {
                running.store(false, Ordering::Release);
                // A fan-out may have appended after the empty read but before
                // the flag cleared; reclaim the flag rather than leave it unwatched.
                let reclaim = matches!(monitor.has_open_positions().await, Ok(true))
                    && running
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok();
                if reclaim {
                    continue;
                }
                log::info!("Ledger drained, stop-loss monitor idle");
                return;
            }
            Err(e) => {
                log::error!("Stop-loss monitor cycle failed, stopping: {}", e);
                break;
            }
        }
    }

    running.store(false, Ordering::Release);
}
