// tests/stop_loss_monitor.rs
mod common;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeGateway, FakeMarket};
use signal_fanout::application::usecase::{
    CycleOutcome, CycleReport, MonitorSupervisor, StopLossMonitor,
};
use signal_fanout::domain::models::{OpenPosition, OrderSide};
use signal_fanout::domain::repository::{MarketRepository, OrderGateway};
use signal_fanout::infrastructure::persistence::{InstrumentTokenCache, OpenTradeLedger};

struct Harness {
    _dir: tempfile::TempDir,
    ledger: Arc<OpenTradeLedger>,
    gateway: Arc<FakeGateway>,
    market: Arc<FakeMarket>,
    monitor: Arc<StopLossMonitor>,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(OpenTradeLedger::new(dir.path().join("open_trades.json")));
    let gateway = FakeGateway::new();
    let market = FakeMarket::new();

    let market_repo: Arc<dyn MarketRepository> = market.clone();
    let gateway_repo: Arc<dyn OrderGateway> = gateway.clone();
    let tokens = Arc::new(
        InstrumentTokenCache::load(dir.path().join("symbol_tokens.json"), market_repo.clone())
            .await
            .unwrap(),
    );
    let monitor = Arc::new(StopLossMonitor::new(
        ledger.clone(),
        tokens,
        market_repo,
        gateway_repo,
    ));

    Harness {
        _dir: dir,
        ledger,
        gateway,
        market,
        monitor,
    }
}

fn position(account: &str, symbol: &str, side: OrderSide, stop: Option<Decimal>) -> OpenPosition {
    OpenPosition {
        pseudo_account: format!("pa-{}", account),
        account_id: account.to_string(),
        symbol: symbol.to_string(),
        side,
        quantity: dec!(100),
        entry_price: dec!(100),
        balance: dec!(10000),
        stop_loss_price: stop,
        order_id: format!("ord-{}", account),
        strategy: "test".to_string(),
        opened_at: Utc::now(),
    }
}

async fn wait_until_idle(supervisor: &MonitorSupervisor) -> bool {
    for _ in 0..200 {
        if !supervisor.is_running() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn closes_triggered_long_position() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(94));

    let outcome = h.monitor.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleReport {
            closed: 1,
            failed: 0,
            skipped_symbols: 0
        })
    );

    let orders = h.gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].quantity, dec!(100));
    assert_eq!(orders[0].price, dec!(94));
    assert_eq!(orders[0].pseudo_account, "pa-a");

    assert!(h.ledger.load().await.unwrap().is_empty());
    assert_eq!(h.monitor.run_cycle().await.unwrap(), CycleOutcome::Drained);
}

#[tokio::test]
async fn closes_only_positions_past_their_stop() {
    let h = harness().await;
    h.ledger
        .append(
            "nifty",
            vec![
                position("a", "nifty", OrderSide::Buy, Some(dec!(95))),
                position("b", "nifty", OrderSide::Sell, Some(dec!(105))),
                position("c", "nifty", OrderSide::Sell, Some(dec!(99))),
            ],
        )
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(100));

    h.monitor.run_cycle().await.unwrap();

    let orders = h.gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].pseudo_account, "pa-c");
    assert_eq!(orders[0].side, OrderSide::Buy);

    let remaining: Vec<_> = h
        .ledger
        .load()
        .await
        .unwrap()
        .positions("nifty")
        .iter()
        .map(|p| p.account_id.clone())
        .collect();
    assert_eq!(remaining, ["a", "b"]);
}

#[tokio::test]
async fn closing_one_fill_keeps_the_accounts_other_fills() {
    let h = harness().await;
    let mut later = position("a", "nifty", OrderSide::Buy, Some(dec!(90)));
    later.quantity = dec!(50);
    later.order_id = "ord-a-2".to_string();
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.ledger.append("nifty", vec![later]).await.unwrap();
    h.market.set_price("nifty", dec!(92));

    h.monitor.run_cycle().await.unwrap();

    let orders = h.gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, dec!(100));

    let ledger = h.ledger.load().await.unwrap();
    let left = ledger.positions("nifty");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].order_id, "ord-a-2");
    assert_eq!(left[0].quantity, dec!(50));

    // The remaining fill still closes once its own stop is crossed.
    h.market.set_price("nifty", dec!(89));
    h.monitor.run_cycle().await.unwrap();
    assert_eq!(h.gateway.orders().len(), 2);
    assert_eq!(h.gateway.orders()[1].quantity, dec!(50));
    assert!(h.ledger.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn close_is_not_resent_when_ledger_write_fails() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(94));

    // A directory where the temp file goes makes every ledger write fail.
    let blocker = h.ledger.path().with_file_name("open_trades.json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    assert!(h.monitor.run_cycle().await.is_err());
    assert_eq!(h.gateway.orders().len(), 1);

    assert!(h.monitor.run_cycle().await.is_err());
    assert_eq!(h.gateway.orders().len(), 1);

    std::fs::remove_dir(&blocker).unwrap();
    let outcome = h.monitor.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Drained);
    assert_eq!(h.gateway.orders().len(), 1);
    assert!(h.ledger.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_symbol_left_in_store_counts_as_drained() {
    let h = harness().await;
    std::fs::write(h.ledger.path(), r#"{"nifty": []}"#).unwrap();

    assert_eq!(h.monitor.run_cycle().await.unwrap(), CycleOutcome::Drained);
}

#[tokio::test]
async fn failed_counter_order_keeps_position() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(90));
    h.gateway.set_down(true);

    let outcome = h.monitor.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleReport {
            closed: 0,
            failed: 1,
            skipped_symbols: 0
        })
    );
    assert_eq!(h.ledger.load().await.unwrap().position_count(), 1);

    h.gateway.set_down(false);
    h.monitor.run_cycle().await.unwrap();
    assert!(h.ledger.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn position_without_trigger_never_closes() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, None)])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(1));

    h.monitor.run_cycle().await.unwrap();

    assert!(h.gateway.orders().is_empty());
    assert_eq!(h.ledger.load().await.unwrap().position_count(), 1);
}

#[tokio::test]
async fn unpriced_symbol_is_skipped() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.ledger
        .append("banknifty", vec![position("b", "banknifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.market.set_price("banknifty", dec!(90));

    let outcome = h.monitor.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Completed(CycleReport {
            closed: 1,
            failed: 0,
            skipped_symbols: 1
        })
    );

    let ledger = h.ledger.load().await.unwrap();
    assert_eq!(ledger.symbols(), ["nifty"]);
}

#[tokio::test]
async fn tokens_are_looked_up_once() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(50)))])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(100));

    h.monitor.run_cycle().await.unwrap();
    h.monitor.run_cycle().await.unwrap();

    assert_eq!(h.market.searches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn supervisor_runs_a_single_loop_until_stopped() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(50)))])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(100));

    let supervisor = MonitorSupervisor::new(h.monitor.clone(), Duration::from_millis(10));
    assert!(supervisor.ensure_running().await);
    assert!(!supervisor.ensure_running().await);
    assert!(supervisor.is_running());
    assert_eq!(supervisor.starts(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(supervisor.is_running());

    supervisor.stop().await;
    assert!(!supervisor.is_running());
    assert_eq!(h.ledger.load().await.unwrap().position_count(), 1);
}

#[tokio::test]
async fn supervisor_goes_idle_once_ledger_drains() {
    let h = harness().await;
    h.ledger
        .append("nifty", vec![position("a", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    h.market.set_price("nifty", dec!(94));

    let supervisor = MonitorSupervisor::new(h.monitor.clone(), Duration::from_millis(10));
    assert!(supervisor.ensure_running().await);
    assert!(wait_until_idle(&supervisor).await);

    assert_eq!(h.gateway.orders().len(), 1);
    assert!(h.ledger.load().await.unwrap().is_empty());

    // Restartable after going idle.
    h.ledger
        .append("nifty", vec![position("b", "nifty", OrderSide::Buy, Some(dec!(95)))])
        .await
        .unwrap();
    assert!(supervisor.ensure_running().await);
    assert!(wait_until_idle(&supervisor).await);
    assert_eq!(h.gateway.orders().len(), 2);
}

#[tokio::test]
async fn supervisor_on_empty_ledger_stops_immediately() {
    let h = harness().await;
    let supervisor = MonitorSupervisor::new(h.monitor.clone(), Duration::from_millis(10));

    assert!(supervisor.ensure_running().await);
    assert!(wait_until_idle(&supervisor).await);
    assert!(h.gateway.orders().is_empty());
}
