// src/infrastructure/persistence/ledger.rs
// Durable open-trade ledger

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{read_json, write_json_atomic};
use crate::domain::errors::PersistenceResult;
use crate::domain::models::{Ledger, OpenPosition};

/// File-backed ledger shared by the fan-out path and the stop-loss monitor.
///
/// Every mutation is a load-modify-save sequence under one mutex and is on
/// disk before the call returns. Reads go straight to the file; the rename in
/// [`write_json_atomic`] keeps them consistent.
pub struct OpenTradeLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OpenTradeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current persisted ledger; an absent store is an empty ledger.
    pub async fn load(&self) -> PersistenceResult<Ledger> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    /// Overwrite the persisted ledger.
    pub async fn save(&self, ledger: &Ledger) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock().await;
        write_json_atomic(&self.path, ledger).await
    }

    /// Merge `positions` into the list for `symbol` and persist.
    pub async fn append(
        &self,
        symbol: &str,
        positions: Vec<OpenPosition>,
    ) -> PersistenceResult<()> {
        if positions.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut ledger = self.load().await?;
        let added = positions.len();
        ledger.append(symbol, positions);
        write_json_atomic(&self.path, &ledger).await?;

        log::debug!(
            "Ledger: added {} position(s) for {}, {} open in total",
            added,
            symbol,
            ledger.position_count()
        );
        Ok(())
    }

    /// Remove the position of `account_id` under `symbol`.
    ///
    /// Returns `false` without touching the store when there was nothing to remove.
    pub async fn remove(&self, symbol: &str, account_id: &str) -> PersistenceResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut ledger = self.load().await?;
        if !ledger.remove(symbol, account_id) {
            return Ok(false);
        }
        write_json_atomic(&self.path, &ledger).await?;

        log::debug!("Ledger: removed {} for account {}", symbol, account_id);
        Ok(true)
    }

    /// Remove exactly one stored position, e.g. after its counter-order filled.
    ///
    /// Other positions the same account holds in `symbol` stay in the ledger.
    pub async fn remove_position(
        &self,
        symbol: &str,
        position: &OpenPosition,
    ) -> PersistenceResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut ledger = self.load().await?;
        if !ledger.remove_position(symbol, position) {
            return Ok(false);
        }
        write_json_atomic(&self.path, &ledger).await?;

        log::debug!(
            "Ledger: removed {} order {} for account {}",
            symbol,
            position.order_id,
            position.account_id
        );
        Ok(true)
    }
}
