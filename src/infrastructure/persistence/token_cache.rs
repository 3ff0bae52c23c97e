// src/infrastructure/persistence/token_cache.rs
// Symbol -> venue instrument token cache

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::{read_json, write_json_atomic};
use crate::domain::errors::{PersistenceResult, TradingError, TradingResult};
use crate::domain::repository::MarketRepository;

pub struct InstrumentTokenCache {
    path: PathBuf,
    tokens: RwLock<BTreeMap<String, String>>,
    persist_lock: Mutex<()>,
    market: Arc<dyn MarketRepository>,
}

impl InstrumentTokenCache {
    /// Open the cache stored at `path`; a missing file starts empty.
    pub async fn load(
        path: impl Into<PathBuf>,
        market: Arc<dyn MarketRepository>,
    ) -> PersistenceResult<Self> {
        let path = path.into();
        let tokens = read_json(&path).await?.unwrap_or_default();

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
            persist_lock: Mutex::new(()),
            market,
        })
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// Token for `symbol`, asking the venue on a cache miss.
    pub async fn resolve(&self, symbol: &str) -> TradingResult<String> {
        if let Some(token) = self.tokens.read().await.get(symbol) {
            return Ok(token.clone());
        }

        let token = self
            .market
            .search_token(symbol)
            .await?
            .ok_or_else(|| {
                TradingError::Resolution(format!("no instrument token for {}", symbol))
            })?;

        self.tokens
            .write()
            .await
            .insert(symbol.to_string(), token.clone());
        log::info!("Resolved instrument token {} for {}", token, symbol);

        // The token is usable even if the cache file cannot be updated.
        if let Err(e) = self.persist().await {
            log::warn!("Failed to persist token cache: {}", e);
        }

        Ok(token)
    }

    async fn persist(&self) -> PersistenceResult<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.tokens.read().await.clone();
        write_json_atomic(&self.path, &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{ExchangeError, ExchangeResult};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMarket {
        known: BTreeMap<String, String>,
        searches: AtomicUsize,
    }

    impl FakeMarket {
        fn with(entries: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                known: entries
                    .iter()
                    .map(|(s, t)| (s.to_string(), t.to_string()))
                    .collect(),
                searches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketRepository for FakeMarket {
        async fn search_token(&self, symbol: &str) -> ExchangeResult<Option<String>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if symbol == "offline" {
                return Err(ExchangeError::Connection("venue unreachable".into()));
            }
            Ok(self.known.get(symbol).cloned())
        }

        async fn last_price(&self, _symbol: &str, _token: &str) -> ExchangeResult<Decimal> {
            Ok(Decimal::ZERO)
        }
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let market = FakeMarket::with(&[("nifty", "26000")]);
        let cache = InstrumentTokenCache::load(dir.path().join("tokens.json"), market.clone())
            .await
            .unwrap();

        assert_eq!(cache.resolve("nifty").await.unwrap(), "26000");
        assert_eq!(cache.resolve("nifty").await.unwrap(), "26000");
        assert_eq!(market.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolved_tokens_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let market = FakeMarket::with(&[("banknifty", "26009")]);
        {
            let cache = InstrumentTokenCache::load(&path, market.clone()).await.unwrap();
            cache.resolve("banknifty").await.unwrap();
        }

        let offline = FakeMarket::with(&[]);
        let cache = InstrumentTokenCache::load(&path, offline.clone()).await.unwrap();
        assert_eq!(cache.resolve("banknifty").await.unwrap(), "26009");
        assert_eq!(offline.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_symbol_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let cache = InstrumentTokenCache::load(path, FakeMarket::with(&[]))
            .await
            .unwrap();

        let err = cache.resolve("nosuch").await.unwrap_err();
        assert!(matches!(err, TradingError::Resolution(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn venue_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let cache = InstrumentTokenCache::load(path, FakeMarket::with(&[]))
            .await
            .unwrap();

        let err = cache.resolve("offline").await.unwrap_err();
        assert!(matches!(err, TradingError::Exchange(ExchangeError::Connection(_))));
    }
}
