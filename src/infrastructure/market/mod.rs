// src/infrastructure/market/mod.rs
// Market venue repository: instrument search and last traded price

pub mod session;

pub use session::{TotpGenerator, VenueCredentials, VenueSession};

use async_trait::async_trait;
use hyper::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::application::dto::{LtpData, LtpRequest, ScripMatch, SearchScripRequest, VenueEnvelope};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::repository::{MarketRepository, SessionAuthenticator};
use crate::infrastructure::http::HttpClient;

const SEARCH_PATH: &str = "/rest/secure/angelbroking/order/v1/searchScrip";
const LTP_PATH: &str = "/rest/secure/angelbroking/order/v1/getLtpData";

/// Venue error codes meaning the session token is missing, invalid or expired.
const AUTH_ERROR_CODES: [&str; 3] = ["AG8001", "AG8002", "AG8003"];

/// Run `op`, refreshing the session and retrying while it fails on
/// authentication, for at most `max_attempts` calls in total.
///
/// A failed refresh ends the loop with the refresh error.
pub async fn retry_after_refresh<T, F, Fut>(
    auth: &dyn SessionAuthenticator,
    max_attempts: u32,
    mut op: F,
) -> ExchangeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Err(e) if e.is_auth() && attempt < max_attempts => {
                log::warn!(
                    "Venue rejected session (attempt {}/{}): {}",
                    attempt,
                    max_attempts,
                    e
                );
                auth.refresh().await?;
                attempt += 1;
            }
            result => return result,
        }
    }
}

pub struct VenueMarketClient {
    http: HttpClient,
    base_url: String,
    exchange: String,
    session: Arc<VenueSession>,
    max_attempts: u32,
}

impl VenueMarketClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        exchange: impl Into<String>,
        session: Arc<VenueSession>,
        max_attempts: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            exchange: exchange.into(),
            session,
            max_attempts,
        }
    }

    async fn secure_post<B, T>(&self, path: &str, body: &B) -> ExchangeResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self
            .session
            .access_token()
            .await
            .ok_or_else(|| ExchangeError::Authentication("no active session".to_string()))?;

        let response = self
            .http
            .post(&format!("{}{}", self.base_url, path))
            .header("x-privatekey", self.session.api_key())
            .bearer(&token)
            .json(body)?
            .send()
            .await?;

        if matches!(response.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ExchangeError::Authentication(format!(
                "{} answered {}",
                path, response.status
            )));
        }
        if !response.is_success() {
            return Err(ExchangeError::Api(format!("{} answered {}", path, response.status)));
        }

        let envelope: VenueEnvelope<T> = response.json()?;
        if !envelope.status {
            if AUTH_ERROR_CODES.contains(&envelope.error_code.as_str()) {
                return Err(ExchangeError::Authentication(envelope.message));
            }
            return Err(ExchangeError::Api(format!(
                "{} ({})",
                envelope.message, envelope.error_code
            )));
        }

        envelope
            .data
            .ok_or_else(|| ExchangeError::Parse(format!("{} returned no data", path)))
    }
}

#[async_trait]
impl MarketRepository for VenueMarketClient {
    async fn search_token(&self, symbol: &str) -> ExchangeResult<Option<String>> {
        let request = &SearchScripRequest {
            exchange: &self.exchange,
            searchscrip: symbol,
        };

        let matches: Vec<ScripMatch> =
            retry_after_refresh(self.session.as_ref(), self.max_attempts, move || {
                self.secure_post(SEARCH_PATH, request)
            })
            .await?;

        Ok(matches
            .into_iter()
            .find(|m| m.tradingsymbol.eq_ignore_ascii_case(symbol))
            .map(|m| m.symboltoken))
    }

    async fn last_price(&self, symbol: &str, token: &str) -> ExchangeResult<Decimal> {
        let request = &LtpRequest {
            exchange: &self.exchange,
            tradingsymbol: symbol,
            symboltoken: token,
        };

        let data: LtpData = retry_after_refresh(self.session.as_ref(), self.max_attempts, move || {
            self.secure_post(LTP_PATH, request)
        })
        .await?;

        Ok(data.ltp)
    }
}
