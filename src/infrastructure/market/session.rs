// src/infrastructure/market/session.rs
// Market venue login session

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::application::dto::{LoginRequest, RefreshRequest, SessionTokens, VenueEnvelope};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::repository::SessionAuthenticator;
use crate::infrastructure::http::{HttpClient, HttpResponse};

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";
const REFRESH_PATH: &str = "/rest/auth/angelbroking/jwt/v1/generateTokens";

/// Time-based one-time codes for the venue login (SHA-1, 6 digits, 30 s).
#[derive(Debug, Clone)]
pub struct TotpGenerator {
    totp: TOTP,
}

impl TotpGenerator {
    /// Build from the base32 secret shown when two-factor login was enabled.
    pub fn from_base32(secret: &str) -> ExchangeResult<Self> {
        let bytes = Secret::Encoded(secret.trim().to_uppercase())
            .to_bytes()
            .map_err(|e| {
                ExchangeError::Authentication(format!("invalid TOTP secret: {:?}", e))
            })?;
        if bytes.is_empty() {
            return Err(ExchangeError::Authentication("empty TOTP secret".to_string()));
        }
        Ok(Self {
            totp: TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes),
        })
    }

    pub fn code_at(&self, unix_seconds: u64) -> String {
        self.totp.generate(unix_seconds)
    }

    pub fn current(&self) -> String {
        self.code_at(Utc::now().timestamp().max(0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct VenueCredentials {
    pub api_key: String,
    pub client_code: String,
    pub password: String,
    pub totp: TotpGenerator,
}

pub struct VenueSession {
    http: HttpClient,
    base_url: String,
    credentials: VenueCredentials,
    tokens: RwLock<Option<SessionTokens>>,
}

impl VenueSession {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        credentials: VenueCredentials,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            tokens: RwLock::new(None),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    /// Bearer token of the current session, if logged in.
    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.jwt_token.clone())
    }

    async fn login(&self) -> ExchangeResult<SessionTokens> {
        let code = self.credentials.totp.current();
        let request = LoginRequest {
            clientcode: &self.credentials.client_code,
            password: &self.credentials.password,
            totp: &code,
        };
        let response = self
            .http
            .post(&format!("{}{}", self.base_url, LOGIN_PATH))
            .header("x-privatekey", &self.credentials.api_key)
            .json(&request)?
            .send()
            .await?;
        session_tokens(response)
    }

    async fn renew(&self, refresh_token: &str) -> ExchangeResult<SessionTokens> {
        let current = self.access_token().await.unwrap_or_default();
        let response = self
            .http
            .post(&format!("{}{}", self.base_url, REFRESH_PATH))
            .header("x-privatekey", &self.credentials.api_key)
            .bearer(&current)
            .json(&RefreshRequest { refresh_token })?
            .send()
            .await?;
        session_tokens(response)
    }
}

fn session_tokens(response: HttpResponse) -> ExchangeResult<SessionTokens> {
    if !response.is_success() {
        return Err(ExchangeError::Authentication(format!(
            "session request failed with status {}",
            response.status
        )));
    }
    let envelope: VenueEnvelope<SessionTokens> = response.json()?;
    match envelope.data {
        Some(tokens) if envelope.status => Ok(tokens),
        _ => Err(ExchangeError::Authentication(envelope.message)),
    }
}

#[async_trait]
impl SessionAuthenticator for VenueSession {
    async fn refresh(&self) -> ExchangeResult<()> {
        let refresh_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty());

        let tokens = match refresh_token {
            Some(token) => match self.renew(&token).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    log::warn!("Session renewal failed, logging in again: {}", e);
                    self.login().await?
                }
            },
            None => self.login().await?,
        };

        *self.tokens.write().await = Some(tokens);
        log::info!("Market venue session established for {}", self.credentials.client_code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Base32 of the RFC 6238 SHA-1 test key "12345678901234567890".
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn codes_match_reference_vectors() {
        let totp = TotpGenerator::from_base32(RFC_SECRET).unwrap();
        assert_eq!(totp.code_at(59), "287082");
        assert_eq!(totp.code_at(1111111109), "081804");
        assert_eq!(totp.code_at(1234567890), "005924");
    }

    #[test]
    fn logins_in_later_windows_get_new_codes() {
        let totp = TotpGenerator::from_base32(&RFC_SECRET.to_lowercase()).unwrap();
        let first = totp.code_at(1111111109);
        let later = totp.code_at(1111111109 + 30);
        assert_ne!(first, later);
        assert_eq!(totp.code_at(1111111109 - 1), first);
        assert_eq!(totp.current().len(), 6);
    }

    #[test]
    fn rejects_malformed_secret() {
        assert!(TotpGenerator::from_base32("not base32!").is_err());
        assert!(TotpGenerator::from_base32("").is_err());
    }
}
