// src/infrastructure/accounts/mod.rs
// Account directory over HTTP

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::dto::{AccountListResponse, MarginResponse};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::Account;
use crate::domain::repository::AccountDirectory;
use crate::infrastructure::http::HttpClient;

pub struct HttpAccountDirectory {
    http: HttpClient,
    users_url: String,
    margin_url: Option<String>,
}

impl HttpAccountDirectory {
    pub fn new(http: HttpClient, users_url: impl Into<String>, margin_url: Option<String>) -> Self {
        Self {
            http,
            users_url: users_url.into(),
            margin_url,
        }
    }
}

#[async_trait]
impl AccountDirectory for HttpAccountDirectory {
    async fn active_accounts(&self) -> ExchangeResult<Vec<Account>> {
        let response = self.http.get(&self.users_url).send().await?;

        if !response.is_success() {
            log::warn!(
                "Account directory answered {}, treating as no active accounts",
                response.status
            );
            return Ok(Vec::new());
        }

        let list: AccountListResponse = response
            .json()
            .map_err(|e| ExchangeError::Account(e.to_string()))?;
        Ok(list.accounts.into_iter().map(Account::from).collect())
    }

    async fn available_margin(&self, account: &Account) -> ExchangeResult<Option<Decimal>> {
        let Some(base) = &self.margin_url else {
            return Ok(None);
        };

        let url = format!("{}/{}", base.trim_end_matches('/'), account.account_id);
        let response = self.http.get(&url).send().await?;
        if !response.is_success() {
            return Err(ExchangeError::Account(format!(
                "margin lookup for {} failed with status {}",
                account.account_id, response.status
            )));
        }

        let margin: MarginResponse = response.json()?;
        Ok(margin.available_cash)
    }
}
