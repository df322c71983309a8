use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::{AppError, AppResult, SweepError},
    horizon::models::*,
};

/// Base fee used when `/fee_stats` does not report one (stroops)
pub const DEFAULT_BASE_FEE: u32 = 100;

/// Ledger network collaborator used by the sweep core
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fails with `AccountNotFound` when the account was never activated
    async fn load_account(&self, address: &str) -> Result<AccountRecord, SweepError>;

    /// Current per-operation base fee in stroops
    async fn fetch_base_fee(&self) -> Result<u32, SweepError>;

    async fn claimable_balances(
        &self,
        claimant: &str,
        limit: u32,
    ) -> Result<Vec<ClaimableBalanceRecord>, SweepError>;

    /// Posts a base64 envelope. Only transport failures are errors here;
    /// any HTTP answer comes back as a `RawSubmission`.
    async fn post_transaction(&self, envelope_xdr: &str) -> Result<RawSubmission, SweepError>;
}

/// Horizon REST client
pub struct HorizonClient {
    base_url: String,
    client: reqwest::Client,
}

impl HorizonClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, Option<T>), SweepError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| SweepError::Network(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok((status, None));
        }

        if !status.is_success() {
            let problem = response
                .json::<HorizonProblem>()
                .await
                .unwrap_or_default();
            let message = problem
                .detail
                .or(problem.title)
                .unwrap_or_else(|| format!("Horizon returned {} for {}", status, path));
            return Err(SweepError::Network(message));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| SweepError::Network(format!("Malformed response from {}: {}", path, e)))?;

        Ok((status, Some(parsed)))
    }
}

#[async_trait]
impl LedgerClient for HorizonClient {
    async fn load_account(&self, address: &str) -> Result<AccountRecord, SweepError> {
        match self
            .get_json::<AccountRecord>(&format!("/accounts/{}", address), &[])
            .await?
        {
            (_, Some(account)) => Ok(account),
            (_, None) => Err(SweepError::AccountNotFound(address.to_string())),
        }
    }

    async fn fetch_base_fee(&self) -> Result<u32, SweepError> {
        match self.get_json::<FeeStats>("/fee_stats", &[]).await? {
            (_, Some(stats)) => Ok(stats
                .last_ledger_base_fee
                .parse::<u32>()
                .unwrap_or(DEFAULT_BASE_FEE)),
            (status, None) => Err(SweepError::Network(format!(
                "Horizon returned {} for /fee_stats",
                status
            ))),
        }
    }

    async fn claimable_balances(
        &self,
        claimant: &str,
        limit: u32,
    ) -> Result<Vec<ClaimableBalanceRecord>, SweepError> {
        let query = [
            ("claimant", claimant.to_string()),
            ("limit", limit.to_string()),
        ];

        match self
            .get_json::<Page<ClaimableBalanceRecord>>("/claimable_balances", &query)
            .await?
        {
            (_, Some(page)) => Ok(page.embedded.records),
            // an unknown claimant has nothing to claim
            (_, None) => Ok(Vec::new()),
        }
    }

    async fn post_transaction(&self, envelope_xdr: &str) -> Result<RawSubmission, SweepError> {
        let url = format!("{}/transactions", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[("tx", envelope_xdr)])
            .send()
            .await
            .map_err(|e| SweepError::Network(format!("Failed to submit transaction: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SweepError::Network(format!("Failed to read submit response: {}", e)))?;

        Ok(RawSubmission { status, body })
    }
}
