use std::{str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    error::SweepError,
    horizon::{models::AccountRecord, LedgerClient},
};

/// Upper bound on claimable balances fetched per account
pub const CLAIMABLE_PAGE_LIMIT: u32 = 200;

/// A pending claimable balance held for the swept account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimableBalance {
    pub id: String,
    pub amount: Decimal,
}

/// Spendable state of an account at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub sequence: i64,
    pub native_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub account: AccountState,
    pub claims: Vec<ClaimableBalance>,
}

impl Discovery {
    pub fn claimed_total(&self) -> Decimal {
        self.claims.iter().map(|c| c.amount).sum()
    }
}

pub struct BalanceDiscoverer {
    client: Arc<dyn LedgerClient>,
    claim_limit: u32,
}

impl BalanceDiscoverer {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            claim_limit: CLAIMABLE_PAGE_LIMIT,
        }
    }

    /// Account state plus native claimable balances
    pub async fn discover(&self, address: &str) -> Result<Discovery, SweepError> {
        let account = self.account_state(address).await?;

        let records = self
            .client
            .claimable_balances(address, self.claim_limit)
            .await?;

        let total = records.len();
        let mut claims = Vec::with_capacity(total);
        for record in records {
            // claiming a credit asset needs a trustline and would sink the whole transaction
            if record.asset != "native" {
                continue;
            }
            claims.push(ClaimableBalance {
                amount: parse_amount(&record.amount)?,
                id: record.id,
            });
        }

        if claims.len() < total {
            warn!(
                "Skipping {} non-native claimable balance(s) for {}",
                total - claims.len(),
                address
            );
        }
        debug!("{} claimable balance(s) found for {}", claims.len(), address);

        Ok(Discovery { account, claims })
    }

    /// Fresh read of sequence number and native balance
    pub async fn account_state(&self, address: &str) -> Result<AccountState, SweepError> {
        let record = self.client.load_account(address).await?;
        account_state_from(&record)
    }

    pub async fn base_fee(&self) -> Result<u32, SweepError> {
        self.client.fetch_base_fee().await
    }
}

fn account_state_from(record: &AccountRecord) -> Result<AccountState, SweepError> {
    let sequence = record.sequence.parse::<i64>().map_err(|_| {
        SweepError::Network(format!(
            "Invalid sequence number for {}: {:?}",
            record.account_id, record.sequence
        ))
    })?;

    Ok(AccountState {
        sequence,
        native_balance: parse_amount(record.native_balance())?,
    })
}

fn parse_amount(raw: &str) -> Result<Decimal, SweepError> {
    Decimal::from_str(raw)
        .map_err(|_| SweepError::Network(format!("Malformed amount from ledger: {:?}", raw)))
}
