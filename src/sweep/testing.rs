//! In-memory ledger used by the sweep tests
use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::{
    error::SweepError,
    horizon::{
        models::{AccountRecord, BalanceLine, ClaimableBalanceRecord, RawSubmission},
        LedgerClient,
    },
};

pub struct MockLedger {
    exists: bool,
    /// Successive `load_account` balances; the last one repeats
    balances: Mutex<VecDeque<String>>,
    claims: Vec<ClaimableBalanceRecord>,
    responses: Mutex<VecDeque<RawSubmission>>,
    transport_down: bool,
    /// When set, every `load_account` waits for one permit
    gate: Option<Arc<Semaphore>>,
    pub loads: Mutex<usize>,
    pub submissions: Mutex<Vec<String>>,
}

impl MockLedger {
    pub fn new(balance: &str) -> Self {
        Self {
            exists: true,
            balances: Mutex::new(VecDeque::from(vec![balance.to_string()])),
            claims: Vec::new(),
            responses: Mutex::new(VecDeque::new()),
            transport_down: false,
            gate: None,
            loads: Mutex::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn missing_account() -> Self {
        Self {
            exists: false,
            ..Self::new("0")
        }
    }

    pub fn with_claim(mut self, id: &str, asset: &str, amount: &str) -> Self {
        self.claims.push(ClaimableBalanceRecord {
            id: id.to_string(),
            asset: asset.to_string(),
            amount: amount.to_string(),
        });
        self
    }

    /// Native claim with a well-formed V0 balance id
    pub fn with_native_claim(self, byte: u8, amount: &str) -> Self {
        let id = format!("00000000{}", hex::encode([byte; 32]));
        self.with_claim(&id, "native", amount)
    }

    /// Balance returned by the next `load_account` after the current ones
    pub fn then_balance(self, balance: &str) -> Self {
        self.balances.lock().push_back(balance.to_string());
        self
    }

    pub fn respond(self, status: u16, body: serde_json::Value) -> Self {
        self.responses.lock().push_back(RawSubmission {
            status,
            body: body.to_string(),
        });
        self
    }

    pub fn failing_transport(mut self) -> Self {
        self.transport_down = true;
        self
    }

    /// Holds every account load until the returned semaphore hands out a permit
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn load_count(&self) -> usize {
        *self.loads.lock()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn load_account(&self, address: &str) -> Result<AccountRecord, SweepError> {
        *self.loads.lock() += 1;
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| SweepError::Network("ledger gate closed".to_string()))?
                .forget();
        }
        if !self.exists {
            return Err(SweepError::AccountNotFound(address.to_string()));
        }

        let balance = {
            let mut balances = self.balances.lock();
            if balances.len() > 1 {
                balances.pop_front().unwrap_or_default()
            } else {
                balances.front().cloned().unwrap_or_default()
            }
        };

        Ok(AccountRecord {
            account_id: address.to_string(),
            sequence: "1000".to_string(),
            balances: vec![BalanceLine {
                balance,
                asset_type: "native".to_string(),
            }],
        })
    }

    async fn fetch_base_fee(&self) -> Result<u32, SweepError> {
        Ok(100)
    }

    async fn claimable_balances(
        &self,
        _claimant: &str,
        _limit: u32,
    ) -> Result<Vec<ClaimableBalanceRecord>, SweepError> {
        Ok(self.claims.clone())
    }

    async fn post_transaction(&self, envelope_xdr: &str) -> Result<RawSubmission, SweepError> {
        if self.transport_down {
            return Err(SweepError::Network("connection refused".to_string()));
        }
        self.submissions.lock().push(envelope_xdr.to_string());

        let index = self.submissions.lock().len();
        Ok(self.responses.lock().pop_front().unwrap_or_else(|| RawSubmission {
            status: 200,
            body: serde_json::json!({ "hash": format!("hash-{}", index) }).to_string(),
        }))
    }
}
