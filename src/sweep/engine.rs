use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::{
    error::{AppError, AppResult, SweepError},
    events::{EventBroadcaster, LogLevel},
    horizon::LedgerClient,
    notify::NotificationSink,
    sweep::{
        composer::{PlanMode, SweepPlan, TransactionComposer},
        discovery::{BalanceDiscoverer, Discovery},
        keys::{AccountKeypair, KeyDeriver},
        submitter::{reporting_for, Reporting, Submitter},
    },
};

/// Accounts and destination for one bot run
#[derive(Debug, Clone)]
pub struct SweepJob {
    phrases: Vec<String>,
    composer: TransactionComposer,
}

impl SweepJob {
    pub fn new(phrases: Vec<String>, composer: TransactionComposer) -> AppResult<Self> {
        if phrases.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one seed phrase is required".to_string(),
            ));
        }
        Ok(Self { phrases, composer })
    }

    pub fn account_count(&self) -> usize {
        self.phrases.len()
    }

    pub fn recipient(&self) -> &str {
        self.composer.recipient()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReceipt {
    pub mode: PlanMode,
    pub address: String,
    pub hash: String,
    /// Native amount forwarded to the recipient
    pub amount: Decimal,
    pub claimed: Decimal,
}

/// Outcome of one account step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepResult {
    Swept(SweepReceipt),
    /// Plan had no operations
    NothingToDo,
    Failed {
        error: SweepError,
        reporting: Reporting,
    },
}

/// Result of the claim-and-send attempt
#[derive(Debug)]
enum CombinedOutcome {
    Success(SweepReceipt),
    RequiresFallback(SweepError),
    Fatal(SweepError),
}

/// Runs the per-account sweep: derive, discover, combined attempt, fallback
pub struct SweepEngine {
    deriver: KeyDeriver,
    discoverer: BalanceDiscoverer,
    submitter: Submitter,
    notifier: Arc<dyn NotificationSink>,
    events: EventBroadcaster,
    explorer_tx_url: String,
}

impl SweepEngine {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        notifier: Arc<dyn NotificationSink>,
        events: EventBroadcaster,
        explorer_tx_url: &str,
    ) -> Self {
        Self {
            deriver: KeyDeriver::default(),
            discoverer: BalanceDiscoverer::new(client.clone()),
            submitter: Submitter::new(client),
            notifier,
            events,
            explorer_tx_url: explorer_tx_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Never fails: every error is classified, reported and returned as a result
    #[instrument(skip(self, job), fields(wallet = index + 1))]
    pub async fn process_wallet(&self, job: &SweepJob, index: usize) -> SweepResult {
        let Some(phrase) = job.phrases.get(index) else {
            let error = SweepError::Compose(format!("No account at index {}", index));
            return self.report_failure(index, None, error);
        };

        let keypair = match self.deriver.derive(phrase) {
            Ok(keypair) => keypair,
            Err(e) => return self.report_failure(index, None, e),
        };

        match self.sweep(job, index, &keypair).await {
            Ok(Some(receipt)) => SweepResult::Swept(receipt),
            Ok(None) => SweepResult::NothingToDo,
            Err(e) => self.report_failure(index, Some(keypair.address()), e),
        }
    }

    async fn sweep(
        &self,
        job: &SweepJob,
        index: usize,
        keypair: &AccountKeypair,
    ) -> Result<Option<SweepReceipt>, SweepError> {
        let address = keypair.address();
        self.log(
            LogLevel::Info,
            format!("Processing wallet #{}: {}", index + 1, address),
        );

        let discovery = self.discoverer.discover(address).await?;
        let base_fee = self.discoverer.base_fee().await?;
        self.log(
            LogLevel::Info,
            format!("Current balance: {:.7} π", discovery.account.native_balance),
        );
        if !discovery.claims.is_empty() {
            self.log(
                LogLevel::Info,
                format!(
                    "Found {} claimable balance(s): {:.7} π",
                    discovery.claims.len(),
                    discovery.claimed_total()
                ),
            );
        }

        if !discovery.claims.is_empty() {
            match self.try_combined(job, keypair, &discovery, base_fee).await {
                CombinedOutcome::Success(receipt) => {
                    self.notify_success(&receipt);
                    return Ok(Some(receipt));
                }
                CombinedOutcome::RequiresFallback(e) => {
                    self.log(
                        LogLevel::Error,
                        format!(
                            "❌ Combined transaction failed: {}. Trying fallback...",
                            e.operator_message()
                        ),
                    );
                }
                CombinedOutcome::Fatal(e) => return Err(e),
            }
        }

        // balance and sequence are re-read; the discovery snapshot may be stale
        let account = self.discoverer.account_state(address).await?;

        let plan = SweepPlan::plain(&account, base_fee);
        let Some(signed) = job
            .composer
            .compose(&plan, keypair, account.sequence, now_unix())?
        else {
            self.log(
                LogLevel::Info,
                "Nothing to do for this wallet (balance too low).",
            );
            return Ok(None);
        };

        let amount = plan.payment.unwrap_or_default();
        self.log(
            LogLevel::Info,
            format!("[Fallback] Sending existing balance: {:.7} π", amount),
        );

        let hash = self.submitter.submit(&signed).await?;
        let receipt = SweepReceipt {
            mode: PlanMode::Plain,
            address: address.to_string(),
            hash,
            amount,
            claimed: Decimal::ZERO,
        };
        self.notify_success(&receipt);
        Ok(Some(receipt))
    }

    async fn try_combined(
        &self,
        job: &SweepJob,
        keypair: &AccountKeypair,
        discovery: &Discovery,
        base_fee: u32,
    ) -> CombinedOutcome {
        let plan = SweepPlan::combined(&discovery.account, discovery.claims.clone(), base_fee);
        self.log(
            LogLevel::Info,
            format!(
                "Claiming {:.7} π and sending ~{:.7} π",
                plan.claimed_total(),
                plan.payment.unwrap_or_default()
            ),
        );

        let signed = match job.composer.compose(
            &plan,
            keypair,
            discovery.account.sequence,
            now_unix(),
        ) {
            Ok(Some(signed)) => signed,
            Ok(None) => {
                return CombinedOutcome::RequiresFallback(SweepError::Compose(
                    "Combined plan has no operations".to_string(),
                ))
            }
            Err(e) => return CombinedOutcome::RequiresFallback(e),
        };

        match self.submitter.submit(&signed).await {
            Ok(hash) => CombinedOutcome::Success(SweepReceipt {
                mode: PlanMode::Combined,
                address: keypair.address().to_string(),
                hash,
                amount: plan.payment.unwrap_or_default(),
                claimed: plan.claimed_total(),
            }),
            // no fallback can succeed on an account the ledger does not know
            Err(e @ SweepError::AccountNotFound(_)) => CombinedOutcome::Fatal(e),
            Err(e) => CombinedOutcome::RequiresFallback(e),
        }
    }

    fn notify_success(&self, receipt: &SweepReceipt) {
        let link = format!("{}/{}", self.explorer_tx_url, receipt.hash);

        let message = match receipt.mode {
            PlanMode::Combined => {
                self.log(
                    LogLevel::Success,
                    format!(
                        "✅ Combined transaction succeeded\nWallet: {}\nClaimed: {:.7} π\nHash: {}",
                        receipt.address, receipt.claimed, link
                    ),
                );
                format!(
                    "✅ *Combined Transaction Succeeded*\n*Wallet*: `{}`\n*Claimed*: {:.7} π\n*Sent*: {:.7} π\n*Hash*: [View Transaction]({})",
                    receipt.address, receipt.claimed, receipt.amount, link
                )
            }
            PlanMode::Plain => {
                self.log(
                    LogLevel::Success,
                    format!(
                        "✅ Fallback payment succeeded\nWallet: {}\nAmount: {:.7} π\nHash: {}",
                        receipt.address, receipt.amount, link
                    ),
                );
                format!(
                    "✅ *Fallback Payment Succeeded*\n*Wallet*: `{}`\n*Amount*: {:.7} π\n*Hash*: [View Transaction]({})",
                    receipt.address, receipt.amount, link
                )
            }
        };

        self.notifier.notify(message);
    }

    fn report_failure(&self, index: usize, address: Option<&str>, error: SweepError) -> SweepResult {
        let wallet = address
            .map(str::to_string)
            .unwrap_or_else(|| format!("Wallet #{}", index + 1));
        let message = error.operator_message();

        if let SweepError::SubmissionRejected {
            result_codes: Some(codes),
            ..
        } = &error
        {
            warn!("Result codes for {}: {}", wallet, codes);
        }

        error!("❌ Fatal wallet error for {}: {}", wallet, message);
        self.events.log(
            LogLevel::Error,
            format!("❌ Fatal wallet error\nWallet: {}\nMessage: {}", wallet, message),
        );

        let reporting = reporting_for(&message);
        match reporting {
            Reporting::Notify => self.notifier.notify(format!(
                "❌ *Fatal Wallet Error*\n*Wallet*: `{}`\n*Message*: `{}`",
                wallet,
                message.replace('`', "'")
            )),
            Reporting::LogOnly => {
                info!("--> Notification skipped for known 'transaction failed' error")
            }
        }

        SweepResult::Failed { error, reporting }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => warn!("{}", message),
            _ => info!("{}", message),
        }
        self.events.log(level, message);
    }
}

fn now_unix() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
