use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::SweepError,
    horizon::{
        models::{HorizonProblem, RawSubmission, SubmitSuccess},
        LedgerClient,
    },
    sweep::composer::SignedTransaction,
};

/// How a failure is surfaced to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reporting {
    /// One notification
    Notify,
    /// Local log only
    LogOnly,
}

/// Known failure details and how they are reported.
///
/// Matching is by substring against the message the ledger returned, so this is
/// best-effort: a reworded upstream message silently falls back to `Notify`.
const KNOWN_DETAILS: &[(&str, Reporting)] = &[(
    "The transaction failed when submitted to the stellar network",
    Reporting::LogOnly,
)];

pub fn reporting_for(message: &str) -> Reporting {
    KNOWN_DETAILS
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, reporting)| *reporting)
        .unwrap_or(Reporting::Notify)
}

pub struct Submitter {
    client: Arc<dyn LedgerClient>,
}

impl Submitter {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    /// Submits and returns the transaction hash
    pub async fn submit(&self, tx: &SignedTransaction) -> Result<String, SweepError> {
        let raw = self.client.post_transaction(&tx.envelope_xdr).await?;
        let hash = classify_response(&raw, &tx.hash)?;
        info!("Transaction accepted: {}", hash);
        Ok(hash)
    }
}

/// Maps a raw submission answer to the hash or a classified error.
///
/// Detail precedence: problem `detail`, then the raw body, then the status line.
pub fn classify_response(raw: &RawSubmission, local_hash: &str) -> Result<String, SweepError> {
    if (200..300).contains(&raw.status) {
        let hash = serde_json::from_str::<SubmitSuccess>(&raw.body)
            .map(|s| s.hash)
            .unwrap_or_else(|_| local_hash.to_string());
        return Ok(hash);
    }

    let problem = serde_json::from_str::<HorizonProblem>(&raw.body).unwrap_or_default();

    if raw.status == 404 {
        return Err(SweepError::AccountNotFound(
            problem.detail.unwrap_or_else(|| "source account".to_string()),
        ));
    }

    let result_codes = problem
        .extras
        .as_ref()
        .and_then(|extras| extras.result_codes.as_ref())
        .map(|codes| codes.summary());

    let detail = problem
        .detail
        .filter(|d| !d.trim().is_empty())
        .or_else(|| {
            let body = raw.body.trim();
            (!body.is_empty()).then(|| body.to_string())
        })
        .or(problem.title)
        .unwrap_or_else(|| format!("Request failed with status code {}", raw.status));

    if let Some(codes) = &result_codes {
        warn!("Submission rejected ({}): {}", raw.status, codes);
    }

    Err(SweepError::SubmissionRejected {
        status: raw.status,
        detail,
        result_codes,
    })
}
