use serde::Deserialize;

/// `GET /accounts/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRecord {
    pub account_id: String,
    /// Horizon encodes the int64 sequence as a string
    pub sequence: String,
    #[serde(default)]
    pub balances: Vec<BalanceLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceLine {
    pub balance: String,
    pub asset_type: String,
}

impl AccountRecord {
    /// Native balance as reported, `"0"` when the account holds no native line
    pub fn native_balance(&self) -> &str {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| b.balance.as_str())
            .unwrap_or("0")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "_embedded")]
    pub embedded: Embedded<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Embedded<T> {
    pub records: Vec<T>,
}

/// `GET /claimable_balances?claimant=...`
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimableBalanceRecord {
    /// Hex-encoded XDR `ClaimableBalanceID`
    pub id: String,
    /// `"native"` or `"CODE:ISSUER"`
    pub asset: String,
    pub amount: String,
}

/// `GET /fee_stats`
#[derive(Debug, Clone, Deserialize)]
pub struct FeeStats {
    pub last_ledger_base_fee: String,
}

/// Successful `POST /transactions`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitSuccess {
    pub hash: String,
}

/// RFC 7807 problem document returned by Horizon on failure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HorizonProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub extras: Option<ProblemExtras>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemExtras {
    #[serde(default)]
    pub result_codes: Option<ResultCodes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultCodes {
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub operations: Vec<String>,
}

impl ResultCodes {
    /// `tx_failed [op_success, op_underfunded]`
    pub fn summary(&self) -> String {
        let tx = self.transaction.as_deref().unwrap_or("unknown");
        if self.operations.is_empty() {
            tx.to_string()
        } else {
            format!("{} [{}]", tx, self.operations.join(", "))
        }
    }
}

/// Raw answer to a submission; classification happens in the submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSubmission {
    pub status: u16,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_balance_lookup() {
        let record: AccountRecord = serde_json::from_value(serde_json::json!({
            "account_id": "GABC",
            "sequence": "4294967296",
            "balances": [
                {"balance": "10.0000000", "asset_type": "credit_alphanum4"},
                {"balance": "5.5000000", "asset_type": "native"}
            ]
        }))
        .unwrap();

        assert_eq!(record.native_balance(), "5.5000000");
    }

    #[test]
    fn test_problem_result_codes_summary() {
        let problem: HorizonProblem = serde_json::from_value(serde_json::json!({
            "title": "Transaction Failed",
            "status": 400,
            "detail": "The transaction failed when submitted to the stellar network.",
            "extras": {
                "result_codes": {
                    "transaction": "tx_failed",
                    "operations": ["op_success", "op_underfunded"]
                }
            }
        }))
        .unwrap();

        let codes = problem.extras.unwrap().result_codes.unwrap();
        assert_eq!(codes.summary(), "tx_failed [op_success, op_underfunded]");
    }
}
