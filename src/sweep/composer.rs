use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    Asset, ClaimClaimableBalanceOp, ClaimableBalanceId, DecoratedSignature, Hash, Limits, Memo,
    MuxedAccount, Operation, OperationBody, PaymentOp, Preconditions, ReadXdr, SequenceNumber,
    Signature, SignatureHint, StringM, TimeBounds, TimePoint, Transaction, TransactionEnvelope,
    TransactionExt, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, WriteXdr,
};

use crate::{
    error::SweepError,
    sweep::{
        discovery::{AccountState, ClaimableBalance},
        keys::AccountKeypair,
    },
};

pub const STROOPS_PER_UNIT: i64 = 10_000_000;
pub const MAX_MEMO_BYTES: usize = 28;

/// Balance an account must keep to stay open (1 unit)
pub fn reserve() -> Decimal {
    Decimal::ONE
}

/// Amounts at or below 0.0000001 are not worth a payment
pub fn dust_threshold() -> Decimal {
    Decimal::new(1, 7)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Claims plus payment in one transaction
    Combined,
    /// Payment of the existing balance only
    Plain,
}

impl PlanMode {
    /// Seconds until the transaction expires
    pub fn timeout_secs(&self) -> u64 {
        match self {
            PlanMode::Combined => 60,
            PlanMode::Plain => 30,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlanMode::Combined => "combined",
            PlanMode::Plain => "fallback",
        }
    }
}

/// Operations and amounts for one account in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub mode: PlanMode,
    pub claims: Vec<ClaimableBalance>,
    /// Native amount forwarded to the recipient, if above dust
    pub payment: Option<Decimal>,
    pub fee: Decimal,
    pub net_amount: Decimal,
    base_fee: u32,
}

impl SweepPlan {
    /// available = balance + claims, fee = base_fee * (claims + 1)
    pub fn combined(account: &AccountState, claims: Vec<ClaimableBalance>, base_fee: u32) -> Self {
        let claimed: Decimal = claims.iter().map(|c| c.amount).sum();
        Self::build(
            PlanMode::Combined,
            account.native_balance + claimed,
            claims,
            base_fee,
        )
    }

    /// available = balance, fee = base_fee
    pub fn plain(account: &AccountState, base_fee: u32) -> Self {
        Self::build(PlanMode::Plain, account.native_balance, Vec::new(), base_fee)
    }

    fn build(mode: PlanMode, available: Decimal, claims: Vec<ClaimableBalance>, base_fee: u32) -> Self {
        let fee_stroops = i64::from(base_fee) * (claims.len() as i64 + 1);
        let fee = Decimal::new(fee_stroops, 7);
        let net_amount = (available - reserve() - fee)
            .round_dp_with_strategy(7, RoundingStrategy::ToZero);

        let payment = (net_amount > dust_threshold()).then_some(net_amount);

        Self {
            mode,
            claims,
            payment,
            fee,
            net_amount,
            base_fee,
        }
    }

    /// Nothing to claim and nothing worth sending
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.payment.is_none()
    }

    pub fn operation_count(&self) -> usize {
        self.claims.len() + usize::from(self.payment.is_some())
    }

    pub fn claimed_total(&self) -> Decimal {
        self.claims.iter().map(|c| c.amount).sum()
    }

    /// Transaction-level fee field: base fee times operation count
    pub fn transaction_fee(&self) -> Result<u32, SweepError> {
        u32::try_from(self.operation_count())
            .ok()
            .and_then(|ops| ops.checked_mul(self.base_fee))
            .ok_or_else(|| SweepError::Compose("Transaction fee overflows u32".to_string()))
    }
}

/// Ready-to-submit transaction
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// Base64 XDR `TransactionEnvelope`
    pub envelope_xdr: String,
    /// Hex SHA-256 of the signature payload (the ledger's transaction hash)
    pub hash: String,
}

/// Builds and signs sweep transactions for one recipient and memo
#[derive(Debug, Clone)]
pub struct TransactionComposer {
    network_id: [u8; 32],
    recipient: [u8; 32],
    recipient_address: String,
    memo: StringM<28>,
}

impl TransactionComposer {
    pub fn new(network_passphrase: &str, recipient: &str, memo: &str) -> Result<Self, SweepError> {
        let recipient_key = parse_address(recipient)?;

        if memo.len() > MAX_MEMO_BYTES {
            return Err(SweepError::Compose(format!(
                "Memo must be at most {} bytes, got {}",
                MAX_MEMO_BYTES,
                memo.len()
            )));
        }
        let memo = memo
            .as_bytes()
            .to_vec()
            .try_into()
            .map_err(|_| SweepError::Compose("Memo is not valid text".to_string()))?;

        let mut network_id = [0u8; 32];
        network_id.copy_from_slice(&Sha256::digest(network_passphrase.as_bytes()));

        Ok(Self {
            network_id,
            recipient: recipient_key,
            recipient_address: recipient.to_string(),
            memo,
        })
    }

    pub fn recipient(&self) -> &str {
        &self.recipient_address
    }

    /// Signs the plan. `None` when the plan has no operations.
    pub fn compose(
        &self,
        plan: &SweepPlan,
        keypair: &AccountKeypair,
        sequence: i64,
        now_unix: u64,
    ) -> Result<Option<SignedTransaction>, SweepError> {
        if plan.is_empty() {
            return Ok(None);
        }

        let mut operations = Vec::with_capacity(plan.operation_count());
        for claim in &plan.claims {
            operations.push(Operation {
                source_account: None,
                body: OperationBody::ClaimClaimableBalance(ClaimClaimableBalanceOp {
                    balance_id: parse_balance_id(&claim.id)?,
                }),
            });
        }

        if let Some(amount) = plan.payment {
            operations.push(Operation {
                source_account: None,
                body: OperationBody::Payment(PaymentOp {
                    destination: MuxedAccount::Ed25519(Uint256(self.recipient)),
                    asset: Asset::Native,
                    amount: to_stroops(amount)?,
                }),
            });
        }

        let seq_num = sequence
            .checked_add(1)
            .ok_or_else(|| SweepError::Compose("Sequence number overflow".to_string()))?;

        let tx = Transaction {
            source_account: MuxedAccount::Ed25519(Uint256(keypair.public_key_bytes())),
            fee: plan.transaction_fee()?,
            seq_num: SequenceNumber(seq_num),
            cond: Preconditions::Time(TimeBounds {
                min_time: TimePoint(0),
                max_time: TimePoint(now_unix + plan.mode.timeout_secs()),
            }),
            memo: Memo::Text(self.memo.clone()),
            operations: operations
                .try_into()
                .map_err(|_| SweepError::Compose("Too many operations for one transaction".to_string()))?,
            ext: TransactionExt::V0,
        };

        let payload = TransactionSignaturePayload {
            network_id: Hash(self.network_id),
            tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
        }
        .to_xdr(Limits::none())
        .map_err(|e| SweepError::Compose(format!("Failed to encode signature payload: {}", e)))?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(&payload));

        let signature = keypair.sign(&hash);
        let decorated = DecoratedSignature {
            hint: SignatureHint(keypair.signature_hint()),
            signature: Signature(
                signature
                    .to_vec()
                    .try_into()
                    .map_err(|_| SweepError::Compose("Invalid signature length".to_string()))?,
            ),
        };

        let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
            tx,
            signatures: vec![decorated]
                .try_into()
                .map_err(|_| SweepError::Compose("Failed to attach signature".to_string()))?,
        });

        let xdr = envelope
            .to_xdr(Limits::none())
            .map_err(|e| SweepError::Compose(format!("Failed to encode envelope: {}", e)))?;

        Ok(Some(SignedTransaction {
            envelope_xdr: BASE64.encode(xdr),
            hash: hex::encode(hash),
        }))
    }
}

/// Decodes a `G...` account address into its ed25519 key
pub fn parse_address(address: &str) -> Result<[u8; 32], SweepError> {
    if !address.starts_with('G') || address.len() != 56 {
        return Err(SweepError::Compose(format!(
            "Invalid recipient address: {}",
            address
        )));
    }

    stellar_strkey::ed25519::PublicKey::from_string(address)
        .map(|key| key.0)
        .map_err(|_| SweepError::Compose(format!("Invalid recipient address: {}", address)))
}

fn parse_balance_id(id: &str) -> Result<ClaimableBalanceId, SweepError> {
    let bytes = hex::decode(id)
        .map_err(|_| SweepError::Compose(format!("Invalid claimable balance id: {}", id)))?;
    ClaimableBalanceId::from_xdr(bytes, Limits::none())
        .map_err(|_| SweepError::Compose(format!("Invalid claimable balance id: {}", id)))
}

fn to_stroops(amount: Decimal) -> Result<i64, SweepError> {
    (amount * Decimal::from(STROOPS_PER_UNIT))
        .trunc()
        .to_i64()
        .ok_or_else(|| SweepError::Compose(format!("Amount out of range: {}", amount)))
}
