use crate::app::eligibility_client::{
    BackendError,
    ClaimLookup,
};
use alloy::primitives::{
    Address,
    B256,
    U256,
};
use std::time::Duration;
use tracing::{
    info,
    warn,
};

/// EIP-1193 "user rejected request".
pub const USER_REJECTED_CODE: i64 = 4001;

const REJECTION_MARKERS: [&str; 3] = ["action_rejected", "user rejected", "user denied"];

pub trait EligibilityBackend: Send + Sync {
    fn lookup_claim(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<ClaimLookup, BackendError>> + Send;
}

/// A wallet or node refusing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ChainFailure {
    pub code: Option<i64>,
    pub message: String,
}

impl ChainFailure {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Some(USER_REJECTED_CODE), "user rejected the request")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfirmation {
    pub tx_hash: B256,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UserRejected,
    AlreadyClaimed,
    Other,
}

pub fn classify_chain_failure(failure: &ChainFailure) -> FailureKind {
    let lowered = failure.message.to_lowercase();
    if failure.code == Some(USER_REJECTED_CODE)
        || REJECTION_MARKERS.iter().any(|marker| lowered.contains(marker))
    {
        return FailureKind::UserRejected;
    }
    if failure.message.contains(generated_abi::ALREADY_CLAIMED_REVERT) {
        return FailureKind::AlreadyClaimed;
    }
    FailureKind::Other
}

pub trait ClaimChain: Send + Sync {
    fn claim_default(
        &self,
        account: Address,
        tier: u8,
        proof: Vec<B256>,
    ) -> impl Future<Output = Result<TxConfirmation, ChainFailure>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityOutcome {
    Eligible { proof: Vec<B256>, amount: U256 },
    NotEligible,
    ServerError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Success(B256),
    UserRejected,
    AlreadyClaimed,
    OtherFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    Unchecked,
    Eligible,
    NotEligible,
    AlreadyClaimed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityClaim {
    pub account: Address,
    pub proof: Vec<B256>,
    pub amount: U256,
    pub status: ClaimStatus,
    pub tx_hash: Option<B256>,
}

impl EligibilityClaim {
    pub fn open(account: Address) -> Self {
        Self {
            account,
            proof: Vec::new(),
            amount: U256::ZERO,
            status: ClaimStatus::Unchecked,
            tx_hash: None,
        }
    }

    pub fn can_submit(&self) -> bool {
        self.status == ClaimStatus::Eligible
    }
}

pub struct EligibilityClaimService<B, C> {
    backend: B,
    chain: C,
    tier: u8,
    lookup_timeout: Duration,
}

impl<B: EligibilityBackend, C: ClaimChain> EligibilityClaimService<B, C> {
    pub fn new(backend: B, chain: C, tier: u8, lookup_timeout: Duration) -> Self {
        Self {
            backend,
            chain,
            tier,
            lookup_timeout,
        }
    }

    pub fn tier(&self) -> u8 {
        self.tier
    }

    pub async fn check_eligibility(&self, account: Address) -> EligibilityOutcome {
        let lookup =
            tokio::time::timeout(self.lookup_timeout, self.backend.lookup_claim(account))
                .await
                .unwrap_or(Err(BackendError::Timeout(self.lookup_timeout)));
        match lookup {
            Ok(ClaimLookup::Eligible { proof, amount }) => {
                EligibilityOutcome::Eligible { proof, amount }
            }
            Ok(ClaimLookup::NotEligible) => EligibilityOutcome::NotEligible,
            Ok(ClaimLookup::Refused(message)) => EligibilityOutcome::ServerError(message),
            Err(err) => {
                warn!(%account, %err, "eligibility lookup failed");
                EligibilityOutcome::ServerError(err.to_string())
            }
        }
    }

    pub async fn submit_claim(
        &self,
        account: Address,
        tier: u8,
        proof: Vec<B256>,
    ) -> ClaimOutcome {
        match self.chain.claim_default(account, tier, proof).await {
            Ok(TxConfirmation {
                tx_hash,
                succeeded: true,
            }) => {
                info!(%account, %tx_hash, "claim confirmed");
                ClaimOutcome::Success(tx_hash)
            }
            Ok(TxConfirmation { tx_hash, .. }) => {
                ClaimOutcome::OtherFailure(format!("transaction {tx_hash} reverted"))
            }
            Err(failure) => match classify_chain_failure(&failure) {
                FailureKind::UserRejected => ClaimOutcome::UserRejected,
                FailureKind::AlreadyClaimed => ClaimOutcome::AlreadyClaimed,
                FailureKind::Other => ClaimOutcome::OtherFailure(failure.message),
            },
        }
    }

    /// Re-checks eligibility and stores the result on `claim`.
    pub async fn refresh(&self, claim: &mut EligibilityClaim) {
        match self.check_eligibility(claim.account).await {
            EligibilityOutcome::Eligible { proof, amount } => {
                claim.proof = proof;
                claim.amount = amount;
                claim.status = ClaimStatus::Eligible;
            }
            EligibilityOutcome::NotEligible => {
                claim.proof.clear();
                claim.status = ClaimStatus::NotEligible;
            }
            EligibilityOutcome::ServerError(detail) => {
                claim.status = ClaimStatus::Error(detail);
            }
        }
    }

    /// Submits `claim` with the service's tier. Ineligible claims are refused without a transaction.
    pub async fn claim(&self, claim: &mut EligibilityClaim) -> ClaimOutcome {
        if !claim.can_submit() {
            return ClaimOutcome::OtherFailure(format!(
                "account {} has no claimable allocation",
                claim.account
            ));
        }
        let outcome = self
            .submit_claim(claim.account, self.tier, claim.proof.clone())
            .await;
        match &outcome {
            ClaimOutcome::Success(tx_hash) => {
                claim.tx_hash = Some(*tx_hash);
                claim.status = ClaimStatus::AlreadyClaimed;
            }
            ClaimOutcome::AlreadyClaimed => claim.status = ClaimStatus::AlreadyClaimed,
            ClaimOutcome::UserRejected | ClaimOutcome::OtherFailure(_) => {}
        }
        outcome
    }
}
