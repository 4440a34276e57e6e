use alloy::primitives::{
    Address,
    B256,
    U256,
    utils::format_ether,
};
use raffle_sync::app::{
    claim::{
        ChainFailure,
        ClaimChain,
        TxConfirmation,
    },
    entry::RaffleWriter,
};
use std::io::{
    self,
    Write,
};

/// Asks on the terminal before anything is signed. Declining surfaces as a
/// wallet rejection.
pub struct PromptApproval<T> {
    inner: T,
    auto_approve: bool,
}

impl<T> PromptApproval<T> {
    pub fn new(inner: T, auto_approve: bool) -> Self {
        Self {
            inner,
            auto_approve,
        }
    }

    async fn approve(&self, question: String) -> bool {
        if self.auto_approve {
            return true;
        }
        tokio::task::spawn_blocking(move || {
            print!("{question} [y/N] ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            io::stdin().read_line(&mut line).is_ok() && is_affirmative(&line)
        })
        .await
        .unwrap_or(false)
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

impl<C: ClaimChain> ClaimChain for PromptApproval<C> {
    async fn claim_default(
        &self,
        account: Address,
        tier: u8,
        proof: Vec<B256>,
    ) -> Result<TxConfirmation, ChainFailure> {
        let question = format!("Claim the tier {tier} airdrop for {account}?");
        if !self.approve(question).await {
            return Err(ChainFailure::user_rejected());
        }
        self.inner.claim_default(account, tier, proof).await
    }
}

impl<W: RaffleWriter> RaffleWriter for PromptApproval<W> {
    async fn enter_raffle(
        &self,
        value: U256,
        gas_limit: u64,
    ) -> Result<TxConfirmation, ChainFailure> {
        let question = format!("Enter the raffle for {} ETH?", format_ether(value));
        if !self.approve(question).await {
            return Err(ChainFailure::user_rejected());
        }
        self.inner.enter_raffle(value, gas_limit).await
    }
}
