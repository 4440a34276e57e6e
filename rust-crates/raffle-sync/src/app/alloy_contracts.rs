use crate::app::{
    claim::{
        ChainFailure,
        ClaimChain,
        TxConfirmation,
    },
    contract_reader::{
        PlayerSlot,
        RaffleReader,
    },
    entry::RaffleWriter,
};
use alloy::{
    contract::Error as ContractError,
    network::ReceiptResponse,
    primitives::{
        Address,
        B256,
        U256,
    },
    providers::Provider,
    transports::RpcError,
};
use anyhow::Context;
use generated_abi::{
    airdrop_types::IMerkleAirdrop::{
        self,
        IMerkleAirdropErrors,
        IMerkleAirdropInstance,
    },
    raffle_types::IRaffle::{
        self,
        IRaffleErrors,
        IRaffleInstance,
    },
};
use std::time::Duration;
use tracing::info;

pub struct AlloyRaffle<P> {
    instance: IRaffleInstance<P>,
    confirmation_timeout: Duration,
}

impl<P: Provider> AlloyRaffle<P> {
    pub fn new(address: Address, provider: P, confirmation_timeout: Duration) -> Self {
        Self {
            instance: IRaffle::new(address, provider),
            confirmation_timeout,
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }
}

impl<P: Provider> RaffleReader for AlloyRaffle<P> {
    async fn entrance_fee(&self) -> crate::Result<U256> {
        let fee = self
            .instance
            .getEntranceFee()
            .call()
            .await
            .context("getEntranceFee call failed")?;
        Ok(fee)
    }

    async fn player(&self, index: u64) -> crate::Result<PlayerSlot> {
        match self.instance.getPlayer(U256::from(index)).call().await {
            Ok(player) => Ok(PlayerSlot::Occupied(player)),
            Err(err) if is_revert(&err) => Ok(PlayerSlot::OutOfRange),
            Err(err) => Err(anyhow::Error::new(err).context(format!("getPlayer({index}) call failed"))),
        }
    }

    async fn winner(&self) -> crate::Result<Option<Address>> {
        let winner = self
            .instance
            .getWinner()
            .call()
            .await
            .context("getWinner call failed")?;
        Ok((winner != Address::ZERO).then_some(winner))
    }
}

impl<P: Provider> RaffleWriter for AlloyRaffle<P> {
    async fn enter_raffle(
        &self,
        value: U256,
        gas_limit: u64,
    ) -> Result<TxConfirmation, ChainFailure> {
        let pending = self
            .instance
            .enterRaffle()
            .value(value)
            .gas(gas_limit)
            .send()
            .await
            .map_err(|err| chain_failure(&err))?;
        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, "enterRaffle submitted");
        await_confirmation(pending, tx_hash, self.confirmation_timeout).await
    }
}

pub struct AlloyAirdrop<P> {
    instance: IMerkleAirdropInstance<P>,
    confirmation_timeout: Duration,
}

impl<P: Provider> AlloyAirdrop<P> {
    pub fn new(address: Address, provider: P, confirmation_timeout: Duration) -> Self {
        Self {
            instance: IMerkleAirdrop::new(address, provider),
            confirmation_timeout,
        }
    }
}

impl<P: Provider> ClaimChain for AlloyAirdrop<P> {
    async fn claim_default(
        &self,
        account: Address,
        tier: u8,
        proof: Vec<B256>,
    ) -> Result<TxConfirmation, ChainFailure> {
        let pending = self
            .instance
            .claimDefault(account, tier, proof)
            .send()
            .await
            .map_err(|err| chain_failure(&err))?;
        let tx_hash = *pending.tx_hash();
        // Shown to the user before the receipt arrives.
        info!(%account, %tx_hash, "claim submitted");
        await_confirmation(pending, tx_hash, self.confirmation_timeout).await
    }
}

async fn await_confirmation<N: alloy::network::Network>(
    pending: alloy::providers::PendingTransactionBuilder<N>,
    tx_hash: B256,
    timeout: Duration,
) -> Result<TxConfirmation, ChainFailure> {
    let receipt = pending
        .with_timeout(Some(timeout))
        .get_receipt()
        .await
        .map_err(|err| {
            ChainFailure::new(None, format!("waiting for {tx_hash} failed: {err}"))
        })?;
    Ok(TxConfirmation {
        tx_hash,
        succeeded: receipt.status(),
    })
}

fn is_revert(err: &ContractError) -> bool {
    err.as_revert_data().is_some() || err.to_string().to_lowercase().contains("revert")
}

fn chain_failure(err: &ContractError) -> ChainFailure {
    let code = match err {
        ContractError::TransportError(RpcError::ErrorResp(payload)) => Some(payload.code),
        _ => None,
    };
    let message = match decoded_revert_name(err) {
        Some(name) => format!("execution reverted: {name}"),
        None => err.to_string(),
    };
    ChainFailure::new(code, message)
}

fn decoded_revert_name(err: &ContractError) -> Option<&'static str> {
    if let Some(decoded) = err.as_decoded_interface_error::<IMerkleAirdropErrors>() {
        return Some(match decoded {
            IMerkleAirdropErrors::MerkleAirdrop__AlreadyClaimed(_) => {
                "MerkleAirdrop__AlreadyClaimed"
            }
            IMerkleAirdropErrors::MerkleAirdrop__InvalidProof(_) => {
                "MerkleAirdrop__InvalidProof"
            }
        });
    }
    let decoded = err.as_decoded_interface_error::<IRaffleErrors>()?;
    Some(match decoded {
        IRaffleErrors::Raffle_RaffleNotOpen(_) => "Raffle_RaffleNotOpen",
        IRaffleErrors::Raffle_SendMoreToEnterRaffle(_) => "Raffle_SendMoreToEnterRaffle",
        IRaffleErrors::Raffle_TransferFailed(_) => "Raffle_TransferFailed",
        IRaffleErrors::Raffle_UpkeepNotNeeded(_) => "Raffle_UpkeepNotNeeded",
        IRaffleErrors::ZeroAddress(_) => "ZeroAddress",
    })
}
