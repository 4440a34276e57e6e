use crate::snapshot::RaffleSnapshot;
use alloy::primitives::{
    Address,
    U256,
};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSlot {
    Occupied(Address),
    /// The contract reverted: no participant at this index.
    OutOfRange,
}

pub trait RaffleReader: Send + Sync {
    fn entrance_fee(&self) -> impl Future<Output = crate::Result<U256>> + Send;

    /// Must report a revert as [`PlayerSlot::OutOfRange`] and any other failure as an error.
    fn player(&self, index: u64) -> impl Future<Output = crate::Result<PlayerSlot>> + Send;

    /// `None` while no draw has happened yet.
    fn winner(&self) -> impl Future<Output = crate::Result<Option<Address>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{call} timed out after {timeout:?}")]
    Timeout {
        call: &'static str,
        timeout: Duration,
    },
    #[error("{call} failed: {detail}")]
    Provider { call: &'static str, detail: String },
}

/// Builds a [`RaffleSnapshot`] from contract reads.
///
/// Participants are probed by index from zero until the contract reverts or
/// `player_cap` slots have been read, so a raffle with more entrants than the
/// cap shows only the first `player_cap` of them.
pub struct ContractStateReader<R> {
    reader: R,
    player_cap: usize,
    call_timeout: Duration,
}

impl<R: RaffleReader> ContractStateReader<R> {
    pub fn new(reader: R, player_cap: usize, call_timeout: Duration) -> Self {
        Self {
            reader,
            player_cap,
            call_timeout,
        }
    }

    pub fn player_cap(&self) -> usize {
        self.player_cap
    }

    pub fn inner(&self) -> &R {
        &self.reader
    }

    pub async fn fetch_snapshot(&self) -> Result<RaffleSnapshot, FetchError> {
        let entrance_fee = self
            .bounded("getEntranceFee", self.reader.entrance_fee())
            .await?;
        let players = self.fetch_players().await?;
        let winner = self.bounded("getWinner", self.reader.winner()).await?;
        Ok(RaffleSnapshot {
            entrance_fee: Some(entrance_fee),
            players,
            winner,
        })
    }

    pub async fn fetch_entrance_fee(&self) -> Result<U256, FetchError> {
        self.bounded("getEntranceFee", self.reader.entrance_fee())
            .await
    }

    async fn fetch_players(&self) -> Result<Vec<Address>, FetchError> {
        let mut players = Vec::new();
        for index in 0..self.player_cap as u64 {
            match self.bounded("getPlayer", self.reader.player(index)).await? {
                PlayerSlot::Occupied(player) => players.push(player),
                PlayerSlot::OutOfRange => return Ok(players),
            }
        }
        debug!(cap = self.player_cap, "participant enumeration reached cap");
        Ok(players)
    }

    async fn bounded<T>(
        &self,
        call: &'static str,
        request: impl Future<Output = crate::Result<T>>,
    ) -> Result<T, FetchError> {
        match tokio::time::timeout(self.call_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(FetchError::Provider {
                call,
                detail: format!("{err:#}"),
            }),
            Err(_) => Err(FetchError::Timeout {
                call,
                timeout: self.call_timeout,
            }),
        }
    }
}
