use crate::app::{
    claim::{
        ChainFailure,
        FailureKind,
        TxConfirmation,
        classify_chain_failure,
    },
    contract_reader::{
        ContractStateReader,
        RaffleReader,
    },
    session::RefreshRequest,
};
use alloy::primitives::{
    B256,
    U256,
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};

pub trait RaffleWriter: Send + Sync {
    fn enter_raffle(
        &self,
        value: U256,
        gas_limit: u64,
    ) -> impl Future<Output = Result<TxConfirmation, ChainFailure>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Entered(B256),
    UserRejected,
    OtherFailure(String),
}

/// Pays the current entrance fee into the raffle.
pub struct EntryService<R, W> {
    reader: ContractStateReader<R>,
    writer: W,
    gas_limit: u64,
    refresh: Option<mpsc::UnboundedSender<RefreshRequest>>,
}

impl<R: RaffleReader, W: RaffleWriter> EntryService<R, W> {
    pub fn new(reader: ContractStateReader<R>, writer: W, gas_limit: u64) -> Self {
        Self {
            reader,
            writer,
            gas_limit,
            refresh: None,
        }
    }

    /// Asks a running session to re-read the raffle after a confirmed entry.
    pub fn with_refresh_requests(
        mut self,
        refresh: mpsc::UnboundedSender<RefreshRequest>,
    ) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub async fn enter(&self) -> EntryOutcome {
        let fee = match self.reader.fetch_entrance_fee().await {
            Ok(fee) => fee,
            Err(err) => {
                warn!(%err, "could not read entrance fee");
                return EntryOutcome::OtherFailure(err.to_string());
            }
        };
        match self.writer.enter_raffle(fee, self.gas_limit).await {
            Ok(TxConfirmation {
                tx_hash,
                succeeded: true,
            }) => {
                info!(%tx_hash, %fee, "raffle entered");
                if let Some(refresh) = &self.refresh {
                    let _ = refresh.send(RefreshRequest::Entered(tx_hash));
                }
                EntryOutcome::Entered(tx_hash)
            }
            Ok(TxConfirmation { tx_hash, .. }) => {
                EntryOutcome::OtherFailure(format!("transaction {tx_hash} reverted"))
            }
            Err(failure) => match classify_chain_failure(&failure) {
                FailureKind::UserRejected => EntryOutcome::UserRejected,
                FailureKind::AlreadyClaimed | FailureKind::Other => {
                    EntryOutcome::OtherFailure(failure.message)
                }
            },
        }
    }
}
