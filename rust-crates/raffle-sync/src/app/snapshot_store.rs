use crate::{
    app::contract_reader::FetchError,
    snapshot::RaffleSnapshot,
};
use alloy::primitives::Address;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tokio::sync::watch;

/// Issued when a fetch starts. A completed fetch is applied only if nothing
/// newer reached the store in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A winner event or a later fetch landed while this one was in flight.
    Superseded,
    /// The fetch failed; the previous snapshot is still shown.
    Retained(FetchError),
    /// The owning screen is gone.
    Retired,
}

#[derive(Clone)]
pub struct SnapshotStore {
    state: Arc<Mutex<StoreState>>,
    publisher: Arc<watch::Sender<RaffleSnapshot>>,
}

#[derive(Default)]
struct StoreState {
    snapshot: RaffleSnapshot,
    generation: u64,
    next_sequence: u64,
    applied_sequence: Option<u64>,
    retired: bool,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(RaffleSnapshot::default());
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            publisher: Arc::new(publisher),
        }
    }

    pub fn current(&self) -> RaffleSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RaffleSnapshot> {
        self.publisher.subscribe()
    }

    pub fn is_retired(&self) -> bool {
        self.lock().retired
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        let mut state = self.lock();
        let ticket = FetchTicket {
            generation: state.generation,
            sequence: state.next_sequence,
        };
        state.next_sequence += 1;
        ticket
    }

    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<RaffleSnapshot, FetchError>,
    ) -> FetchOutcome {
        let mut state = self.lock();
        if state.retired {
            return FetchOutcome::Retired;
        }
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => return FetchOutcome::Retained(err),
        };
        let overtaken = state
            .applied_sequence
            .is_some_and(|applied| applied > ticket.sequence);
        if ticket.generation != state.generation || overtaken {
            return FetchOutcome::Superseded;
        }
        state.applied_sequence = Some(ticket.sequence);
        state.snapshot = snapshot;
        self.publisher.send_replace(state.snapshot.clone());
        FetchOutcome::Applied
    }

    /// Records a drawn winner. Returns `false` once the store is retired.
    pub fn apply_winner(&self, winner: Address) -> bool {
        let mut state = self.lock();
        if state.retired {
            return false;
        }
        state.snapshot.settle_winner(winner);
        state.generation += 1;
        self.publisher.send_replace(state.snapshot.clone());
        true
    }

    pub fn retire(&self) {
        self.lock().retired = true;
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
