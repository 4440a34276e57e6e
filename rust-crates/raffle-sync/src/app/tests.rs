#![allow(non_snake_case)]

use crate::{
    Result,
    app::{
        claim::{
            ChainFailure,
            TxConfirmation,
        },
        contract_reader::{
            ContractStateReader,
            FetchError,
            PlayerSlot,
            RaffleReader,
        },
        eligibility_client::BackendError,
        entry::{
            EntryOutcome,
            EntryService,
            RaffleWriter,
        },
        event_source::{
            EventConnector,
            EventSource,
        },
        relay::{
            AchievementRecord,
            AchievementRelay,
            AddressBatch,
            RelayBackend,
            RelayPolicy,
            RelayReport,
            RelayStage,
        },
        session::RaffleSession,
        snapshot_store::{
            FetchOutcome,
            SnapshotStore,
        },
        subscription::{
            EventSubscriptionManager,
            SubscriptionState,
        },
    },
    events::RaffleEvent,
    ledger::AchievementLedger,
    snapshot::RaffleSnapshot,
};
use alloy::primitives::{
    Address,
    B256,
    U256,
};
use anyhow::anyhow;
use proptest::prelude::*;
use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::sync::{
    Notify,
    mpsc,
};

pub const RAFFLE: Address = generated_abi::LOCAL_RAFFLE_ADDRESS;
pub const CALL_TIMEOUT: Duration = Duration::from_secs(2);

pub fn player(n: u8) -> Address {
    Address::with_last_byte(n)
}

pub fn players(n: usize) -> Vec<Address> {
    (0..n).map(|i| player(i as u8 + 1)).collect()
}

pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[derive(Clone)]
pub struct FakeRaffleReader {
    fee: U256,
    players: Arc<Mutex<Vec<Address>>>,
    winner: Arc<Mutex<Option<Address>>>,
    fail_player_at: Option<u64>,
    delay: Option<Duration>,
    player_calls: Arc<AtomicUsize>,
}

impl FakeRaffleReader {
    pub fn new(fee: U256, players: Vec<Address>) -> Self {
        Self {
            fee,
            players: Arc::new(Mutex::new(players)),
            winner: Arc::new(Mutex::new(None)),
            fail_player_at: None,
            delay: None,
            player_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_player_at = Some(index);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_players(&self, players: Vec<Address>) {
        *self.players.lock().unwrap() = players;
    }

    pub fn player_calls(&self) -> usize {
        self.player_calls.load(Ordering::SeqCst)
    }
}

impl RaffleReader for FakeRaffleReader {
    async fn entrance_fee(&self) -> Result<U256> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.fee)
    }

    async fn player(&self, index: u64) -> Result<PlayerSlot> {
        self.player_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_player_at == Some(index) {
            return Err(anyhow!("connection reset by peer"));
        }
        let found = self.players.lock().unwrap().get(index as usize).copied();
        Ok(match found {
            Some(player) => PlayerSlot::Occupied(player),
            None => PlayerSlot::OutOfRange,
        })
    }

    async fn winner(&self) -> Result<Option<Address>> {
        Ok(*self.winner.lock().unwrap())
    }
}

#[derive(Clone, Default)]
pub struct FakeEventConnector {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<Vec<RaffleEvent>>>>>,
    connects: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl FakeEventConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        let connector = Self::default();
        connector.failures_remaining.store(times, Ordering::SeqCst);
        connector
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn fail_next(&self) {
        self.failures_remaining.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn emit(&self, events: Vec<RaffleEvent>) {
        for sender in self.senders.lock().unwrap().iter() {
            let _ = sender.send(events.clone());
        }
    }
}

impl EventConnector for FakeEventConnector {
    type Source = FakeEventSource;

    async fn connect(&self) -> Result<FakeEventSource> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("eth_newFilter rejected"));
        }
        let (send, recv) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(send);
        Ok(FakeEventSource { recv })
    }
}

pub struct FakeEventSource {
    recv: mpsc::UnboundedReceiver<Vec<RaffleEvent>>,
}

impl EventSource for FakeEventSource {
    async fn next_events(&mut self) -> Result<Option<Vec<RaffleEvent>>> {
        Ok(self.recv.recv().await)
    }
}

#[derive(Clone, Default)]
pub struct FakeRelayBackend {
    pub achievements: Arc<Mutex<Vec<AchievementRecord>>>,
    pub batches: Arc<Mutex<Vec<AddressBatch>>>,
    achievement_failures: Arc<AtomicUsize>,
    achievement_calls: Arc<AtomicUsize>,
}

impl FakeRelayBackend {
    pub fn failing_achievements(times: usize) -> Self {
        let backend = Self::default();
        backend.achievement_failures.store(times, Ordering::SeqCst);
        backend
    }

    pub fn achievement_calls(&self) -> usize {
        self.achievement_calls.load(Ordering::SeqCst)
    }
}

impl RelayBackend for FakeRelayBackend {
    async fn submit_achievement(
        &self,
        record: &AchievementRecord,
    ) -> std::result::Result<(), BackendError> {
        self.achievement_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .achievement_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BackendError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.achievements.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn submit_addresses(
        &self,
        batch: &AddressBatch,
    ) -> std::result::Result<(), BackendError> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub fn relay_with(
    backend: &FakeRelayBackend,
    policy: RelayPolicy,
) -> AchievementRelay<FakeRelayBackend> {
    AchievementRelay::new(
        Arc::new(AchievementLedger::new()),
        Arc::new(backend.clone()),
        policy,
        CALL_TIMEOUT,
    )
}

#[derive(Clone)]
pub struct FakeRaffleWriter {
    result: std::result::Result<TxConfirmation, ChainFailure>,
    pub calls: Arc<Mutex<Vec<(U256, u64)>>>,
}

impl FakeRaffleWriter {
    pub fn returning(result: std::result::Result<TxConfirmation, ChainFailure>) -> Self {
        Self {
            result,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RaffleWriter for FakeRaffleWriter {
    async fn enter_raffle(
        &self,
        value: U256,
        gas_limit: u64,
    ) -> std::result::Result<TxConfirmation, ChainFailure> {
        self.calls.lock().unwrap().push((value, gas_limit));
        self.result.clone()
    }
}

fn state_reader(reader: FakeRaffleReader, cap: usize) -> ContractStateReader<FakeRaffleReader> {
    ContractStateReader::new(reader, cap, CALL_TIMEOUT)
}

fn session_with(
    reader: FakeRaffleReader,
    manager: Arc<EventSubscriptionManager<FakeEventConnector>>,
    backend: &FakeRelayBackend,
) -> RaffleSession<FakeRaffleReader, FakeEventConnector, FakeRelayBackend> {
    RaffleSession::new(
        Arc::new(state_reader(reader, 10)),
        manager,
        relay_with(backend, RelayPolicy::BestEffort),
        Duration::from_secs(3600),
    )
}

#[tokio::test]
async fn fetch_snapshot__fewer_players_than_cap__stops_at_first_revert() {
    // given
    let fake = FakeRaffleReader::new(U256::from(10), players(3));
    let reader = state_reader(fake.clone(), 10);

    // when
    let snapshot = reader.fetch_snapshot().await.unwrap();

    // then
    assert_eq!(snapshot.players, players(3));
    assert_eq!(snapshot.entrance_fee, Some(U256::from(10)));
    assert_eq!(fake.player_calls(), 4);
}

#[tokio::test]
async fn fetch_snapshot__more_players_than_cap__truncates_at_cap() {
    // given
    let fake = FakeRaffleReader::new(U256::from(10), players(12));
    let reader = state_reader(fake.clone(), 10);

    // when
    let snapshot = reader.fetch_snapshot().await.unwrap();

    // then
    assert_eq!(snapshot.players, players(10));
    assert_eq!(fake.player_calls(), 10);
}

#[tokio::test]
async fn fetch_snapshot__non_revert_failure__is_a_fetch_error() {
    // given
    let fake = FakeRaffleReader::new(U256::from(10), players(3)).failing_at(1);
    let reader = state_reader(fake, 10);

    // when
    let result = reader.fetch_snapshot().await;

    // then
    assert!(matches!(
        result,
        Err(FetchError::Provider {
            call: "getPlayer",
            ..
        })
    ));
}

#[tokio::test]
async fn fetch_snapshot__unresponsive_node__times_out() {
    // given
    let fake = FakeRaffleReader::new(U256::from(10), players(1)).slow(Duration::from_secs(5));
    let reader = ContractStateReader::new(fake, 10, Duration::from_millis(20));

    // when
    let result = reader.fetch_snapshot().await;

    // then
    assert!(matches!(
        result,
        Err(FetchError::Timeout {
            call: "getEntranceFee",
            ..
        })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32, .. ProptestConfig::default()
    })]
    #[test]
    fn fetch_snapshot__returns_contract_order_prefix_bounded_by_cap(
        total in 0usize..20,
        cap in 0usize..15,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let snapshot = runtime.block_on(async {
            let fake = FakeRaffleReader::new(U256::from(1), players(total));
            state_reader(fake, cap).fetch_snapshot().await.unwrap()
        });
        let expected: Vec<Address> = players(total).into_iter().take(cap).collect();
        prop_assert_eq!(snapshot.players, expected);
    }
}

#[test]
fn complete_fetch__winner_landed_mid_fetch__is_superseded() {
    // given
    let store = SnapshotStore::new();
    let ticket = store.begin_fetch();
    store.apply_winner(player(9));

    // when
    let outcome = store.complete_fetch(
        ticket,
        Ok(RaffleSnapshot {
            entrance_fee: Some(U256::from(1)),
            players: players(2),
            winner: None,
        }),
    );

    // then
    assert_eq!(outcome, FetchOutcome::Superseded);
    let current = store.current();
    assert_eq!(current.winner, Some(player(9)));
    assert!(current.players.is_empty());
}

#[test]
fn complete_fetch__failed_read__retains_previous_snapshot() {
    // given
    let store = SnapshotStore::new();
    let previous = RaffleSnapshot {
        entrance_fee: Some(U256::from(5)),
        players: players(1),
        winner: None,
    };
    let first = store.begin_fetch();
    store.complete_fetch(first, Ok(previous.clone()));
    let second = store.begin_fetch();
    let error = FetchError::Timeout {
        call: "getWinner",
        timeout: CALL_TIMEOUT,
    };

    // when
    let outcome = store.complete_fetch(second, Err(error.clone()));

    // then
    assert_eq!(outcome, FetchOutcome::Retained(error));
    assert_eq!(store.current(), previous);
}

#[test]
fn complete_fetch__older_fetch_finishing_last__is_superseded() {
    // given
    let store = SnapshotStore::new();
    let older = store.begin_fetch();
    let newer = store.begin_fetch();
    let fresh = RaffleSnapshot {
        entrance_fee: Some(U256::from(1)),
        players: players(4),
        winner: None,
    };
    assert_eq!(store.complete_fetch(newer, Ok(fresh.clone())), FetchOutcome::Applied);

    // when
    let outcome = store.complete_fetch(older, Ok(RaffleSnapshot::default()));

    // then
    assert_eq!(outcome, FetchOutcome::Superseded);
    assert_eq!(store.current(), fresh);
}

#[test]
fn complete_fetch__after_retire__is_discarded() {
    // given
    let store = SnapshotStore::new();
    let ticket = store.begin_fetch();
    store.retire();

    // when
    let outcome = store.complete_fetch(ticket, Ok(RaffleSnapshot::default()));

    // then
    assert_eq!(outcome, FetchOutcome::Retired);
    assert!(!store.apply_winner(player(1)));
    assert_eq!(store.current(), RaffleSnapshot::default());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32, .. ProptestConfig::default()
    })]
    #[test]
    fn apply_winner__always_empties_players(count in 0usize..30, winner in 1u8..255) {
        let store = SnapshotStore::new();
        let ticket = store.begin_fetch();
        store.complete_fetch(ticket, Ok(RaffleSnapshot {
            entrance_fee: Some(U256::from(1)),
            players: players(count),
            winner: None,
        }));
        store.apply_winner(player(winner));
        let current = store.current();
        prop_assert!(current.players.is_empty());
        prop_assert_eq!(current.winner, Some(player(winner)));
    }
}

#[tokio::test]
async fn enter__wallet_confirms__pays_fee_with_fixed_gas() {
    // given
    let tx_hash = B256::repeat_byte(0x11);
    let writer = FakeRaffleWriter::returning(Ok(TxConfirmation {
        tx_hash,
        succeeded: true,
    }));
    let reader = state_reader(FakeRaffleReader::new(U256::from(10_000), vec![]), 10);
    let service = EntryService::new(reader, writer.clone(), 1_000_000);

    // when
    let outcome = service.enter().await;

    // then
    assert_eq!(outcome, EntryOutcome::Entered(tx_hash));
    assert_eq!(
        *writer.calls.lock().unwrap(),
        vec![(U256::from(10_000), 1_000_000)]
    );
}

#[tokio::test]
async fn enter__confirmed__asks_active_session_to_refresh() {
    // given
    let tx_hash = B256::repeat_byte(0x22);
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector));
    let fake = FakeRaffleReader::new(U256::from(10), players(1));
    let mut session = session_with(fake.clone(), manager, &FakeRelayBackend::default());
    session.activate().await;
    let writer = FakeRaffleWriter::returning(Ok(TxConfirmation {
        tx_hash,
        succeeded: true,
    }));
    let service = EntryService::new(state_reader(fake.clone(), 10), writer, 1_000_000)
        .with_refresh_requests(session.refresh_requests().unwrap());
    fake.set_players(players(2));

    // when
    let outcome = service.enter().await;

    // then
    assert_eq!(outcome, EntryOutcome::Entered(tx_hash));
    let store = session.store().clone();
    eventually(|| store.current().players.len() == 2).await;
}

#[tokio::test]
async fn enter__wallet_rejects__is_user_rejected() {
    // given
    let writer = FakeRaffleWriter::returning(Err(ChainFailure::user_rejected()));
    let reader = state_reader(FakeRaffleReader::new(U256::from(1), vec![]), 10);
    let service = EntryService::new(reader, writer, 1_000_000);

    // when
    let outcome = service.enter().await;

    // then
    assert_eq!(outcome, EntryOutcome::UserRejected);
}

#[tokio::test]
async fn enter__fee_unreadable__fails_without_sending() {
    // given
    let writer = FakeRaffleWriter::returning(Ok(TxConfirmation {
        tx_hash: B256::ZERO,
        succeeded: true,
    }));
    let reader = ContractStateReader::new(
        FakeRaffleReader::new(U256::from(1), vec![]).slow(Duration::from_secs(5)),
        10,
        Duration::from_millis(20),
    );
    let service = EntryService::new(reader, writer.clone(), 1_000_000);

    // when
    let outcome = service.enter().await;

    // then
    assert!(matches!(outcome, EntryOutcome::OtherFailure(_)));
    assert!(writer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn on_achievement_event__ledger_updated_before_relay_finishes() {
    // given
    let backend = FakeRelayBackend::default();
    let relay = relay_with(&backend, RelayPolicy::BestEffort);

    // when
    let handle = relay.on_achievement_event(player(1), U256::from(3));

    // then
    assert!(relay.ledger().contains(&player(1)));
    assert_eq!(handle.await.unwrap(), RelayReport::Delivered { batch_size: 1 });
    assert_eq!(
        *backend.achievements.lock().unwrap(),
        vec![AchievementRecord {
            player: player(1),
            achievement_id: U256::from(3),
        }]
    );
    assert_eq!(backend.batches.lock().unwrap()[0].addresses, vec![player(1)]);
}

#[tokio::test]
async fn relay__achievement_rejected__skips_address_list() {
    // given
    let backend = FakeRelayBackend::failing_achievements(1);
    let relay = relay_with(&backend, RelayPolicy::BestEffort);

    // when
    let report = relay.on_achievement_event(player(2), U256::from(1)).await.unwrap();

    // then
    assert!(matches!(
        report,
        RelayReport::Dropped {
            stage: RelayStage::Achievement,
            ..
        }
    ));
    assert!(backend.batches.lock().unwrap().is_empty());
    assert!(relay.ledger().contains(&player(2)));
}

#[tokio::test]
async fn relay__bounded_retry__recovers_from_transient_failure() {
    // given
    let backend = FakeRelayBackend::failing_achievements(2);
    let policy = RelayPolicy::BoundedRetry {
        attempts: 3,
        backoff: Duration::from_millis(1),
    };
    let relay = relay_with(&backend, policy);

    // when
    let report = relay.on_achievement_event(player(3), U256::from(1)).await.unwrap();

    // then
    assert_eq!(report, RelayReport::Delivered { batch_size: 1 });
    assert_eq!(backend.achievement_calls(), 3);
}

#[tokio::test]
async fn relay__second_player__sends_whole_ledger() {
    // given
    let backend = FakeRelayBackend::default();
    let relay = relay_with(&backend, RelayPolicy::BestEffort);
    relay.on_achievement_event(player(1), U256::from(1)).await.unwrap();

    // when
    relay.on_achievement_event(player(2), U256::from(4)).await.unwrap();

    // then
    let batches = backend.batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].addresses, vec![player(1), player(2)]);
    assert_eq!(batches[1].total_count, 2);
}

#[tokio::test]
async fn activate__loads_snapshot_and_registers_listeners() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let reader = FakeRaffleReader::new(U256::from(7), players(2));
    let mut session = session_with(reader, manager.clone(), &FakeRelayBackend::default());

    // when
    let outcome = session.activate().await;

    // then
    assert_eq!(outcome, FetchOutcome::Applied);
    assert_eq!(session.store().current().players, players(2));
    assert!(session.is_subscribed());
    assert_eq!(manager.state(), SubscriptionState::Active);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn winner_event__clears_players_in_session_store() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let reader = FakeRaffleReader::new(U256::from(7), players(3));
    let mut session = session_with(reader, manager, &FakeRelayBackend::default());
    session.activate().await;
    let mut updates = session.store().subscribe();

    // when
    connector.emit(vec![RaffleEvent::winner_picked(player(2))]);
    updates.changed().await.unwrap();

    // then
    let current = session.store().current();
    assert_eq!(current.winner, Some(player(2)));
    assert!(current.players.is_empty());
}

#[tokio::test]
async fn player_entered_event__refreshes_participants() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let reader = FakeRaffleReader::new(U256::from(7), players(1));
    let mut session = session_with(reader.clone(), manager, &FakeRelayBackend::default());
    session.activate().await;

    // when
    reader.set_players(players(2));
    connector.emit(vec![RaffleEvent::player_entered(player(2))]);

    // then
    let store = session.store().clone();
    eventually(|| store.current().players.len() == 2).await;
}

#[tokio::test]
async fn activate__second_screen__shares_existing_listeners() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let backend = FakeRelayBackend::default();
    let reader = FakeRaffleReader::new(U256::from(7), vec![]);
    let mut first = session_with(reader.clone(), manager.clone(), &backend);
    let mut second = session_with(reader, manager.clone(), &backend);
    first.activate().await;

    // when
    second.activate().await;

    // then
    assert!(first.is_subscribed());
    assert!(second.is_subscribed());
    assert_eq!(connector.connects(), 1);
    assert_eq!(manager.router_count(), 2);
    second.deactivate();
    assert_eq!(manager.state(), SubscriptionState::Active);
    assert!(first.is_subscribed());
}

#[tokio::test]
async fn winner_event__after_first_screen_leaves__reaches_second_screen() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let backend = FakeRelayBackend::default();
    let reader = FakeRaffleReader::new(U256::from(7), players(3));
    let mut first = session_with(reader.clone(), manager.clone(), &backend);
    let mut second = session_with(reader, manager.clone(), &backend);
    first.activate().await;
    second.activate().await;
    first.deactivate();
    let mut updates = second.store().subscribe();

    // when
    connector.emit(vec![RaffleEvent::winner_picked(player(9))]);
    updates.changed().await.unwrap();

    // then
    let current = second.store().current();
    assert_eq!(current.winner, Some(player(9)));
    assert!(current.players.is_empty());
    assert!(second.is_subscribed());
    assert_eq!(manager.state(), SubscriptionState::Active);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn winner_event__two_screens__reaches_both_stores() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let backend = FakeRelayBackend::default();
    let reader = FakeRaffleReader::new(U256::from(7), players(2));
    let mut first = session_with(reader.clone(), manager.clone(), &backend);
    let mut second = session_with(reader, manager, &backend);
    first.activate().await;
    second.activate().await;

    // when
    connector.emit(vec![
        RaffleEvent::winner_picked(player(4)),
        RaffleEvent::achievement_earned(player(4), U256::from(1)),
    ]);

    // then
    let (first_store, second_store) = (first.store().clone(), second.store().clone());
    eventually(|| {
        first_store.current().winner == Some(player(4))
            && second_store.current().winner == Some(player(4))
    })
    .await;
    eventually(|| backend.achievement_calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.achievement_calls(), 1);
}

#[tokio::test]
async fn deactivate__later_events__leave_store_untouched() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let reader = FakeRaffleReader::new(U256::from(7), players(2));
    let mut session = session_with(reader, manager.clone(), &FakeRelayBackend::default());
    session.activate().await;
    let before = session.store().current();

    // when
    session.deactivate();
    connector.emit(vec![RaffleEvent::winner_picked(player(5))]);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // then
    assert_eq!(session.store().current(), before);
    assert_eq!(manager.state(), SubscriptionState::Uninitialized);
}

#[tokio::test]
async fn activate__after_remount__registers_exactly_once_more() {
    // given
    let connector = FakeEventConnector::new();
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let backend = FakeRelayBackend::default();
    let reader = FakeRaffleReader::new(U256::from(7), vec![]);
    let mut first = session_with(reader.clone(), manager.clone(), &backend);
    first.activate().await;
    first.deactivate();
    let mut second = session_with(reader, manager, &backend);

    // when
    second.activate().await;
    connector.emit(vec![RaffleEvent::achievement_earned(player(4), U256::from(1))]);

    // then
    assert_eq!(connector.connects(), 2);
    eventually(|| backend.achievement_calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.achievement_calls(), 1);
}

#[tokio::test]
async fn activate__registration_fails__next_activation_retries() {
    // given
    let connector = FakeEventConnector::failing(1);
    let manager = Arc::new(EventSubscriptionManager::new(RAFFLE, connector.clone()));
    let reader = FakeRaffleReader::new(U256::from(7), players(1));
    let mut session = session_with(reader, manager.clone(), &FakeRelayBackend::default());

    // when
    let outcome = session.activate().await;

    // then
    assert_eq!(outcome, FetchOutcome::Applied);
    assert!(!session.is_subscribed());
    assert_eq!(manager.state(), SubscriptionState::Uninitialized);

    session.deactivate();
    session.activate().await;
    assert!(session.is_subscribed());
    assert_eq!(connector.connects(), 2);
}
