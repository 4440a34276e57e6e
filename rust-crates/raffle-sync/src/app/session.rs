use crate::app::{
    contract_reader::{
        ContractStateReader,
        RaffleReader,
    },
    event_source::EventConnector,
    relay::{
        AchievementRelay,
        RelayBackend,
    },
    snapshot_store::{
        FetchOutcome,
        SnapshotStore,
    },
    subscription::{
        EventRouter,
        EventSubscriptionManager,
        SubscriptionHandle,
    },
};
use alloy::primitives::{
    Address,
    B256,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshRequest {
    PlayerEntered(Address),
    Entered(B256),
    Manual,
    Shutdown,
}

struct RefreshWorker {
    requests: mpsc::UnboundedSender<RefreshRequest>,
    task: JoinHandle<()>,
}

/// One mounted raffle screen: an initial fetch, event listeners and a
/// periodic refresh, all torn down by [`RaffleSession::deactivate`].
pub struct RaffleSession<R, C, B> {
    reader: Arc<ContractStateReader<R>>,
    store: SnapshotStore,
    subscriptions: Arc<EventSubscriptionManager<C>>,
    relay: AchievementRelay<B>,
    refresh_interval: Duration,
    worker: Option<RefreshWorker>,
    subscription: Option<SubscriptionHandle>,
}

impl<R, C, B> RaffleSession<R, C, B>
where
    R: RaffleReader + 'static,
    C: EventConnector,
    B: RelayBackend,
{
    pub fn new(
        reader: Arc<ContractStateReader<R>>,
        subscriptions: Arc<EventSubscriptionManager<C>>,
        relay: AchievementRelay<B>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            reader,
            store: SnapshotStore::new(),
            subscriptions,
            relay,
            refresh_interval,
            worker: None,
            subscription: None,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Whether contract events currently reach this session's store.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(SubscriptionHandle::is_registered)
    }

    pub async fn activate(&mut self) -> FetchOutcome {
        if self.is_active() {
            return refresh_once(&self.reader, &self.store).await;
        }
        if self.store.is_retired() {
            self.store = SnapshotStore::new();
        }

        let outcome = refresh_once(&self.reader, &self.store).await;

        let (requests, request_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(refresh_worker(
            self.reader.clone(),
            self.store.clone(),
            self.refresh_interval,
            request_rx,
        ));
        let router = EventRouter::new(
            self.store.clone(),
            self.relay.clone(),
            Some(requests.clone()),
        );
        self.worker = Some(RefreshWorker { requests, task });

        match self.subscriptions.init(router).await {
            Ok(handle) => self.subscription = Some(handle),
            // Polling still runs; the next activation retries the registration.
            Err(err) => warn!(?err, "raffle events unavailable"),
        }
        info!(contract = %self.subscriptions.contract(), "raffle session active");
        outcome
    }

    pub async fn refresh(&self) -> FetchOutcome {
        refresh_once(&self.reader, &self.store).await
    }

    /// Sender for refresh requests while the session is active.
    pub fn refresh_requests(&self) -> Option<mpsc::UnboundedSender<RefreshRequest>> {
        self.worker.as_ref().map(|worker| worker.requests.clone())
    }

    pub fn request_refresh(&self, request: RefreshRequest) -> bool {
        match &self.worker {
            Some(worker) => worker.requests.send(request).is_ok(),
            None => false,
        }
    }

    /// Synchronous: once this returns no listener or in-flight fetch mutates the store.
    pub fn deactivate(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.teardown();
        }
        self.store.retire();
        if let Some(worker) = self.worker.take() {
            let _ = worker.requests.send(RefreshRequest::Shutdown);
            worker.task.abort();
        }
        debug!("raffle session deactivated");
    }
}

impl<R, C, B> Drop for RaffleSession<R, C, B> {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.teardown();
        }
        self.store.retire();
        if let Some(worker) = self.worker.take() {
            worker.task.abort();
        }
    }
}

async fn refresh_once<R: RaffleReader>(
    reader: &ContractStateReader<R>,
    store: &SnapshotStore,
) -> FetchOutcome {
    let ticket = store.begin_fetch();
    let result = reader.fetch_snapshot().await;
    let outcome = store.complete_fetch(ticket, result);
    match &outcome {
        FetchOutcome::Applied => debug!("raffle snapshot applied"),
        FetchOutcome::Superseded => debug!("discarding stale raffle snapshot"),
        FetchOutcome::Retained(err) => warn!(%err, "raffle snapshot fetch failed"),
        FetchOutcome::Retired => debug!("raffle snapshot arrived after teardown"),
    }
    outcome
}

async fn refresh_worker<R: RaffleReader>(
    reader: Arc<ContractStateReader<R>>,
    store: SnapshotStore,
    interval: Duration,
    mut requests: mpsc::UnboundedReceiver<RefreshRequest>,
) {
    let mut ticker = time::interval(interval);
    // The first tick fires immediately and activation has just fetched.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                refresh_once(&reader, &store).await;
            }
            request = requests.recv() => {
                let Some(request) = request else {
                    break;
                };
                match request {
                    RefreshRequest::Shutdown => break,
                    other => {
                        debug!(?other, "refresh requested");
                        refresh_once(&reader, &store).await;
                    }
                }
            }
        }
        if store.is_retired() {
            break;
        }
    }
}
