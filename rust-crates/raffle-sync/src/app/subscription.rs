use crate::{
    app::{
        event_source::{
            EventConnector,
            EventSource,
        },
        relay::{
            AchievementRelay,
            RelayBackend,
        },
        session::RefreshRequest,
        snapshot_store::SnapshotStore,
    },
    events::RaffleEvent,
};
use alloy::primitives::Address;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        OnceLock,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{
    debug,
    info,
    warn,
};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

type SharedRegistry = Arc<Mutex<Registry>>;

static CONTRACT_REGISTRIES: OnceLock<Mutex<HashMap<Address, SharedRegistry>>> =
    OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Uninitialized,
    Active,
    /// Held only inside the registry lock while listeners are removed;
    /// [`EventSubscriptionManager::state`] never reports it.
    TearingDown,
}

/// Where decoded events go: winners into the store, entries into a refresh
/// request, achievements into the relay.
pub struct EventRouter<B> {
    store: SnapshotStore,
    relay: AchievementRelay<B>,
    refresh: Option<mpsc::UnboundedSender<RefreshRequest>>,
}

impl<B: RelayBackend> EventRouter<B> {
    pub fn new(
        store: SnapshotStore,
        relay: AchievementRelay<B>,
        refresh: Option<mpsc::UnboundedSender<RefreshRequest>>,
    ) -> Self {
        Self {
            store,
            relay,
            refresh,
        }
    }

    pub fn route(&self, event: RaffleEvent) {
        match event {
            RaffleEvent::WinnerPicked(event) => {
                info!(winner = %event.winner, "winner picked");
                self.store.apply_winner(event.winner);
            }
            RaffleEvent::PlayerEntered(event) => {
                debug!(player = %event.player, "player entered");
                if let Some(refresh) = &self.refresh {
                    let _ = refresh.send(RefreshRequest::PlayerEntered(event.player));
                }
            }
            RaffleEvent::AchievementEarned(event) => {
                let _relay = self
                    .relay
                    .on_achievement_event(event.player, event.achievement_id);
            }
        }
    }
}

trait EventSink: Send {
    fn route(&self, event: RaffleEvent);
}

impl<B: RelayBackend> EventSink for EventRouter<B> {
    fn route(&self, event: RaffleEvent) {
        EventRouter::route(self, event)
    }
}

struct Registry {
    state: SubscriptionState,
    epoch: u64,
    listener: Option<JoinHandle<()>>,
    routers: Vec<(u64, Box<dyn EventSink>)>,
    next_router: u64,
}

impl Registry {
    fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Registry {
            state: SubscriptionState::Uninitialized,
            epoch: 0,
            listener: None,
            routers: Vec::new(),
            next_router: 0,
        }))
    }

    fn lock(shared: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
        shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&mut self, router: Box<dyn EventSink>) -> u64 {
        self.next_router += 1;
        self.routers.push((self.next_router, router));
        self.next_router
    }

    fn is_registered(&self, epoch: u64, router: u64) -> bool {
        self.epoch == epoch && self.routers.iter().any(|(id, _)| *id == router)
    }

    fn shut_down(&mut self) {
        self.state = SubscriptionState::TearingDown;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.routers.clear();
        self.epoch += 1;
        self.state = SubscriptionState::Uninitialized;
    }

    /// Removes one router, and the chain listener with it when no router is left.
    fn unregister(shared: &Mutex<Registry>, epoch: u64, router: u64) -> bool {
        let mut registry = Self::lock(shared);
        if !registry.is_registered(epoch, router) {
            return false;
        }
        registry.routers.retain(|(id, _)| *id != router);
        if registry.routers.is_empty() {
            registry.shut_down();
        }
        true
    }

    fn route(&self, events: Vec<RaffleEvent>) {
        for event in events {
            match &event {
                // The relay and the ledger are process-wide: one delivery per chain event.
                RaffleEvent::AchievementEarned(_) => {
                    if let Some((_, router)) = self.routers.first() {
                        router.route(event);
                    }
                }
                _ => {
                    for (_, router) in &self.routers {
                        router.route(event.clone());
                    }
                }
            }
        }
    }
}

/// Keeps at most one chain listener alive for a raffle contract and fans its
/// events out to every registered [`EventRouter`].
///
/// The first `init` connects; later calls, including ones racing an
/// in-flight registration, only add their router. A failed registration
/// returns the manager to [`SubscriptionState::Uninitialized`] so the next
/// `init` retries.
pub struct EventSubscriptionManager<C> {
    contract: Address,
    connector: C,
    registry: SharedRegistry,
}

/// Returned by `init`. Tearing it down removes only the caller's router.
#[must_use]
pub struct SubscriptionHandle {
    registration: Option<(SharedRegistry, u64, u64)>,
}

impl SubscriptionHandle {
    fn noop() -> Self {
        Self { registration: None }
    }

    pub fn is_noop(&self) -> bool {
        self.registration.is_none()
    }

    /// Whether the router is still receiving events.
    pub fn is_registered(&self) -> bool {
        match &self.registration {
            Some((registry, epoch, router)) => {
                Registry::lock(registry).is_registered(*epoch, *router)
            }
            None => false,
        }
    }

    /// Returns `true` if this call removed the router.
    pub fn teardown(self) -> bool {
        match self.registration {
            Some((registry, epoch, router)) => Registry::unregister(&registry, epoch, router),
            None => false,
        }
    }
}

impl<C: EventConnector> EventSubscriptionManager<C> {
    /// A manager with its own listener registry.
    pub fn new(contract: Address, connector: C) -> Self {
        Self {
            contract,
            connector,
            registry: Registry::shared(),
        }
    }

    /// A manager sharing the process-wide registry of `contract`: every
    /// manager built this way for the same address shares one listener.
    pub fn for_contract(contract: Address, connector: C) -> Self {
        let registries = CONTRACT_REGISTRIES.get_or_init(|| Mutex::new(HashMap::new()));
        let registry = registries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(contract)
            .or_insert_with(Registry::shared)
            .clone();
        Self {
            contract,
            connector,
            registry,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn state(&self) -> SubscriptionState {
        Registry::lock(&self.registry).state
    }

    pub fn router_count(&self) -> usize {
        Registry::lock(&self.registry).routers.len()
    }

    pub fn has_listener(&self) -> bool {
        Registry::lock(&self.registry)
            .listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    pub async fn init<B: RelayBackend>(
        &self,
        router: EventRouter<B>,
    ) -> crate::Result<SubscriptionHandle> {
        let (epoch, router) = {
            let mut registry = Registry::lock(&self.registry);
            if registry.state == SubscriptionState::Active {
                let id = registry.register(Box::new(router));
                debug!(contract = %self.contract, router = id, "sharing registered listener");
                return Ok(SubscriptionHandle {
                    registration: Some((self.registry.clone(), registry.epoch, id)),
                });
            }
            registry.state = SubscriptionState::Active;
            registry.epoch += 1;
            (registry.epoch, registry.register(Box::new(router)))
        };

        let source = match self.connector.connect().await {
            Ok(source) => source,
            Err(err) => {
                let mut registry = Registry::lock(&self.registry);
                if registry.epoch == epoch {
                    registry.shut_down();
                }
                warn!(contract = %self.contract, ?err, "event listener registration failed");
                return Err(err.context("registering raffle event listeners"));
            }
        };

        let mut registry = Registry::lock(&self.registry);
        if registry.epoch != epoch || registry.state != SubscriptionState::Active {
            debug!(contract = %self.contract, "torn down while registering");
            return Ok(SubscriptionHandle::noop());
        }
        let listener = tokio::spawn(dispatch(source, self.registry.clone(), epoch));
        registry.listener = Some(listener);
        info!(contract = %self.contract, epoch, "raffle event listeners registered");
        Ok(SubscriptionHandle {
            registration: Some((self.registry.clone(), epoch, router)),
        })
    }

    /// Removes the listener and every router. Runs to completion before returning.
    pub fn teardown(&self) -> bool {
        let mut registry = Registry::lock(&self.registry);
        if registry.state == SubscriptionState::Uninitialized {
            return false;
        }
        registry.shut_down();
        true
    }
}

async fn dispatch<S: EventSource>(mut source: S, registry: SharedRegistry, epoch: u64) {
    loop {
        match source.next_events().await {
            Ok(Some(events)) => {
                if !route_batch(&registry, epoch, events) {
                    return;
                }
            }
            Ok(None) => {
                warn!("raffle event stream closed");
                break;
            }
            Err(err) => {
                warn!(?err, "raffle event poll failed");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
            }
        }
    }
    let mut registry = Registry::lock(&registry);
    if registry.epoch == epoch && registry.state == SubscriptionState::Active {
        registry.listener = None;
        registry.shut_down();
    }
}

/// Routes under the registry lock so nothing lands after a teardown returns.
fn route_batch(registry: &Mutex<Registry>, epoch: u64, events: Vec<RaffleEvent>) -> bool {
    let registry = Registry::lock(registry);
    if registry.epoch != epoch {
        return false;
    }
    registry.route(events);
    true
}
