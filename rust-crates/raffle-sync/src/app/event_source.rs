use crate::{
    Result,
    events::RaffleEvent,
};

pub trait EventSource: Send {
    /// Next batch of decoded events, or `None` once the source has closed.
    fn next_events(&mut self) -> impl Future<Output = Result<Option<Vec<RaffleEvent>>>> + Send;
}

/// Registers listeners with the chain. A failed `connect` leaves nothing registered.
pub trait EventConnector: Send + Sync {
    type Source: EventSource + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Source>> + Send;
}
