//! In-memory implementations of every outbound port
//!
//! Used by tests, demos and the CLI's offline mode. Each store guards its
//! state with a single lock so every mutation is applied atomically.

mod contacts;
mod duplicates;
mod identity;
mod segments;

pub use contacts::InMemoryContactStore;
pub use duplicates::InMemoryDuplicateStore;
pub use identity::InMemoryIdentityKeyStore;
pub use segments::InMemorySegmentRepository;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::DomainEvent;
use crate::ports::outbound::{EventPublisher, RepositoryError};

/// Event publisher that drops everything
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Event publisher that records events and logs them
#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<DomainEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.read().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(DomainEvent::event_type).collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventLog {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        for event in &events {
            tracing::debug!(event_type = event.event_type(), aggregate_id = event.aggregate_id(), "domain event");
        }
        self.events.write().extend(events);
        Ok(())
    }
}
