//! Command handlers
//!
//! Application services that orchestrate use cases.

mod audience;
mod duplicates;
mod identity;
mod segments;

pub use audience::AudienceService;
pub use duplicates::DuplicateQueueSession;
pub use identity::IdentityKeyService;
pub use segments::SegmentService;

use crate::domain::DomainEvent;
use crate::ports::outbound::EventPublisher;

/// Publish after a committed change. The store already holds the new state,
/// so a publisher failure is logged rather than reported as a failed call.
pub(crate) async fn publish_events(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    if events.is_empty() {
        return;
    }
    let count = events.len();
    if let Err(e) = publisher.publish(events).await {
        tracing::warn!(error = %e, count, "failed to publish domain events");
    }
}
