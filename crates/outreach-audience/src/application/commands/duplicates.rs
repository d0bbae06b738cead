use std::sync::Arc;

use tracing::{info, warn};

use super::publish_events;
use crate::application::dto::{BulkResolutionSummary, ResolutionSummary};
use crate::domain::aggregates::{
    BulkChoice, BulkResolutionPlan, DuplicatePair, ResolutionChoice, ResolutionQueue,
};
use crate::domain::events::{DomainEvent, DuplicateEvent};
use crate::domain::services::CanonicalRecordService;
use crate::error::{AudienceError, Result};
use crate::ports::outbound::{DuplicateStore, EventPublisher, RepositoryError};

/// One operator's walk through the duplicate queue.
///
/// Holds the client-side [`ResolutionQueue`]; the server stays authoritative
/// for what remains.
pub struct DuplicateQueueSession {
    store: Arc<dyn DuplicateStore>,
    event_publisher: Arc<dyn EventPublisher>,
    queue: ResolutionQueue,
}

impl DuplicateQueueSession {
    pub fn new(store: Arc<dyn DuplicateStore>, event_publisher: Arc<dyn EventPublisher>, page_size: u32) -> Self {
        Self {
            store,
            event_publisher,
            queue: ResolutionQueue::new(page_size),
        }
    }

    pub fn queue(&self) -> &ResolutionQueue {
        &self.queue
    }

    /// Rebuild after a committed write. The write stands even if the rebuild
    /// fails; the queue then stays out of sync until [`Self::refresh`] succeeds.
    async fn rebuild_after_commit(&mut self) -> Option<u64> {
        self.queue.mark_out_of_sync();
        match self.refresh().await {
            Ok(queue) => Some(queue.total_remaining()),
            Err(e) => {
                warn!(error = %e, "queue rebuild failed after commit, refresh required");
                None
            }
        }
    }

    /// Rebuild the queue from page 1
    pub async fn refresh(&mut self) -> Result<&ResolutionQueue> {
        let first = self.store.fetch_page(1, self.queue.page_size()).await?;
        self.queue.reset(first);
        Ok(&self.queue)
    }

    /// Fetch one page and append it; returns the pairs of that page
    pub async fn load_page(&mut self, page: u32) -> Result<Vec<DuplicatePair>> {
        let page = page.max(1);
        let fetched = self.store.fetch_page(page, self.queue.page_size()).await?;
        let pairs = fetched.pairs.clone();
        let appended = self.queue.apply_page(page, fetched);
        info!(page, appended, total_remaining = self.queue.total_remaining(), "duplicate page loaded");
        Ok(pairs)
    }

    pub async fn load_more(&mut self) -> Result<Vec<DuplicatePair>> {
        let next = self.queue.next_page();
        self.load_page(next).await
    }

    pub fn inspect(&mut self, index: usize) -> Result<&DuplicatePair> {
        Ok(self.queue.inspect(index)?)
    }

    pub fn current(&self) -> Option<&DuplicatePair> {
        self.queue.current()
    }

    /// Commit one pair, then rebuild the queue from page 1
    pub async fn resolve_one(&mut self, index: usize, choice: ResolutionChoice) -> Result<ResolutionSummary> {
        self.queue.ensure_in_sync()?;
        let pair = self.queue.pair(index)?.clone();
        let decision = CanonicalRecordService::decide(&pair, choice);

        match self.store.resolve(&pair.id, choice).await {
            Ok(()) => {}
            Err(RepositoryError::StalePair(pair_id)) => {
                warn!(pair_id = %pair_id, "duplicate pair already resolved elsewhere");
                self.queue.mark_out_of_sync();
                return Err(AudienceError::StalePair { pair_id });
            }
            Err(e) => return Err(e.into()),
        }
        info!(pair_id = %pair.id, kept = %decision.kept.id, "duplicate pair resolved");

        let event = DomainEvent::Duplicate(DuplicateEvent::PairResolved {
            pair_id: pair.id.clone(),
            choice,
            kept: decision.kept.id.clone(),
            discarded: decision.discarded.id.clone(),
        });
        publish_events(self.event_publisher.as_ref(), vec![event]).await;

        Ok(ResolutionSummary {
            pair_id: decision.pair_id,
            kept: decision.kept,
            discarded: decision.discarded,
            total_remaining: self.rebuild_after_commit().await,
        })
    }

    /// First step of a bulk resolution: the scope the operator must confirm
    pub fn plan_resolve_all(&self, choice: BulkChoice) -> BulkResolutionPlan {
        self.queue.plan_resolve_all(choice)
    }

    /// Resolve every remaining pair system-wide. Irreversible.
    pub async fn execute_resolve_all(&mut self, plan: BulkResolutionPlan) -> Result<BulkResolutionSummary> {
        let resolved = self.store.resolve_all(plan.choice).await?;
        warn!(resolved, choice = ?plan.choice, planned = plan.total_remaining, "all duplicate pairs resolved");

        let event = DomainEvent::Duplicate(DuplicateEvent::AllResolved {
            choice: plan.choice,
            resolved,
        });
        publish_events(self.event_publisher.as_ref(), vec![event]).await;

        Ok(BulkResolutionSummary {
            resolved,
            total_remaining: self.rebuild_after_commit().await,
        })
    }
}
