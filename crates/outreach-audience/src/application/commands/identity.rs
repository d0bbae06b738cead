use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::publish_events;
use crate::application::dto::IdentityKeyView;
use crate::domain::aggregates::{
    FinalizeOutcome, IdentityKeyConfig, KeyChangePreview, KeySlot, RevertRequest, SlotState,
};
use crate::domain::events::{DomainEvent, IdentityKeyEvent};
use crate::domain::filter::FilterGroup;
use crate::domain::value_objects::CompanyId;
use crate::error::{AudienceError, Result};
use crate::ports::inbound::IdentityKeyUseCases;
use crate::ports::outbound::{DuplicateStore, EventPublisher, IdentityKeyStore};

/// Identity key lifecycle service for one company.
///
/// Every transition is first applied to a freshly loaded copy so rejections
/// (`KeyLocked`, `DuplicateRevertRequest`, ...) never reach the store. The
/// store then applies the same transition atomically and its answer wins.
pub struct IdentityKeyService {
    company: CompanyId,
    store: Arc<dyn IdentityKeyStore>,
    duplicates: Arc<dyn DuplicateStore>,
    event_publisher: Arc<dyn EventPublisher>,
    block_finalize_on_duplicates: bool,
}

impl IdentityKeyService {
    pub fn new(
        company: CompanyId,
        store: Arc<dyn IdentityKeyStore>,
        duplicates: Arc<dyn DuplicateStore>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            company,
            store,
            duplicates,
            event_publisher,
            block_finalize_on_duplicates: true,
        }
    }

    pub fn with_finalize_guard(mut self, block_on_duplicates: bool) -> Self {
        self.block_finalize_on_duplicates = block_on_duplicates;
        self
    }

    pub fn company(&self) -> &CompanyId {
        &self.company
    }

    async fn load(&self) -> Result<IdentityKeyConfig> {
        Ok(self.store.load(&self.company).await?)
    }

    async fn select(&self, slot: KeySlot, field_key: &str) -> Result<SlotState> {
        let mut local = self.load().await?;
        match slot {
            KeySlot::PrimaryKey => local.set_primary_key(field_key)?,
            KeySlot::EmailKey => local.set_email_key(field_key)?,
            KeySlot::Filters => return Err(AudienceError::Validation("filters are set with set_filters".into())),
        };

        let stored = self.store.select_key(&self.company, slot, field_key.trim()).await?;
        info!(company_id = %self.company, slot = %slot, field_key = %field_key.trim(), "identity key selected");

        publish_events(self.event_publisher.as_ref(), local.take_events()).await;
        Ok(stored.slot_state(slot))
    }

    async fn ensure_no_duplicates(&self) -> Result<()> {
        if !self.block_finalize_on_duplicates {
            return Ok(());
        }
        let page = self.duplicates.fetch_page(1, 1).await?;
        if page.total_remaining > 0 {
            return Err(AudienceError::UnresolvedDuplicates {
                remaining: page.total_remaining,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityKeyUseCases for IdentityKeyService {
    async fn get_config(&self) -> Result<IdentityKeyView> {
        let config = self.load().await?;
        Ok(IdentityKeyView::from(&config))
    }

    async fn set_primary_key(&self, field_key: &str) -> Result<SlotState> {
        self.select(KeySlot::PrimaryKey, field_key).await
    }

    async fn set_email_key(&self, field_key: &str) -> Result<SlotState> {
        self.select(KeySlot::EmailKey, field_key).await
    }

    async fn set_filters(&self, groups: Vec<FilterGroup>) -> Result<SlotState> {
        let mut local = self.load().await?;
        local.set_filters(groups.clone())?;

        let stored = self.store.set_filters(&self.company, &groups).await?;
        info!(company_id = %self.company, groups = stored.filters().groups.len(), "identity filters replaced");

        publish_events(self.event_publisher.as_ref(), local.take_events()).await;
        Ok(stored.slot_state(KeySlot::Filters))
    }

    async fn preview_key_change(&self, slot: KeySlot, field_key: &str) -> Result<KeyChangePreview> {
        if slot == KeySlot::Filters {
            return Err(AudienceError::Validation("filters are not previewed by field key".into()));
        }
        let field_key = field_key.trim();
        if field_key.is_empty() {
            return Err(AudienceError::Validation("field key must not be blank".into()));
        }
        Ok(self.store.preview_key(&self.company, slot, field_key).await?)
    }

    async fn finalize(&self) -> Result<FinalizeOutcome> {
        let mut local = self.load().await?;
        if local.is_finalized() {
            debug!(company_id = %self.company, "identity keys already finalized");
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        local.finalize()?;
        self.ensure_no_duplicates().await?;

        // The local copy may be stale; only the store knows whether this call locked anything
        let receipt = self.store.finalize(&self.company).await?;
        if !receipt.config.is_finalized() {
            return Err(AudienceError::Store("finalize was not applied".into()));
        }

        let locked = match &receipt.outcome {
            FinalizeOutcome::AlreadyFinalized => {
                debug!(company_id = %self.company, "identity keys finalized by another session");
                return Ok(FinalizeOutcome::AlreadyFinalized);
            }
            FinalizeOutcome::Finalized { locked } => locked.clone(),
        };
        info!(company_id = %self.company, locked = ?locked, "identity keys finalized");

        let event = DomainEvent::IdentityKey(IdentityKeyEvent::Finalized {
            company_id: self.company.clone(),
            locked,
            finalized_at: Utc::now(),
        });
        publish_events(self.event_publisher.as_ref(), vec![event]).await;
        Ok(receipt.outcome)
    }

    async fn request_revert(&self, slot: KeySlot) -> Result<RevertRequest> {
        let mut local = self.load().await?;
        let request = local.request_revert(slot)?;

        let stored = self.store.request_revert(&self.company, slot).await?;
        info!(company_id = %self.company, slot = %slot, "revert requested");

        publish_events(self.event_publisher.as_ref(), local.take_events()).await;
        Ok(stored.pending_revert(slot).cloned().unwrap_or(request))
    }

    async fn cancel_revert(&self, slot: KeySlot) -> Result<SlotState> {
        let mut local = self.load().await?;
        local.cancel_revert(slot)?;

        let stored = self.store.cancel_revert(&self.company, slot).await?;
        info!(company_id = %self.company, slot = %slot, "revert request cancelled");

        publish_events(self.event_publisher.as_ref(), local.take_events()).await;
        Ok(stored.slot_state(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::DuplicatePair;
    use crate::domain::value_objects::ContactRecord;
    use crate::ports::outbound::{FinalizeReceipt, RepositoryError};
    use crate::infrastructure::persistence::{
        InMemoryContactStore, InMemoryDuplicateStore, InMemoryEventLog, InMemoryIdentityKeyStore,
    };

    struct Fixture {
        service: IdentityKeyService,
        store: Arc<InMemoryIdentityKeyStore>,
        duplicates: Arc<InMemoryDuplicateStore>,
        events: Arc<InMemoryEventLog>,
    }

    fn fixture() -> Fixture {
        let contacts = Arc::new(InMemoryContactStore::new(vec![
            ContactRecord::new("1").with("customer_id", "A").with("email", "a@x.io"),
            ContactRecord::new("2").with("customer_id", "A").with("email", "b@x.io"),
            ContactRecord::new("3").with("email", "c@x.io"),
        ]));
        let store = Arc::new(InMemoryIdentityKeyStore::new(contacts));
        let duplicates = Arc::new(InMemoryDuplicateStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let service = IdentityKeyService::new(
            CompanyId::new("acme"),
            store.clone(),
            duplicates.clone(),
            events.clone(),
        );
        Fixture { service, store, duplicates, events }
    }

    /// Serves a fixed snapshot on load, delegates every transition
    struct StaleLoad {
        inner: Arc<InMemoryIdentityKeyStore>,
        snapshot: IdentityKeyConfig,
    }

    #[async_trait]
    impl IdentityKeyStore for StaleLoad {
        async fn load(&self, _company: &CompanyId) -> std::result::Result<IdentityKeyConfig, RepositoryError> {
            Ok(self.snapshot.clone())
        }

        async fn select_key(
            &self,
            company: &CompanyId,
            slot: KeySlot,
            field_key: &str,
        ) -> std::result::Result<IdentityKeyConfig, RepositoryError> {
            self.inner.select_key(company, slot, field_key).await
        }

        async fn set_filters(
            &self,
            company: &CompanyId,
            groups: &[FilterGroup],
        ) -> std::result::Result<IdentityKeyConfig, RepositoryError> {
            self.inner.set_filters(company, groups).await
        }

        async fn finalize(&self, company: &CompanyId) -> std::result::Result<FinalizeReceipt, RepositoryError> {
            self.inner.finalize(company).await
        }

        async fn request_revert(
            &self,
            company: &CompanyId,
            slot: KeySlot,
        ) -> std::result::Result<IdentityKeyConfig, RepositoryError> {
            self.inner.request_revert(company, slot).await
        }

        async fn cancel_revert(
            &self,
            company: &CompanyId,
            slot: KeySlot,
        ) -> std::result::Result<IdentityKeyConfig, RepositoryError> {
            self.inner.cancel_revert(company, slot).await
        }

        async fn preview_key(
            &self,
            company: &CompanyId,
            slot: KeySlot,
            field_key: &str,
        ) -> std::result::Result<KeyChangePreview, RepositoryError> {
            self.inner.preview_key(company, slot, field_key).await
        }
    }

    async fn configure(service: &IdentityKeyService) {
        service.set_primary_key("customer_id").await.unwrap();
        service.set_email_key("email").await.unwrap();
    }

    #[tokio::test]
    async fn test_finalize_twice_is_noop() {
        let f = fixture();
        configure(&f.service).await;

        let first = f.service.finalize().await.unwrap();
        assert!(matches!(first, FinalizeOutcome::Finalized { .. }));
        let snapshot = f.store.load(f.service.company()).await.unwrap();

        assert_eq!(f.service.finalize().await.unwrap(), FinalizeOutcome::AlreadyFinalized);
        assert_eq!(f.store.load(f.service.company()).await.unwrap(), snapshot);
        assert_eq!(
            f.events.event_types().iter().filter(|t| **t == "identity_key.finalized").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_concurrent_finalize_reports_already_finalized() {
        let f = fixture();
        configure(&f.service).await;

        // Second session loaded the configuration before the first one finalized
        let late = IdentityKeyService::new(
            CompanyId::new("acme"),
            Arc::new(StaleLoad {
                inner: f.store.clone(),
                snapshot: f.store.load(f.service.company()).await.unwrap(),
            }),
            f.duplicates.clone(),
            f.events.clone(),
        );

        assert!(matches!(f.service.finalize().await.unwrap(), FinalizeOutcome::Finalized { .. }));
        assert_eq!(late.finalize().await.unwrap(), FinalizeOutcome::AlreadyFinalized);
        assert_eq!(
            f.events.event_types().iter().filter(|t| **t == "identity_key.finalized").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_locked_key_rejected_until_revert_approved() {
        let f = fixture();
        configure(&f.service).await;
        f.service.finalize().await.unwrap();

        assert_eq!(
            f.service.set_primary_key("email").await,
            Err(AudienceError::KeyLocked { slot: KeySlot::PrimaryKey })
        );

        f.service.request_revert(KeySlot::PrimaryKey).await.unwrap();
        f.store.approve_revert(f.service.company(), KeySlot::PrimaryKey).unwrap();

        assert_eq!(f.service.set_primary_key("email").await, Ok(SlotState::Configured));
    }

    #[tokio::test]
    async fn test_second_pending_revert_rejected() {
        let f = fixture();
        configure(&f.service).await;
        f.service.finalize().await.unwrap();

        f.service.request_revert(KeySlot::EmailKey).await.unwrap();
        let err = f.service.request_revert(KeySlot::EmailKey).await.unwrap_err();
        assert_eq!(err, AudienceError::DuplicateRevertRequest { slot: KeySlot::EmailKey });
        assert!(err.requires_resync());

        assert_eq!(f.service.cancel_revert(KeySlot::EmailKey).await, Ok(SlotState::Locked));
        let view = f.service.get_config().await.unwrap();
        assert!(view.slots.iter().all(|s| s.state == SlotState::Locked));
    }

    #[tokio::test]
    async fn test_finalize_blocked_by_unresolved_duplicates() {
        let f = fixture();
        configure(&f.service).await;
        f.duplicates.seed(vec![DuplicatePair::new(
            "p1",
            ContactRecord::new("1"),
            ContactRecord::new("2"),
        )]);

        assert_eq!(
            f.service.finalize().await,
            Err(AudienceError::UnresolvedDuplicates { remaining: 1 })
        );
        let view = f.service.get_config().await.unwrap();
        assert!(!view.finalized);

        let unguarded = IdentityKeyService::new(
            CompanyId::new("acme"),
            f.store.clone(),
            f.duplicates.clone(),
            f.events.clone(),
        )
        .with_finalize_guard(false);
        assert!(unguarded.finalize().await.is_ok());
    }

    #[tokio::test]
    async fn test_finalize_requires_keys() {
        let f = fixture();
        f.service.set_primary_key("customer_id").await.unwrap();
        assert_eq!(
            f.service.finalize().await,
            Err(AudienceError::SlotNotConfigured { slot: KeySlot::EmailKey })
        );
    }

    #[tokio::test]
    async fn test_preview_key_change() {
        let f = fixture();
        let preview = f
            .service
            .preview_key_change(KeySlot::PrimaryKey, "customer_id")
            .await
            .unwrap();
        assert_eq!(preview.affected_contacts, 2);
        assert_eq!(preview.duplicate_values, 1);

        assert!(f.service.preview_key_change(KeySlot::Filters, "x").await.is_err());
    }
}
