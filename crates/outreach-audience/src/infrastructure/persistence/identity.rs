use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::InMemoryContactStore;
use crate::domain::aggregates::{IdentityKeyConfig, IdentityKeyError, KeyChangePreview, KeySlot};
use crate::domain::filter::FilterGroup;
use crate::domain::services::IdentityFields;
use crate::domain::value_objects::CompanyId;
use crate::ports::outbound::{FinalizeReceipt, IdentityKeyStore, RepositoryError};

/// Identity key store applying every transition under one write lock.
///
/// Selected keys are pushed into the contact store so evaluation dedups by
/// the configured primary key.
pub struct InMemoryIdentityKeyStore {
    configs: RwLock<HashMap<CompanyId, IdentityKeyConfig>>,
    contacts: Arc<InMemoryContactStore>,
}

impl InMemoryIdentityKeyStore {
    pub fn new(contacts: Arc<InMemoryContactStore>) -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            contacts,
        }
    }

    fn apply<F, T>(&self, company: &CompanyId, transition: F) -> Result<IdentityKeyConfig, RepositoryError>
    where
        F: FnOnce(&mut IdentityKeyConfig) -> Result<T, IdentityKeyError>,
    {
        self.apply_with(company, transition).map(|(config, _)| config)
    }

    /// Clone, transition, swap: a rejected transition leaves the stored
    /// configuration untouched
    fn apply_with<F, T>(&self, company: &CompanyId, transition: F) -> Result<(IdentityKeyConfig, T), RepositoryError>
    where
        F: FnOnce(&mut IdentityKeyConfig) -> Result<T, IdentityKeyError>,
    {
        let mut configs = self.configs.write();
        let current = configs
            .entry(company.clone())
            .or_insert_with(|| IdentityKeyConfig::new(company.clone()));

        let mut next = current.clone();
        let answer = transition(&mut next)?;
        next.take_events();
        *current = next.clone();

        self.contacts.set_identity(IdentityFields {
            primary_key: next.primary_key().field_key.clone(),
            email_key: next
                .email_key()
                .field_key
                .clone()
                .unwrap_or_else(|| IdentityFields::default().email_key),
        });
        Ok((next, answer))
    }

    /// Administrative approval of a pending revert
    pub fn approve_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig, RepositoryError> {
        let config = self.apply(company, |c| c.approve_revert(slot))?;
        tracing::info!(company_id = %company, slot = %slot, "revert approved");
        Ok(config)
    }
}

#[async_trait]
impl IdentityKeyStore for InMemoryIdentityKeyStore {
    async fn load(&self, company: &CompanyId) -> Result<IdentityKeyConfig, RepositoryError> {
        Ok(self
            .configs
            .read()
            .get(company)
            .cloned()
            .unwrap_or_else(|| IdentityKeyConfig::new(company.clone())))
    }

    async fn select_key(
        &self,
        company: &CompanyId,
        slot: KeySlot,
        field_key: &str,
    ) -> Result<IdentityKeyConfig, RepositoryError> {
        self.apply(company, |c| match slot {
            KeySlot::PrimaryKey => c.set_primary_key(field_key),
            KeySlot::EmailKey => c.set_email_key(field_key),
            KeySlot::Filters => Err(IdentityKeyError::NotAKeySlot),
        })
    }

    async fn set_filters(
        &self,
        company: &CompanyId,
        groups: &[FilterGroup],
    ) -> Result<IdentityKeyConfig, RepositoryError> {
        self.apply(company, |c| c.set_filters(groups.to_vec()))
    }

    async fn finalize(&self, company: &CompanyId) -> Result<FinalizeReceipt, RepositoryError> {
        let (config, outcome) = self.apply_with(company, |c| c.finalize())?;
        Ok(FinalizeReceipt { config, outcome })
    }

    async fn request_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig, RepositoryError> {
        self.apply(company, |c| c.request_revert(slot))
    }

    async fn cancel_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig, RepositoryError> {
        self.apply(company, |c| c.cancel_revert(slot))
    }

    async fn preview_key(
        &self,
        _company: &CompanyId,
        slot: KeySlot,
        field_key: &str,
    ) -> Result<KeyChangePreview, RepositoryError> {
        Ok(self.contacts.preview_key(slot, field_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{FinalizeOutcome, SlotState};

    fn store() -> InMemoryIdentityKeyStore {
        InMemoryIdentityKeyStore::new(Arc::new(InMemoryContactStore::new(vec![])))
    }

    #[tokio::test]
    async fn test_second_finalize_observes_lock() {
        let store = store();
        let acme = CompanyId::new("acme");
        store.select_key(&acme, KeySlot::PrimaryKey, "customer_id").await.unwrap();
        store.select_key(&acme, KeySlot::EmailKey, "email").await.unwrap();

        let first = store.finalize(&acme).await.unwrap();
        let second = store.finalize(&acme).await.unwrap();
        assert_eq!(
            first.outcome,
            FinalizeOutcome::Finalized { locked: KeySlot::ALL.to_vec() }
        );
        assert_eq!(second.outcome, FinalizeOutcome::AlreadyFinalized);
        assert_eq!(first.config, second.config);
        assert!(second.config.is_finalized());
    }

    #[tokio::test]
    async fn test_rejected_transition_leaves_state() {
        let store = store();
        let acme = CompanyId::new("acme");
        let err = store.request_revert(&acme, KeySlot::PrimaryKey).await.unwrap_err();
        assert_eq!(err, RepositoryError::Lifecycle(IdentityKeyError::SlotNotLocked { slot: KeySlot::PrimaryKey }));
        assert_eq!(store.load(&acme).await.unwrap().slot_state(KeySlot::PrimaryKey), SlotState::Unset);
    }

    #[tokio::test]
    async fn test_selected_keys_drive_evaluation_identity() {
        let contacts = Arc::new(InMemoryContactStore::new(vec![]));
        let store = InMemoryIdentityKeyStore::new(contacts.clone());
        let acme = CompanyId::new("acme");
        store.select_key(&acme, KeySlot::PrimaryKey, "customer_id").await.unwrap();
        store.select_key(&acme, KeySlot::EmailKey, "work_email").await.unwrap();

        let identity = contacts.identity();
        assert_eq!(identity.primary_key.as_deref(), Some("customer_id"));
        assert_eq!(identity.email_key, "work_email");
    }
}
