use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::aggregates::{KeyChangePreview, KeySlot};
use crate::domain::audience::{AudiencePredicate, PredicateCount};
use crate::domain::filter::KnownField;
use crate::domain::services::{AudienceCounter, IdentityFields, KeyImpactService};
use crate::domain::value_objects::{ContactRecord, ScalarValue};
use crate::ports::outbound::{FieldValueSource, PredicateEvaluator, RepositoryError};

/// Contact table held in memory.
///
/// Evaluates predicates in-process and serves field metadata and value
/// suggestions from the records it holds.
pub struct InMemoryContactStore {
    contacts: RwLock<Vec<ContactRecord>>,
    known_fields: RwLock<Option<Vec<KnownField>>>,
    identity: RwLock<IdentityFields>,
    // Evaluations left before the evaluator reports itself unavailable
    evaluation_budget: RwLock<Option<u64>>,
}

impl InMemoryContactStore {
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        Self {
            contacts: RwLock::new(contacts),
            known_fields: RwLock::new(None),
            identity: RwLock::new(IdentityFields::default()),
            evaluation_budget: RwLock::new(None),
        }
    }

    pub fn with_identity(self, identity: IdentityFields) -> Self {
        *self.identity.write() = identity;
        self
    }

    pub fn set_identity(&self, identity: IdentityFields) {
        *self.identity.write() = identity;
    }

    pub fn identity(&self) -> IdentityFields {
        self.identity.read().clone()
    }

    /// Replace the field catalogue; by default it is derived from the records
    pub fn set_known_fields(&self, fields: Vec<KnownField>) {
        *self.known_fields.write() = Some(fields);
    }

    pub fn insert(&self, contact: ContactRecord) {
        self.contacts.write().push(contact);
    }

    pub fn contacts(&self) -> Vec<ContactRecord> {
        self.contacts.read().clone()
    }

    /// Let `n` more evaluations succeed, then fail every later one
    pub fn fail_after(&self, n: u64) {
        *self.evaluation_budget.write() = Some(n);
    }

    fn spend_evaluation(&self) -> Result<(), RepositoryError> {
        let mut budget = self.evaluation_budget.write();
        match budget.as_mut() {
            Some(0) => Err(RepositoryError::Unavailable("predicate evaluator offline".into())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn derived_fields(&self) -> Vec<KnownField> {
        let keys: BTreeSet<String> = self
            .contacts
            .read()
            .iter()
            .flat_map(|c| c.fields.keys().cloned())
            .collect();
        keys.into_iter()
            .map(|key| KnownField::new(format!("f-{}", key), key))
            .collect()
    }

    pub fn preview_key(&self, slot: KeySlot, field_key: &str) -> KeyChangePreview {
        let contacts = self.contacts.read();
        KeyImpactService::preview(slot, field_key, contacts.iter())
    }
}

#[async_trait]
impl PredicateEvaluator for InMemoryContactStore {
    async fn evaluate(&self, predicate: &AudiencePredicate) -> Result<PredicateCount, RepositoryError> {
        self.spend_evaluation()?;

        let criterion = predicate.criterion();
        let identity = self.identity();
        let contacts = self.contacts.read();
        let tally = AudienceCounter::count(&criterion, contacts.iter(), &identity);

        Ok(PredicateCount {
            count: tally.count,
            invalid_email_count: tally.invalid_email_count,
            un_subscribed_count: tally.un_subscribed_count,
        })
    }
}

#[async_trait]
impl FieldValueSource for InMemoryContactStore {
    async fn known_fields(&self) -> Result<Vec<KnownField>, RepositoryError> {
        if let Some(fields) = self.known_fields.read().as_ref() {
            return Ok(fields.clone());
        }
        Ok(self.derived_fields())
    }

    async fn search_values(
        &self,
        field_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScalarValue>, RepositoryError> {
        let needle = query.to_lowercase();
        let mut values: Vec<ScalarValue> = Vec::new();

        for contact in self.contacts.read().iter() {
            let Some(value) = contact.value(field_key) else { continue };
            if values.contains(value) {
                continue;
            }
            if value.to_string().to_lowercase().contains(&needle) {
                values.push(value.clone());
            }
        }

        values.sort_by_key(|v| v.to_string());
        values.truncate(limit);
        Ok(values)
    }
}
