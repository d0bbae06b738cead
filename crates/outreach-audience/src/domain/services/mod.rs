//! Domain services module

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::aggregates::{DuplicatePair, KeyChangePreview, KeySlot, ResolutionChoice};
use crate::domain::filter::Criterion;
use crate::domain::value_objects::{ContactRecord, EntityId, ScalarValue};

/// Counts contacts matching a predicate, de-duplicated by contact identity
pub struct AudienceCounter;

/// Which fields identify a contact and carry its address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityFields {
    pub primary_key: Option<String>,
    pub email_key: String,
}

impl Default for IdentityFields {
    fn default() -> Self {
        Self {
            primary_key: None,
            email_key: "email".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub invalid_email_count: u64,
    pub un_subscribed_count: u64,
}

#[derive(Hash, PartialEq, Eq)]
enum Identity<'a> {
    Key(&'a ScalarValue),
    Record(&'a EntityId),
}

impl AudienceCounter {
    /// Contacts sharing a primary-key value count once; the first record seen
    /// decides the invalid/unsubscribed flags for that identity.
    pub fn count<'a, I>(criterion: &Criterion, contacts: I, identity: &IdentityFields) -> Tally
    where
        I: IntoIterator<Item = &'a ContactRecord>,
    {
        let mut seen: HashSet<Identity<'a>> = HashSet::new();
        let mut tally = Tally::default();

        for contact in contacts {
            if !criterion.evaluate(contact) {
                continue;
            }
            let key = identity
                .primary_key
                .as_deref()
                .and_then(|field| contact.value(field))
                .map(Identity::Key)
                .unwrap_or(Identity::Record(&contact.id));
            if !seen.insert(key) {
                continue;
            }

            tally.count += 1;
            if !contact.has_valid_email(&identity.email_key) {
                tally.invalid_email_count += 1;
            }
            if contact.unsubscribed {
                tally.un_subscribed_count += 1;
            }
        }

        tally
    }
}

/// Impact of choosing a field as an identity key
pub struct KeyImpactService;

impl KeyImpactService {
    pub fn preview<'a, I>(slot: KeySlot, field_key: &str, contacts: I) -> KeyChangePreview
    where
        I: IntoIterator<Item = &'a ContactRecord>,
    {
        let mut occurrences: HashMap<&ScalarValue, u64> = HashMap::new();
        let mut affected = 0u64;

        for contact in contacts {
            if let Some(value) = contact.value(field_key) {
                affected += 1;
                *occurrences.entry(value).or_default() += 1;
            }
        }

        KeyChangePreview {
            slot,
            field_key: field_key.to_string(),
            affected_contacts: affected,
            distinct_values: occurrences.len() as u64,
            duplicate_values: occurrences.values().filter(|n| **n > 1).count() as u64,
        }
    }
}

/// Picks the surviving record of a duplicate pair
pub struct CanonicalRecordService;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDecision {
    pub pair_id: EntityId,
    pub choice: ResolutionChoice,
    pub kept: ContactRecord,
    pub discarded: ContactRecord,
}

impl CanonicalRecordService {
    pub fn decide(pair: &DuplicatePair, choice: ResolutionChoice) -> CanonicalDecision {
        let (kept, discarded) = match choice {
            ResolutionChoice::Old => (&pair.old, &pair.new),
            ResolutionChoice::New => (&pair.new, &pair.old),
        };
        CanonicalDecision {
            pair_id: pair.id.clone(),
            choice,
            kept: kept.clone(),
            discarded: discarded.clone(),
        }
    }
}
