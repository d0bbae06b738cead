//! Audience counts
//!
//! Per-segment counts are display-only and non-additive. The de-duplicated
//! total always comes from a single evaluation of the union predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::filter::{Criterion, FilterGroup};
use crate::domain::value_objects::EntityId;

/// Predicate sent to the evaluator: OR over segments, each an AND of groups
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiencePredicate {
    pub any_of: Vec<Vec<FilterGroup>>,
}

impl AudiencePredicate {
    pub fn single(groups: Vec<FilterGroup>) -> Self {
        Self { any_of: vec![groups] }
    }

    pub fn union(alternatives: Vec<Vec<FilterGroup>>) -> Self {
        Self { any_of: alternatives }
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }

    pub fn criterion(&self) -> Criterion {
        Criterion::any_of(self.any_of.iter().map(|groups| Criterion::all_of(groups)).collect())
    }
}

/// Evaluator response for one predicate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateCount {
    pub count: u64,
    pub invalid_email_count: u64,
    pub un_subscribed_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCount {
    pub segment_id: EntityId,
    pub contact_count: u64,
    pub invalid_email_count: u64,
    pub un_subscribed_count: u64,
}

impl SegmentCount {
    pub fn from_predicate(segment_id: EntityId, count: PredicateCount) -> Self {
        Self {
            segment_id,
            contact_count: count.count,
            invalid_email_count: count.invalid_email_count,
            un_subscribed_count: count.un_subscribed_count,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCountResult {
    pub per_segment: Vec<SegmentCount>,
    pub total_number_of_contacts: u64,
    pub total_invalid_email_count: u64,
    pub total_un_subscribed_count: u64,
}

impl SegmentCountResult {
    pub fn new(per_segment: Vec<SegmentCount>, union: PredicateCount) -> Self {
        Self {
            per_segment,
            total_number_of_contacts: union.count,
            total_invalid_email_count: union.invalid_email_count,
            total_un_subscribed_count: union.un_subscribed_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceReport {
    #[serde(flatten)]
    pub counts: SegmentCountResult,
    /// Requested ids that no longer resolve to a segment, or whose segment has
    /// no filter group that constrains anything
    #[serde(default)]
    pub stale_segment_ids: Vec<EntityId>,
    pub computed_at: DateTime<Utc>,
}

impl AudienceReport {
    pub fn empty() -> Self {
        Self {
            counts: SegmentCountResult::default(),
            stale_segment_ids: vec![],
            computed_at: Utc::now(),
        }
    }

    pub fn has_stale_references(&self) -> bool {
        !self.stale_segment_ids.is_empty()
    }

    /// Contacts counted more than once across `per_segment`
    pub fn overlap(&self) -> u64 {
        let sum: u64 = self.counts.per_segment.iter().map(|s| s.contact_count).sum();
        sum.saturating_sub(self.counts.total_number_of_contacts)
    }

    /// Lower bound on recipients left after removing invalid and unsubscribed
    /// contacts. The two counts are independent, so a contact carrying both
    /// flags is subtracted twice.
    pub fn min_deliverable(&self) -> u64 {
        self.counts
            .total_number_of_contacts
            .saturating_sub(self.counts.total_invalid_email_count)
            .saturating_sub(self.counts.total_un_subscribed_count)
    }
}

/// Observable state of an audience count
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CountState {
    #[default]
    Pending,
    Available(AudienceReport),
    Unavailable { reason: String },
}

impl CountState {
    pub fn report(&self) -> Option<&AudienceReport> {
        match self {
            Self::Available(report) => Some(report),
            _ => None,
        }
    }
}

/// Segments attached to one campaign together with the last known count
#[derive(Clone, Debug, Default)]
pub struct CampaignAudience {
    segment_ids: Vec<EntityId>,
    state: CountState,
}

impl CampaignAudience {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment_ids(&self) -> &[EntityId] { &self.segment_ids }
    pub fn state(&self) -> &CountState { &self.state }

    /// Returns false when the segment was already attached
    pub fn attach(&mut self, segment_id: EntityId) -> bool {
        if self.segment_ids.contains(&segment_id) {
            return false;
        }
        self.segment_ids.push(segment_id);
        self.state = CountState::Pending;
        true
    }

    pub fn detach(&mut self, segment_id: &EntityId) -> bool {
        let before = self.segment_ids.len();
        self.segment_ids.retain(|id| id != segment_id);
        let removed = self.segment_ids.len() != before;
        if removed {
            self.state = CountState::Pending;
        }
        removed
    }

    pub fn record(&mut self, state: CountState) {
        self.state = state;
    }
}
