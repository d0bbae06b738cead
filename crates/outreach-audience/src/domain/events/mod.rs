//! Domain Events
//!
//! Events raised by aggregates to communicate state changes.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{BulkChoice, KeySlot, ResolutionChoice};
use crate::domain::value_objects::{CompanyId, EntityId};

/// All domain events in the audience bounded context
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Segment(SegmentEvent),
    IdentityKey(IdentityKeyEvent),
    Duplicate(DuplicateEvent),
}

/// Segment-related domain events
#[derive(Clone, Debug, PartialEq)]
pub enum SegmentEvent {
    Created {
        segment_id: EntityId,
        name: String,
        group_count: usize,
        created_at: DateTime<Utc>,
    },

    Renamed {
        segment_id: EntityId,
        from: String,
        to: String,
    },

    FiltersReplaced {
        segment_id: EntityId,
        group_count: usize,
        updated_at: DateTime<Utc>,
    },

    Deleted {
        segment_id: EntityId,
    },
}

/// Identity key lifecycle events
#[derive(Clone, Debug, PartialEq)]
pub enum IdentityKeyEvent {
    KeySelected {
        company_id: CompanyId,
        slot: KeySlot,
        field_key: String,
    },

    FiltersChanged {
        company_id: CompanyId,
        group_count: usize,
    },

    Finalized {
        company_id: CompanyId,
        locked: Vec<KeySlot>,
        finalized_at: DateTime<Utc>,
    },

    RevertRequested {
        company_id: CompanyId,
        slot: KeySlot,
        requested_at: DateTime<Utc>,
    },

    RevertCancelled {
        company_id: CompanyId,
        slot: KeySlot,
    },

    RevertApproved {
        company_id: CompanyId,
        slot: KeySlot,
    },
}

/// Duplicate resolution events
#[derive(Clone, Debug, PartialEq)]
pub enum DuplicateEvent {
    PairResolved {
        pair_id: EntityId,
        choice: ResolutionChoice,
        kept: EntityId,
        discarded: EntityId,
    },

    AllResolved {
        choice: BulkChoice,
        resolved: u64,
    },
}

/// Aggregate id used for queue-wide events
pub const DUPLICATE_QUEUE_ID: &str = "duplicate-queue";

impl DomainEvent {
    /// Get the aggregate ID this event belongs to
    pub fn aggregate_id(&self) -> &str {
        match self {
            DomainEvent::Segment(e) => match e {
                SegmentEvent::Created { segment_id, .. }
                | SegmentEvent::Renamed { segment_id, .. }
                | SegmentEvent::FiltersReplaced { segment_id, .. }
                | SegmentEvent::Deleted { segment_id } => segment_id.as_str(),
            },
            DomainEvent::IdentityKey(e) => match e {
                IdentityKeyEvent::KeySelected { company_id, .. }
                | IdentityKeyEvent::FiltersChanged { company_id, .. }
                | IdentityKeyEvent::Finalized { company_id, .. }
                | IdentityKeyEvent::RevertRequested { company_id, .. }
                | IdentityKeyEvent::RevertCancelled { company_id, .. }
                | IdentityKeyEvent::RevertApproved { company_id, .. } => company_id.as_str(),
            },
            DomainEvent::Duplicate(e) => match e {
                DuplicateEvent::PairResolved { pair_id, .. } => pair_id.as_str(),
                DuplicateEvent::AllResolved { .. } => DUPLICATE_QUEUE_ID,
            },
        }
    }

    /// Get event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Segment(e) => match e {
                SegmentEvent::Created { .. } => "segment.created",
                SegmentEvent::Renamed { .. } => "segment.renamed",
                SegmentEvent::FiltersReplaced { .. } => "segment.filters_replaced",
                SegmentEvent::Deleted { .. } => "segment.deleted",
            },
            DomainEvent::IdentityKey(e) => match e {
                IdentityKeyEvent::KeySelected { .. } => "identity_key.key_selected",
                IdentityKeyEvent::FiltersChanged { .. } => "identity_key.filters_changed",
                IdentityKeyEvent::Finalized { .. } => "identity_key.finalized",
                IdentityKeyEvent::RevertRequested { .. } => "identity_key.revert_requested",
                IdentityKeyEvent::RevertCancelled { .. } => "identity_key.revert_cancelled",
                IdentityKeyEvent::RevertApproved { .. } => "identity_key.revert_approved",
            },
            DomainEvent::Duplicate(e) => match e {
                DuplicateEvent::PairResolved { .. } => "duplicate.pair_resolved",
                DuplicateEvent::AllResolved { .. } => "duplicate.all_resolved",
            },
        }
    }
}
