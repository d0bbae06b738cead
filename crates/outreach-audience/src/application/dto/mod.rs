//! Data Transfer Objects (DTOs)
//!
//! Objects for transferring data across boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{IdentityKeyConfig, KeySlot, Segment, SlotState};
use crate::domain::filter::{FilterError, FilterGroup, Selection, UnresolvedGroup};
use crate::domain::value_objects::{ContactRecord, EntityId};

// =============================================================================
// Segment Commands
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentCommand {
    pub name: String,
    pub filters: Vec<FilterGroup>,
}

impl CreateSegmentCommand {
    /// Build from editor state; an empty selection is rejected here
    pub fn from_selection(name: impl Into<String>, selection: &Selection) -> Result<Self, FilterError> {
        Ok(Self {
            name: name.into(),
            filters: selection.to_groups()?,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSegmentCommand {
    pub segment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterGroup>>,
}

/// A saved segment hydrated back into editor state
#[derive(Clone, Debug)]
pub struct EditableSegment {
    pub segment: Segment,
    pub selection: Selection,
    /// Groups referencing fields that no longer exist
    pub unresolved: Vec<UnresolvedGroup>,
}

// =============================================================================
// Identity Key Views
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub slot: KeySlot,
    pub state: SlotState,
    pub field_key: Option<String>,
    pub filter_groups: usize,
    pub revert_requested_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityKeyView {
    pub company_id: String,
    pub finalized: bool,
    pub slots: Vec<SlotView>,
}

impl From<&IdentityKeyConfig> for IdentityKeyView {
    fn from(config: &IdentityKeyConfig) -> Self {
        let slots = KeySlot::ALL
            .iter()
            .map(|&slot| SlotView {
                slot,
                state: config.slot_state(slot),
                field_key: match slot {
                    KeySlot::PrimaryKey => config.primary_key().field_key.clone(),
                    KeySlot::EmailKey => config.email_key().field_key.clone(),
                    KeySlot::Filters => None,
                },
                filter_groups: match slot {
                    KeySlot::Filters => config.filters().groups.len(),
                    _ => 0,
                },
                revert_requested_at: config.pending_revert(slot).map(|r| r.requested_at),
            })
            .collect();

        Self {
            company_id: config.company_id().to_string(),
            finalized: config.is_finalized(),
            slots,
        }
    }
}

// =============================================================================
// Duplicate Resolution
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    pub pair_id: EntityId,
    pub kept: ContactRecord,
    pub discarded: ContactRecord,
    /// Server-side count after the queue was rebuilt; `None` when the rebuild
    /// failed and the queue must be refreshed before the next resolution
    pub total_remaining: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResolutionSummary {
    pub resolved: u64,
    pub total_remaining: Option<u64>,
}
