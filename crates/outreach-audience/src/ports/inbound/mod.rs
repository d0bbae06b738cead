//! Inbound ports (Use case traits)
//!
//! Hexagonal architecture: application service interfaces.

use async_trait::async_trait;

use crate::application::dto::*;
use crate::domain::aggregates::{FinalizeOutcome, KeyChangePreview, KeySlot, RevertRequest, Segment, SlotState};
use crate::domain::audience::{AudienceReport, CampaignAudience, CountState, PredicateCount};
use crate::domain::filter::{FilterGroup, Selection};
use crate::domain::value_objects::EntityId;
use crate::error::Result;

/// Segment management use cases
#[async_trait]
pub trait SegmentUseCases: Send + Sync {
    async fn create_segment(&self, command: CreateSegmentCommand) -> Result<Segment>;

    async fn update_segment(&self, command: UpdateSegmentCommand) -> Result<Segment>;

    async fn delete_segment(&self, id: &EntityId) -> Result<()>;

    async fn get_segment(&self, id: &EntityId) -> Result<Option<Segment>>;

    async fn list_segments(&self) -> Result<Vec<Segment>>;

    /// Load a segment into editor state, surfacing stale field references
    async fn edit_segment(&self, id: &EntityId) -> Result<EditableSegment>;

    /// Count an unsaved selection
    async fn preview_count(&self, selection: &Selection) -> Result<PredicateCount>;
}

/// Audience aggregation use cases
#[async_trait]
pub trait AudienceUseCases: Send + Sync {
    async fn compute_audience(&self, segment_ids: &[EntityId]) -> Result<AudienceReport>;

    /// Recount a campaign's audience; failures become `CountState::Unavailable`
    async fn refresh(&self, audience: &mut CampaignAudience) -> CountState;

    /// Fresh count taken right before a send; never served from a snapshot
    async fn snapshot_for_send(&self, audience: &CampaignAudience) -> Result<AudienceReport>;
}

/// Identity key lifecycle use cases
#[async_trait]
pub trait IdentityKeyUseCases: Send + Sync {
    async fn get_config(&self) -> Result<IdentityKeyView>;

    async fn set_primary_key(&self, field_key: &str) -> Result<SlotState>;

    async fn set_email_key(&self, field_key: &str) -> Result<SlotState>;

    async fn set_filters(&self, groups: Vec<FilterGroup>) -> Result<SlotState>;

    async fn preview_key_change(&self, slot: KeySlot, field_key: &str) -> Result<KeyChangePreview>;

    async fn finalize(&self) -> Result<FinalizeOutcome>;

    async fn request_revert(&self, slot: KeySlot) -> Result<RevertRequest>;

    async fn cancel_revert(&self, slot: KeySlot) -> Result<SlotState>;
}
