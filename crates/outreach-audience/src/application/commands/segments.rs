use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::publish_events;
use crate::application::dto::*;
use crate::domain::aggregates::Segment;
use crate::domain::audience::{AudiencePredicate, PredicateCount};
use crate::domain::events::{DomainEvent, SegmentEvent};
use crate::domain::filter::{selection, Selection};
use crate::domain::value_objects::EntityId;
use crate::error::{AudienceError, Result};
use crate::ports::inbound::SegmentUseCases;
use crate::ports::outbound::{EventPublisher, FieldValueSource, PredicateEvaluator, SegmentRepository};

/// Segment application service
pub struct SegmentService {
    segment_repo: Arc<dyn SegmentRepository>,
    evaluator: Arc<dyn PredicateEvaluator>,
    fields: Arc<dyn FieldValueSource>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl SegmentService {
    pub fn new(
        segment_repo: Arc<dyn SegmentRepository>,
        evaluator: Arc<dyn PredicateEvaluator>,
        fields: Arc<dyn FieldValueSource>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            segment_repo,
            evaluator,
            fields,
            event_publisher,
        }
    }

    async fn load(&self, id: &EntityId) -> Result<Segment> {
        self.segment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AudienceError::StaleReference(format!("segment '{}'", id)))
    }
}

#[async_trait]
impl SegmentUseCases for SegmentService {
    async fn create_segment(&self, command: CreateSegmentCommand) -> Result<Segment> {
        // Validation happens before anything reaches the store
        let mut segment = Segment::create(command.name, command.filters)?;

        let stored = self.segment_repo.create(&segment).await?;
        info!(segment_id = %stored.id(), groups = stored.filters().len(), "segment created");

        publish_events(self.event_publisher.as_ref(), segment.take_events()).await;
        Ok(stored)
    }

    async fn update_segment(&self, command: UpdateSegmentCommand) -> Result<Segment> {
        if command.name.is_none() && command.filters.is_none() {
            return Err(AudienceError::Validation("nothing to update".into()));
        }

        let id = EntityId::from_string(&command.segment_id);
        let mut segment = self.load(&id).await?;

        if let Some(name) = command.name {
            segment.rename(name)?;
        }
        if let Some(filters) = command.filters {
            segment.replace_filters(filters)?;
        }

        let stored = self.segment_repo.update(&segment).await?;
        info!(segment_id = %id, "segment updated");

        publish_events(self.event_publisher.as_ref(), segment.take_events()).await;
        Ok(stored)
    }

    async fn delete_segment(&self, id: &EntityId) -> Result<()> {
        self.segment_repo.delete(id).await?;
        info!(segment_id = %id, "segment deleted");

        let event = DomainEvent::Segment(SegmentEvent::Deleted { segment_id: id.clone() });
        publish_events(self.event_publisher.as_ref(), vec![event]).await;
        Ok(())
    }

    async fn get_segment(&self, id: &EntityId) -> Result<Option<Segment>> {
        Ok(self.segment_repo.find_by_id(id).await?)
    }

    async fn list_segments(&self) -> Result<Vec<Segment>> {
        Ok(self.segment_repo.list().await?)
    }

    async fn edit_segment(&self, id: &EntityId) -> Result<EditableSegment> {
        let segment = self.load(id).await?;
        let known = self.fields.known_fields().await?;
        let hydration = selection::from_groups(segment.filters(), &known);

        for unresolved in &hydration.unresolved {
            warn!(
                segment_id = %id,
                field = %unresolved.group.field_key,
                reason = ?unresolved.reason,
                "segment references a field that no longer exists"
            );
        }

        Ok(EditableSegment {
            segment,
            selection: hydration.selection,
            unresolved: hydration.unresolved,
        })
    }

    async fn preview_count(&self, selection: &Selection) -> Result<PredicateCount> {
        let groups = selection.to_groups()?;
        self.evaluator
            .evaluate(&AudiencePredicate::single(groups))
            .await
            .map_err(|e| AudienceError::AggregationUnavailable(e.to_string()))
    }
}
