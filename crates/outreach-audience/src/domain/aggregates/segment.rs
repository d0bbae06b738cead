//! Segment Aggregate
//!
//! A named, reusable audience definition. The aggregate guarantees it always
//! carries at least one non-empty filter group.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{DomainEvent, SegmentEvent};
use crate::domain::filter::{Criterion, FilterError, FilterGroup};
use crate::domain::value_objects::{ContactRecord, EntityId};

/// Segment aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    id: EntityId,
    name: String,
    filters: Vec<FilterGroup>,
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Segment {
    /// Create a new segment (factory method)
    pub fn create(name: impl Into<String>, filters: Vec<FilterGroup>) -> Result<Self, SegmentError> {
        let name = Self::validate_name(name.into())?;
        let filters = Self::validate_filters(filters)?;
        let now = Utc::now();
        let id = EntityId::new();

        let mut segment = Self {
            id: id.clone(),
            name: name.clone(),
            filters,
            created_at: now,
            updated_at: now,
            events: vec![],
        };

        segment.raise_event(DomainEvent::Segment(SegmentEvent::Created {
            segment_id: id,
            name,
            group_count: segment.filters.len(),
            created_at: now,
        }));

        Ok(segment)
    }

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn filters(&self) -> &[FilterGroup] { &self.filters }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), SegmentError> {
        let name = Self::validate_name(name.into())?;
        if name == self.name {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.name, name.clone());
        self.touch();
        self.raise_event(DomainEvent::Segment(SegmentEvent::Renamed {
            segment_id: self.id.clone(),
            from: previous,
            to: name,
        }));
        Ok(())
    }

    /// Swap the whole definition; the old predicate is discarded atomically
    pub fn replace_filters(&mut self, filters: Vec<FilterGroup>) -> Result<(), SegmentError> {
        self.filters = Self::validate_filters(filters)?;
        self.touch();
        self.raise_event(DomainEvent::Segment(SegmentEvent::FiltersReplaced {
            segment_id: self.id.clone(),
            group_count: self.filters.len(),
            updated_at: self.updated_at,
        }));
        Ok(())
    }

    /// Predicate of this segment: every group must hold
    pub fn criterion(&self) -> Criterion {
        Criterion::all_of(&self.filters)
    }

    pub fn matches(&self, contact: &ContactRecord) -> bool {
        self.criterion().evaluate(contact)
    }

    /// Groups that actually constrain. A segment read back from the store is
    /// not re-validated, so this may be empty.
    pub fn constrained_filters(&self) -> Vec<FilterGroup> {
        self.filters.iter().filter(|g| !g.is_empty()).cloned().collect()
    }

    pub fn is_evaluable(&self) -> bool {
        self.filters.iter().any(|g| !g.is_empty())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn validate_name(name: String) -> Result<String, SegmentError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(SegmentError::BlankName);
        }
        Ok(name)
    }

    fn validate_filters(filters: Vec<FilterGroup>) -> Result<Vec<FilterGroup>, SegmentError> {
        let filters: Vec<FilterGroup> = filters.into_iter().filter(|g| !g.is_empty()).collect();
        if filters.is_empty() {
            return Err(SegmentError::Filter(FilterError::EmptySegment));
        }
        Ok(filters)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("segment name must not be blank")]
    BlankName,
    #[error(transparent)]
    Filter(#[from] FilterError),
}
