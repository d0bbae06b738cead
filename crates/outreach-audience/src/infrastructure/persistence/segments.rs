use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::aggregates::Segment;
use crate::domain::value_objects::EntityId;
use crate::ports::outbound::{RepositoryError, SegmentRepository};

/// In-memory segment repository
#[derive(Default)]
pub struct InMemorySegmentRepository {
    segments: RwLock<HashMap<EntityId, Segment>>,
}

impl InMemorySegmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn stored(segment: &Segment) -> Segment {
        let mut copy = segment.clone();
        copy.take_events();
        copy
    }
}

#[async_trait]
impl SegmentRepository for InMemorySegmentRepository {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Segment>, RepositoryError> {
        Ok(self.segments.read().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Segment>, RepositoryError> {
        let mut segments: Vec<Segment> = self.segments.read().values().cloned().collect();
        segments.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.name().cmp(b.name())));
        Ok(segments)
    }

    async fn create(&self, segment: &Segment) -> Result<Segment, RepositoryError> {
        let mut segments = self.segments.write();
        if segments.contains_key(segment.id()) {
            return Err(RepositoryError::Conflict(format!("segment '{}' already exists", segment.id())));
        }
        let stored = Self::stored(segment);
        segments.insert(segment.id().clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, segment: &Segment) -> Result<Segment, RepositoryError> {
        let mut segments = self.segments.write();
        let slot = segments
            .get_mut(segment.id())
            .ok_or_else(|| RepositoryError::NotFound(format!("segment '{}'", segment.id())))?;
        *slot = Self::stored(segment);
        Ok(slot.clone())
    }

    async fn delete(&self, id: &EntityId) -> Result<(), RepositoryError> {
        self.segments
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("segment '{}'", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterGroup;

    #[tokio::test]
    async fn test_segment_repository_round_trip() {
        let repo = InMemorySegmentRepository::new();
        let segment = Segment::create("US", vec![FilterGroup::new("country", ["US"])]).unwrap();

        repo.create(&segment).await.unwrap();
        assert!(matches!(repo.create(&segment).await, Err(RepositoryError::Conflict(_))));

        let found = repo.find_by_id(segment.id()).await.unwrap().unwrap();
        assert_eq!(found.name(), "US");
        assert_eq!(repo.list().await.unwrap().len(), 1);

        repo.delete(segment.id()).await.unwrap();
        assert!(matches!(repo.delete(segment.id()).await, Err(RepositoryError::NotFound(_))));
        assert!(matches!(repo.update(&segment).await, Err(RepositoryError::NotFound(_))));
    }
}
