use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::aggregates::{BulkChoice, DuplicatePage, DuplicatePair, ResolutionChoice};
use crate::domain::services::CanonicalRecordService;
use crate::domain::value_objects::EntityId;
use crate::ports::outbound::{DuplicateStore, RepositoryError};

#[derive(Default)]
struct DuplicateState {
    pairs: Vec<DuplicatePair>,
    merged: Vec<EntityId>,
}

/// Duplicate detector output held in memory
#[derive(Default)]
pub struct InMemoryDuplicateStore {
    state: RwLock<DuplicateState>,
}

impl InMemoryDuplicateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, pairs: Vec<DuplicatePair>) {
        self.state.write().pairs.extend(pairs);
    }

    /// Ids of records merged away by resolutions
    pub fn merged_ids(&self) -> Vec<EntityId> {
        self.state.read().merged.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.read().pairs.len()
    }
}

#[async_trait]
impl DuplicateStore for InMemoryDuplicateStore {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<DuplicatePage, RepositoryError> {
        let state = self.state.read();
        let size = page_size.max(1) as usize;
        let start = (page.max(1) as usize - 1) * size;

        Ok(DuplicatePage {
            pairs: state.pairs.iter().skip(start).take(size).cloned().collect(),
            total_remaining: state.pairs.len() as u64,
        })
    }

    async fn resolve(&self, pair_id: &EntityId, choice: ResolutionChoice) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        let pos = state
            .pairs
            .iter()
            .position(|p| &p.id == pair_id)
            .ok_or_else(|| RepositoryError::StalePair(pair_id.clone()))?;

        let pair = state.pairs.remove(pos);
        let decision = CanonicalRecordService::decide(&pair, choice);
        state.merged.push(decision.discarded.id);
        Ok(())
    }

    async fn resolve_all(&self, choice: BulkChoice) -> Result<u64, RepositoryError> {
        let mut state = self.state.write();
        let pairs = std::mem::take(&mut state.pairs);
        let resolved = pairs.len() as u64;

        for pair in &pairs {
            let decision = CanonicalRecordService::decide(pair, choice.per_pair());
            state.merged.push(decision.discarded.id);
        }
        Ok(resolved)
    }
}
