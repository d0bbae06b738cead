//! Outbound ports (Repository traits)
//!
//! Hexagonal architecture: these are the interfaces that infrastructure must implement.
//! Every call is a single request/response against the external store; the
//! store is the source of truth for every state it returns.

use async_trait::async_trait;

use crate::domain::aggregates::{
    BulkChoice, DuplicatePage, FinalizeOutcome, IdentityKeyConfig, IdentityKeyError, KeyChangePreview, KeySlot,
    ResolutionChoice, Segment,
};
use crate::domain::audience::{AudiencePredicate, PredicateCount};
use crate::domain::filter::{FilterGroup, KnownField};
use crate::domain::value_objects::{CompanyId, EntityId, ScalarValue};
use crate::domain::DomainEvent;

/// Segment repository port
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    /// Find segment by ID
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Segment>, RepositoryError>;

    /// List all segments
    async fn list(&self) -> Result<Vec<Segment>, RepositoryError>;

    /// Persist a new segment; returns the stored copy
    async fn create(&self, segment: &Segment) -> Result<Segment, RepositoryError>;

    /// Replace name and filters of an existing segment
    async fn update(&self, segment: &Segment) -> Result<Segment, RepositoryError>;

    /// Delete segment
    async fn delete(&self, id: &EntityId) -> Result<(), RepositoryError>;
}

/// Evaluates a predicate against the contact store
#[async_trait]
pub trait PredicateEvaluator: Send + Sync {
    async fn evaluate(&self, predicate: &AudiencePredicate) -> Result<PredicateCount, RepositoryError>;
}

/// Identity key store port.
///
/// Mutating calls apply the transition atomically on the store side and
/// return the resulting configuration.
#[async_trait]
pub trait IdentityKeyStore: Send + Sync {
    async fn load(&self, company: &CompanyId) -> Result<IdentityKeyConfig, RepositoryError>;

    async fn select_key(
        &self,
        company: &CompanyId,
        slot: KeySlot,
        field_key: &str,
    ) -> Result<IdentityKeyConfig, RepositoryError>;

    async fn set_filters(
        &self,
        company: &CompanyId,
        groups: &[FilterGroup],
    ) -> Result<IdentityKeyConfig, RepositoryError>;

    /// Lock every slot; the receipt says whether this call did it
    async fn finalize(&self, company: &CompanyId) -> Result<FinalizeReceipt, RepositoryError>;

    async fn request_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig, RepositoryError>;

    async fn cancel_revert(&self, company: &CompanyId, slot: KeySlot) -> Result<IdentityKeyConfig, RepositoryError>;

    /// Impact of selecting `field_key` for `slot`, computed without committing
    async fn preview_key(
        &self,
        company: &CompanyId,
        slot: KeySlot,
        field_key: &str,
    ) -> Result<KeyChangePreview, RepositoryError>;
}

/// Store answer to a finalize request
#[derive(Clone, Debug, PartialEq)]
pub struct FinalizeReceipt {
    pub config: IdentityKeyConfig,
    /// `AlreadyFinalized` when another session locked the slots first
    pub outcome: FinalizeOutcome,
}

/// Duplicate pair store port
#[async_trait]
pub trait DuplicateStore: Send + Sync {
    /// Fetch one page (1-based)
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<DuplicatePage, RepositoryError>;

    /// Fails with `StalePair` when the pair no longer exists
    async fn resolve(&self, pair_id: &EntityId, choice: ResolutionChoice) -> Result<(), RepositoryError>;

    /// Resolve every remaining pair; returns how many were resolved
    async fn resolve_all(&self, choice: BulkChoice) -> Result<u64, RepositoryError>;
}

/// Field metadata and value typeahead
#[async_trait]
pub trait FieldValueSource: Send + Sync {
    async fn known_fields(&self) -> Result<Vec<KnownField>, RepositoryError>;

    async fn search_values(
        &self,
        field_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScalarValue>, RepositoryError>;
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish domain events
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError>;
}

/// Repository error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate pair {0} no longer exists")]
    StalePair(EntityId),

    #[error(transparent)]
    Lifecycle(#[from] IdentityKeyError),

    #[error("rejected by store: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}
