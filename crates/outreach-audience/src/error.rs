//! Error types surfaced to callers of the application layer

use crate::domain::aggregates::{IdentityKeyError, KeySlot, QueueError, SegmentError};
use crate::domain::filter::FilterError;
use crate::domain::value_objects::EntityId;
use crate::ports::outbound::RepositoryError;

/// Result type alias for audience operations
pub type Result<T> = std::result::Result<T, AudienceError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudienceError {
    #[error("segment has no constraints; choose at least one field value or condition")]
    EmptySegment,

    #[error("stale reference: {0} no longer exists")]
    StaleReference(String),

    #[error("{slot} is locked; request a revert before changing it")]
    KeyLocked { slot: KeySlot },

    #[error("a revert request for {slot} is already pending")]
    DuplicateRevertRequest { slot: KeySlot },

    #[error("duplicate pair {pair_id} was already resolved elsewhere; refresh the queue")]
    StalePair { pair_id: EntityId },

    #[error("audience count unavailable: {0}")]
    AggregationUnavailable(String),

    #[error("no pending revert request for {slot}")]
    NoPendingRevert { slot: KeySlot },

    #[error("{slot} is not locked")]
    SlotNotLocked { slot: KeySlot },

    #[error("{slot} must be configured before finalizing")]
    SlotNotConfigured { slot: KeySlot },

    #[error("{remaining} duplicate pairs are unresolved; resolve them before finalizing")]
    UnresolvedDuplicates { remaining: u64 },

    #[error("duplicate queue is out of sync; refresh before resolving")]
    QueueOutOfSync,

    #[error("no duplicate pair at index {index} (queue holds {len})")]
    InvalidPairIndex { index: usize, len: usize },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl AudienceError {
    /// Concurrency and staleness errors: the caller must reload state
    /// instead of retrying the same call
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            Self::KeyLocked { .. }
                | Self::DuplicateRevertRequest { .. }
                | Self::StalePair { .. }
                | Self::QueueOutOfSync
                | Self::StaleReference(_)
        )
    }

    /// Rejected before anything was sent to a store
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptySegment | Self::Validation(_))
    }
}

impl From<FilterError> for AudienceError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::EmptySegment => Self::EmptySegment,
            FilterError::StaleField { field } => Self::StaleReference(format!("field '{}'", field)),
        }
    }
}

impl From<SegmentError> for AudienceError {
    fn from(err: SegmentError) -> Self {
        match err {
            SegmentError::BlankName => Self::Validation(err.to_string()),
            SegmentError::Filter(e) => e.into(),
        }
    }
}

impl From<IdentityKeyError> for AudienceError {
    fn from(err: IdentityKeyError) -> Self {
        match err {
            IdentityKeyError::KeyLocked { slot } => Self::KeyLocked { slot },
            IdentityKeyError::DuplicateRevertRequest { slot } => Self::DuplicateRevertRequest { slot },
            IdentityKeyError::SlotNotLocked { slot } => Self::SlotNotLocked { slot },
            IdentityKeyError::NoPendingRevert { slot } => Self::NoPendingRevert { slot },
            IdentityKeyError::SlotNotConfigured { slot } => Self::SlotNotConfigured { slot },
            IdentityKeyError::BlankFieldKey { .. } | IdentityKeyError::NotAKeySlot => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<QueueError> for AudienceError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidIndex { index, len } => Self::InvalidPairIndex { index, len },
            QueueError::OutOfSync => Self::QueueOutOfSync,
        }
    }
}

impl From<RepositoryError> for AudienceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            RepositoryError::StalePair(pair_id) => Self::StalePair { pair_id },
            RepositoryError::Lifecycle(e) => e.into(),
            RepositoryError::Invalid(e) => Self::Validation(e),
            other => Self::Store(other.to_string()),
        }
    }
}
