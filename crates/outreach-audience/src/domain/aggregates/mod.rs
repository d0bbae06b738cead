//! Aggregates module

pub mod duplicate_queue;
pub mod identity_key;
pub mod segment;

pub use duplicate_queue::{
    BulkChoice, BulkResolutionPlan, DuplicatePage, DuplicatePair, QueueError, ResolutionChoice,
    ResolutionQueue,
};
pub use identity_key::{
    FinalizeOutcome, FilterSlotConfig, IdentityKeyConfig, IdentityKeyError, KeyChangePreview,
    KeySlot, KeySlotConfig, RevertRequest, RevertStatus, SlotState,
};
pub use segment::{Segment, SegmentError};
