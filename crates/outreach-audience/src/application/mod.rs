//! Application layer
//!
//! Orchestrates use cases and coordinates domain objects.

pub mod commands;
pub mod dto;
pub mod suggest;

pub use commands::{AudienceService, DuplicateQueueSession, IdentityKeyService, SegmentService};
pub use dto::*;
pub use suggest::{Suggestion, ValueSuggester};
