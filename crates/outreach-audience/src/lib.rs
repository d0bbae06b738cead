//! Outreach Audience
//!
//! Audience definition and contact-identity core of a bulk email dashboard.
//!
//! ## Architecture
//!
//! - **Domain Layer**: filter tree, aggregates, audience counts, domain events
//! - **Application Layer**: use case orchestration, DTOs, value suggestions
//! - **Ports Layer**: hexagonal interfaces towards the contact/segment store
//! - **Infrastructure Layer**: in-memory and REST adapters
//!
//! ## Key Aggregates
//!
//! - **Segment**: named, reusable audience predicate
//! - **IdentityKeyConfig**: per-company lock/revert lifecycle of the primary
//!   key, email key and contact filters
//! - **ResolutionQueue**: operator view over duplicate contact pairs
//!
//! Recipient totals across several segments are always computed from one
//! evaluation of the union predicate, never by summing per-segment counts.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

// Re-exports for convenience
pub use application::{
    AudienceService, DuplicateQueueSession, IdentityKeyService, SegmentService, Suggestion, ValueSuggester,
};
pub use config::{AudienceConfig, ConfigError};
pub use domain::aggregates::{
    BulkChoice, DuplicatePair, FinalizeOutcome, IdentityKeyConfig, KeySlot, ResolutionChoice, ResolutionQueue,
    Segment, SlotState,
};
pub use domain::audience::{AudienceReport, CampaignAudience, CountState, SegmentCountResult};
pub use domain::events::DomainEvent;
pub use domain::filter::{FilterCriterion, FilterGroup, Operator, Selection};
pub use domain::value_objects::{CompanyId, ContactRecord, EntityId, ScalarValue};
pub use error::{AudienceError, Result};
pub use infrastructure::RestClient;
pub use ports::inbound::{AudienceUseCases, IdentityKeyUseCases, SegmentUseCases};
pub use ports::outbound::{
    DuplicateStore, EventPublisher, FieldValueSource, IdentityKeyStore, PredicateEvaluator, RepositoryError,
    SegmentRepository,
};
