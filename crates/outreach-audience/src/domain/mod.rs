//! Domain module
//!
//! Segment definitions, audience counts, the identity key lifecycle and the
//! duplicate resolution queue.

pub mod aggregates;
pub mod audience;
pub mod events;
pub mod filter;
pub mod services;
pub mod value_objects;

pub use aggregates::*;
pub use audience::*;
pub use events::*;
pub use filter::{Criterion, FilterCriterion, FilterError, FilterGroup, Operator};
pub use value_objects::*;
