//! Infrastructure layer
//!
//! Adapters implementing the outbound ports.

pub mod http;
pub mod persistence;

pub use http::RestClient;
pub use persistence::{
    InMemoryContactStore, InMemoryDuplicateStore, InMemoryEventLog, InMemoryIdentityKeyStore,
    InMemorySegmentRepository, NoOpEventPublisher,
};
