//! Field-value typeahead
//!
//! Debounced and last-request-wins: each call takes a ticket, and a call
//! whose ticket is no longer the newest returns [`Suggestion::Superseded`]
//! instead of values, whether it was overtaken while waiting out the
//! debounce or while its lookup was in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::value_objects::ScalarValue;
use crate::error::Result;
use crate::ports::outbound::FieldValueSource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Suggestion {
    Values(Vec<ScalarValue>),
    /// A newer query was issued; this answer must not be shown
    Superseded,
}

pub struct ValueSuggester {
    source: Arc<dyn FieldValueSource>,
    generation: AtomicU64,
    debounce: Duration,
    limit: usize,
}

impl ValueSuggester {
    pub fn new(source: Arc<dyn FieldValueSource>, debounce: Duration, limit: usize) -> Self {
        Self {
            source,
            generation: AtomicU64::new(0),
            debounce,
            limit: limit.max(1),
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    pub async fn suggest(&self, field_key: &str, query: &str) -> Result<Suggestion> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if !self.is_current(ticket) {
            debug!(field_key, query, "suggestion superseded before lookup");
            return Ok(Suggestion::Superseded);
        }

        let lookup = self.source.search_values(field_key, query.trim(), self.limit).await;

        // An overtaken lookup is dropped whether it answered or failed
        if !self.is_current(ticket) {
            debug!(field_key, query, failed = lookup.is_err(), "suggestion superseded in flight");
            return Ok(Suggestion::Superseded);
        }
        Ok(Suggestion::Values(lookup?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::KnownField;
    use crate::domain::value_objects::ContactRecord;
    use crate::infrastructure::persistence::InMemoryContactStore;
    use crate::ports::outbound::RepositoryError;
    use async_trait::async_trait;

    fn store() -> Arc<InMemoryContactStore> {
        Arc::new(InMemoryContactStore::new(vec![
            ContactRecord::new("1").with("country", "United States"),
            ContactRecord::new("2").with("country", "United Kingdom"),
            ContactRecord::new("3").with("country", "Germany"),
        ]))
    }

    #[tokio::test]
    async fn test_single_query_returns_values() {
        let suggester = ValueSuggester::new(store(), Duration::ZERO, 10);
        let suggestion = suggester.suggest("country", "unit").await.unwrap();
        match suggestion {
            Suggestion::Values(values) => assert_eq!(values.len(), 2),
            Suggestion::Superseded => panic!("lone query must not be superseded"),
        }
    }

    #[tokio::test]
    async fn test_debounced_query_is_superseded() {
        let suggester = Arc::new(ValueSuggester::new(store(), Duration::from_millis(50), 10));

        let early = {
            let suggester = suggester.clone();
            tokio::spawn(async move { suggester.suggest("country", "u").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let late = suggester.suggest("country", "germ").await.unwrap();

        assert_eq!(early.await.unwrap().unwrap(), Suggestion::Superseded);
        assert_eq!(late, Suggestion::Values(vec![ScalarValue::from("Germany")]));
    }

    /// Slow source: answers after a delay so a newer query can overtake
    struct SlowSource {
        inner: Arc<InMemoryContactStore>,
        delay: Duration,
        fail_slow: bool,
    }

    #[async_trait]
    impl FieldValueSource for SlowSource {
        async fn known_fields(&self) -> std::result::Result<Vec<KnownField>, RepositoryError> {
            self.inner.known_fields().await
        }

        async fn search_values(
            &self,
            field_key: &str,
            query: &str,
            limit: usize,
        ) -> std::result::Result<Vec<ScalarValue>, RepositoryError> {
            if query.len() == 1 {
                tokio::time::sleep(self.delay).await;
                if self.fail_slow {
                    return Err(RepositoryError::Connection("connection reset".into()));
                }
            }
            self.inner.search_values(field_key, query, limit).await
        }
    }

    #[tokio::test]
    async fn test_out_of_order_response_is_dropped() {
        let source = Arc::new(SlowSource { inner: store(), delay: Duration::from_millis(80), fail_slow: false });
        let suggester = Arc::new(ValueSuggester::new(source, Duration::ZERO, 10));

        let slow = {
            let suggester = suggester.clone();
            tokio::spawn(async move { suggester.suggest("country", "u").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = suggester.suggest("country", "ge").await.unwrap();

        assert_eq!(fast, Suggestion::Values(vec![ScalarValue::from("Germany")]));
        assert_eq!(slow.await.unwrap().unwrap(), Suggestion::Superseded);
    }

    #[tokio::test]
    async fn test_overtaken_failure_is_superseded() {
        let source = Arc::new(SlowSource { inner: store(), delay: Duration::from_millis(80), fail_slow: true });
        let suggester = Arc::new(ValueSuggester::new(source, Duration::ZERO, 10));

        let slow = {
            let suggester = suggester.clone();
            tokio::spawn(async move { suggester.suggest("country", "u").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = suggester.suggest("country", "ge").await.unwrap();

        assert_eq!(fast, Suggestion::Values(vec![ScalarValue::from("Germany")]));
        assert_eq!(slow.await.unwrap().unwrap(), Suggestion::Superseded);
    }

    #[tokio::test]
    async fn test_current_failure_is_reported() {
        let source = Arc::new(SlowSource { inner: store(), delay: Duration::ZERO, fail_slow: true });
        let suggester = ValueSuggester::new(source, Duration::ZERO, 10);
        assert!(suggester.suggest("country", "u").await.is_err());
    }
}
