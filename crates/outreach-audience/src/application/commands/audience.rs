use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::domain::aggregates::Segment;
use crate::domain::audience::{
    AudiencePredicate, AudienceReport, CampaignAudience, CountState, PredicateCount, SegmentCount,
    SegmentCountResult,
};
use crate::domain::value_objects::EntityId;
use crate::error::{AudienceError, Result};
use crate::ports::inbound::AudienceUseCases;
use crate::ports::outbound::{PredicateEvaluator, RepositoryError, SegmentRepository};

/// Audience aggregation service
pub struct AudienceService {
    segment_repo: Arc<dyn SegmentRepository>,
    evaluator: Arc<dyn PredicateEvaluator>,
}

fn unavailable(err: RepositoryError) -> AudienceError {
    AudienceError::AggregationUnavailable(err.to_string())
}

impl AudienceService {
    pub fn new(segment_repo: Arc<dyn SegmentRepository>, evaluator: Arc<dyn PredicateEvaluator>) -> Self {
        Self { segment_repo, evaluator }
    }

    async fn evaluate(&self, predicate: &AudiencePredicate) -> Result<PredicateCount> {
        self.evaluator.evaluate(predicate).await.map_err(unavailable)
    }
}

#[async_trait]
impl AudienceUseCases for AudienceService {
    async fn compute_audience(&self, segment_ids: &[EntityId]) -> Result<AudienceReport> {
        let mut unique: Vec<&EntityId> = Vec::with_capacity(segment_ids.len());
        for id in segment_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Ok(AudienceReport::empty());
        }

        let mut resolved: Vec<Segment> = Vec::with_capacity(unique.len());
        let mut stale_segment_ids = Vec::new();
        for id in unique {
            match self.segment_repo.find_by_id(id).await.map_err(unavailable)? {
                Some(segment) if segment.is_evaluable() => resolved.push(segment),
                Some(_) => {
                    warn!(segment_id = %id, "segment has no usable filter groups, excluded from audience");
                    stale_segment_ids.push(id.clone());
                }
                None => {
                    warn!(segment_id = %id, "segment no longer exists, excluded from audience");
                    stale_segment_ids.push(id.clone());
                }
            }
        }

        let mut per_segment = Vec::with_capacity(resolved.len());
        for segment in &resolved {
            let count = self
                .evaluate(&AudiencePredicate::single(segment.constrained_filters()))
                .await?;
            per_segment.push(SegmentCount::from_predicate(segment.id().clone(), count));
        }

        // The total is one evaluation of the union, never a sum
        let union = if resolved.is_empty() {
            PredicateCount::default()
        } else {
            let alternatives = resolved.iter().map(Segment::constrained_filters).collect();
            self.evaluate(&AudiencePredicate::union(alternatives)).await?
        };

        info!(
            segments = resolved.len(),
            stale = stale_segment_ids.len(),
            total = union.count,
            "audience computed"
        );

        Ok(AudienceReport {
            counts: SegmentCountResult::new(per_segment, union),
            stale_segment_ids,
            computed_at: Utc::now(),
        })
    }

    async fn refresh(&self, audience: &mut CampaignAudience) -> CountState {
        audience.record(CountState::Pending);
        let state = match self.compute_audience(audience.segment_ids()).await {
            Ok(report) => CountState::Available(report),
            Err(e) => {
                warn!(error = %e, "audience count unavailable");
                CountState::Unavailable { reason: e.to_string() }
            }
        };
        audience.record(state.clone());
        state
    }

    async fn snapshot_for_send(&self, audience: &CampaignAudience) -> Result<AudienceReport> {
        self.compute_audience(audience.segment_ids()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterGroup;
    use crate::domain::value_objects::ContactRecord;
    use crate::infrastructure::persistence::{InMemoryContactStore, InMemorySegmentRepository};

    async fn fixture() -> (AudienceService, Arc<InMemoryContactStore>, EntityId, EntityId) {
        let repo = Arc::new(InMemorySegmentRepository::new());
        let contacts = Arc::new(InMemoryContactStore::new(vec![
            ContactRecord::new("1").with("country", "US").with("plan", "pro").with("email", "a@x.io"),
            ContactRecord::new("2").with("country", "US").with("plan", "free").with("email", "bad"),
            ContactRecord::new("3").with("country", "DE").with("plan", "pro").with("email", "c@x.io").unsubscribed(),
        ]));

        let us = Segment::create("US", vec![FilterGroup::new("country", ["US"])]).unwrap();
        let pro = Segment::create("Pro", vec![FilterGroup::new("plan", ["pro"])]).unwrap();
        repo.create(&us).await.unwrap();
        repo.create(&pro).await.unwrap();

        let service = AudienceService::new(repo, contacts.clone());
        (service, contacts, us.id().clone(), pro.id().clone())
    }

    #[tokio::test]
    async fn test_total_is_union_not_sum() {
        let (service, _, us, pro) = fixture().await;
        let report = service.compute_audience(&[us.clone(), pro.clone()]).await.unwrap();

        assert_eq!(report.counts.per_segment[0].contact_count, 2);
        assert_eq!(report.counts.per_segment[1].contact_count, 2);
        assert_eq!(report.counts.total_number_of_contacts, 3);
        assert_eq!(report.counts.total_invalid_email_count, 1);
        assert_eq!(report.counts.total_un_subscribed_count, 1);
        assert_eq!(report.overlap(), 1);
    }

    #[tokio::test]
    async fn test_zero_ids_is_all_zeros() {
        let (service, _, _, _) = fixture().await;
        let report = service.compute_audience(&[]).await.unwrap();
        assert_eq!(report.counts, SegmentCountResult::default());
    }

    #[tokio::test]
    async fn test_repeated_ids_count_once() {
        let (service, _, us, _) = fixture().await;
        let report = service.compute_audience(&[us.clone(), us.clone()]).await.unwrap();
        assert_eq!(report.counts.per_segment.len(), 1);
        assert_eq!(report.counts.total_number_of_contacts, 2);
    }

    #[tokio::test]
    async fn test_stale_segment_is_flagged_and_excluded() {
        let (service, _, us, _) = fixture().await;
        let gone = EntityId::from_string("deleted-segment");
        let report = service.compute_audience(&[us, gone.clone()]).await.unwrap();

        assert_eq!(report.stale_segment_ids, vec![gone]);
        assert_eq!(report.counts.total_number_of_contacts, 2);
        assert_eq!(report.counts.per_segment.len(), 1);
    }

    #[tokio::test]
    async fn test_segment_without_constraints_counts_nobody() {
        let repo = Arc::new(InMemorySegmentRepository::new());
        let contacts = Arc::new(InMemoryContactStore::new(vec![
            ContactRecord::new("1").with("country", "US").with("email", "a@x.io"),
            ContactRecord::new("2").with("country", "DE").with("email", "b@x.io"),
        ]));
        let hollow: Segment = serde_json::from_value(serde_json::json!({
            "id": "s-hollow",
            "name": "Hollow",
            "filters": [{"fieldKey": "country", "values": []}],
            "createdAt": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        let us = Segment::create("US", vec![FilterGroup::new("country", ["US"])]).unwrap();
        repo.create(&hollow).await.unwrap();
        repo.create(&us).await.unwrap();
        let service = AudienceService::new(repo, contacts);

        let alone = service.compute_audience(&[hollow.id().clone()]).await.unwrap();
        assert_eq!(alone.counts.total_number_of_contacts, 0);
        assert!(alone.counts.per_segment.is_empty());
        assert_eq!(alone.stale_segment_ids, vec![hollow.id().clone()]);

        let mixed = service
            .compute_audience(&[hollow.id().clone(), us.id().clone()])
            .await
            .unwrap();
        assert_eq!(mixed.counts.total_number_of_contacts, 1);
        assert_eq!(mixed.stale_segment_ids, vec![hollow.id().clone()]);
    }

    #[tokio::test]
    async fn test_evaluator_failure_is_atomic() {
        let (service, contacts, us, pro) = fixture().await;
        contacts.fail_after(1);

        let err = service.compute_audience(&[us.clone(), pro.clone()]).await.unwrap_err();
        assert!(matches!(err, AudienceError::AggregationUnavailable(_)));

        let mut audience = CampaignAudience::new();
        audience.attach(us);
        audience.attach(pro);
        let state = service.refresh(&mut audience).await;
        assert!(matches!(state, CountState::Unavailable { .. }));
        assert!(audience.state().report().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_for_send_recomputes() {
        let (service, contacts, us, _) = fixture().await;
        let mut audience = CampaignAudience::new();
        audience.attach(us);
        service.refresh(&mut audience).await;

        contacts.insert(ContactRecord::new("4").with("country", "US").with("email", "d@x.io"));
        let fresh = service.snapshot_for_send(&audience).await.unwrap();

        assert_eq!(audience.state().report().map(|r| r.counts.total_number_of_contacts), Some(2));
        assert_eq!(fresh.counts.total_number_of_contacts, 3);
    }
}
