//! End-to-end behaviour through the public API with in-memory adapters

use std::sync::Arc;

use outreach_audience::application::dto::CreateSegmentCommand;
use outreach_audience::infrastructure::{
    InMemoryContactStore, InMemoryDuplicateStore, InMemoryEventLog, InMemoryIdentityKeyStore,
    InMemorySegmentRepository,
};
use outreach_audience::{
    AudienceError, AudienceService, AudienceUseCases, CompanyId, ContactRecord, DuplicatePair,
    DuplicateQueueSession, EntityId, FilterGroup, FinalizeOutcome, IdentityKeyService, IdentityKeyStore,
    IdentityKeyUseCases, KeySlot, ResolutionChoice, SegmentService, SegmentUseCases, Selection, SlotState,
};

struct World {
    contacts: Arc<InMemoryContactStore>,
    segments: SegmentService,
    audience: AudienceService,
    identity: IdentityKeyService,
    identity_store: Arc<InMemoryIdentityKeyStore>,
    duplicates: Arc<InMemoryDuplicateStore>,
    events: Arc<InMemoryEventLog>,
}

impl World {
    fn new(contacts: Vec<ContactRecord>) -> Self {
        let contacts = Arc::new(InMemoryContactStore::new(contacts));
        let repo = Arc::new(InMemorySegmentRepository::new());
        let identity_store = Arc::new(InMemoryIdentityKeyStore::new(contacts.clone()));
        let duplicates = Arc::new(InMemoryDuplicateStore::new());
        let events = Arc::new(InMemoryEventLog::new());

        Self {
            segments: SegmentService::new(repo.clone(), contacts.clone(), contacts.clone(), events.clone()),
            audience: AudienceService::new(repo, contacts.clone()),
            identity: IdentityKeyService::new(
                CompanyId::new("acme"),
                identity_store.clone(),
                duplicates.clone(),
                events.clone(),
            ),
            contacts,
            identity_store,
            duplicates,
            events,
        }
    }

    fn queue(&self, page_size: u32) -> DuplicateQueueSession {
        DuplicateQueueSession::new(self.duplicates.clone(), self.events.clone(), page_size)
    }

    async fn segment(&self, name: &str, field: &str, value: &str) -> EntityId {
        self.segments
            .create_segment(CreateSegmentCommand {
                name: name.into(),
                filters: vec![FilterGroup::new(field, [value])],
            })
            .await
            .unwrap()
            .id()
            .clone()
    }
}

/// 100 US contacts, 40 pro contacts, 15 of them in both
fn us_and_pro() -> Vec<ContactRecord> {
    let mut contacts = Vec::new();
    for i in 0..85 {
        contacts.push(
            ContactRecord::new(format!("us-{}", i))
                .with("country", "US")
                .with("plan", "free")
                .with("email", format!("us{}@example.com", i)),
        );
    }
    for i in 0..15 {
        contacts.push(
            ContactRecord::new(format!("both-{}", i))
                .with("country", "US")
                .with("plan", "pro")
                .with("email", format!("both{}@example.com", i)),
        );
    }
    for i in 0..25 {
        contacts.push(
            ContactRecord::new(format!("pro-{}", i))
                .with("country", "DE")
                .with("plan", "pro")
                .with("email", format!("pro{}@example.com", i)),
        );
    }
    contacts
}

#[tokio::test]
async fn scenario_total_is_deduplicated_union() {
    let world = World::new(us_and_pro());
    let us = world.segment("US", "country", "US").await;
    let pro = world.segment("Pro", "plan", "pro").await;

    let report = world.audience.compute_audience(&[us.clone(), pro.clone()]).await.unwrap();

    let per: Vec<(EntityId, u64)> = report
        .counts
        .per_segment
        .iter()
        .map(|s| (s.segment_id.clone(), s.contact_count))
        .collect();
    assert_eq!(per, vec![(us, 100), (pro, 40)]);
    assert_eq!(report.counts.total_number_of_contacts, 125);
    assert_eq!(report.overlap(), 15);
}

#[tokio::test]
async fn union_never_exceeds_sum_and_subtracts_overlap() {
    let world = World::new(us_and_pro());
    let us = world.segment("US", "country", "US").await;
    let de = world.segment("DE", "country", "DE").await;

    let report = world.audience.compute_audience(&[us, de]).await.unwrap();
    let sum: u64 = report.counts.per_segment.iter().map(|s| s.contact_count).sum();
    assert_eq!(report.counts.total_number_of_contacts, sum);
    assert_eq!(report.overlap(), 0);
}

#[tokio::test]
async fn empty_selection_is_rejected_without_persisting() {
    let world = World::new(vec![]);
    let selection = Selection::new().check("country", "US").deselect("country");

    let err = CreateSegmentCommand::from_selection("Nobody", &selection).unwrap_err();
    assert_eq!(AudienceError::from(err), AudienceError::EmptySegment);

    let err = world
        .segments
        .create_segment(CreateSegmentCommand { name: "Nobody".into(), filters: vec![] })
        .await
        .unwrap_err();
    assert_eq!(err, AudienceError::EmptySegment);
    assert!(world.segments.list_segments().await.unwrap().is_empty());
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let world = World::new(us_and_pro());
    world.identity.set_primary_key("email").await.unwrap();
    world.identity.set_email_key("email").await.unwrap();

    assert!(matches!(world.identity.finalize().await.unwrap(), FinalizeOutcome::Finalized { .. }));
    let after_first = world.identity_store.load(&CompanyId::new("acme")).await.unwrap();

    assert_eq!(world.identity.finalize().await.unwrap(), FinalizeOutcome::AlreadyFinalized);
    let after_second = world.identity_store.load(&CompanyId::new("acme")).await.unwrap();
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn one_pending_revert_per_slot() {
    let world = World::new(vec![]);
    world.identity.set_primary_key("customer_id").await.unwrap();
    world.identity.set_email_key("email").await.unwrap();
    world.identity.finalize().await.unwrap();

    world.identity.request_revert(KeySlot::Filters).await.unwrap();
    assert_eq!(
        world.identity.request_revert(KeySlot::Filters).await,
        Err(AudienceError::DuplicateRevertRequest { slot: KeySlot::Filters })
    );
    assert!(world.identity.request_revert(KeySlot::PrimaryKey).await.is_ok());

    let view = world.identity.get_config().await.unwrap();
    let pending = view.slots.iter().filter(|s| s.state == SlotState::RevertPending).count();
    assert_eq!(pending, 2);
}

#[tokio::test]
async fn locked_key_reopens_only_after_approval() {
    let world = World::new(vec![]);
    world.identity.set_primary_key("customer_id").await.unwrap();
    world.identity.set_email_key("email").await.unwrap();
    world.identity.finalize().await.unwrap();

    assert_eq!(
        world.identity.set_primary_key("external_id").await,
        Err(AudienceError::KeyLocked { slot: KeySlot::PrimaryKey })
    );

    world.identity.request_revert(KeySlot::PrimaryKey).await.unwrap();
    assert_eq!(
        world.identity.set_primary_key("external_id").await,
        Err(AudienceError::KeyLocked { slot: KeySlot::PrimaryKey })
    );

    world
        .identity_store
        .approve_revert(&CompanyId::new("acme"), KeySlot::PrimaryKey)
        .unwrap();
    assert_eq!(world.identity.set_primary_key("external_id").await, Ok(SlotState::Configured));
    assert_eq!(
        world.identity.set_email_key("work_email").await,
        Err(AudienceError::KeyLocked { slot: KeySlot::EmailKey })
    );
}

#[tokio::test]
async fn resolving_a_pair_shrinks_the_queue() {
    let world = World::new(vec![]);
    world.duplicates.seed(
        (1..=5)
            .map(|i| {
                DuplicatePair::new(
                    format!("p{}", i),
                    ContactRecord::new(format!("old-{}", i)),
                    ContactRecord::new(format!("new-{}", i)),
                )
            })
            .collect(),
    );

    let mut queue = world.queue(20);
    queue.refresh().await.unwrap();
    assert_eq!(queue.queue().total_remaining(), 5);

    queue.resolve_one(0, ResolutionChoice::Old).await.unwrap();
    assert_eq!(queue.queue().total_remaining(), 4);
    assert!(queue.queue().items().iter().all(|p| p.id.as_str() != "p1"));
    assert!(world.events.event_types().contains(&"duplicate.pair_resolved"));
}

#[tokio::test]
async fn configured_primary_key_dedups_audience() {
    let world = World::new(vec![
        ContactRecord::new("1").with("customer_id", "A").with("country", "US").with("email", "a@x.io"),
        ContactRecord::new("2").with("customer_id", "A").with("country", "US").with("email", "a@x.io"),
        ContactRecord::new("3").with("customer_id", "B").with("country", "US").with("email", "b@x.io"),
    ]);
    let us = world.segment("US", "country", "US").await;

    let before = world.audience.compute_audience(&[us.clone()]).await.unwrap();
    assert_eq!(before.counts.total_number_of_contacts, 3);

    world.identity.set_primary_key("customer_id").await.unwrap();
    let after = world.audience.compute_audience(&[us]).await.unwrap();
    assert_eq!(after.counts.total_number_of_contacts, 2);
    assert_eq!(world.contacts.contacts().len(), 3);
}
