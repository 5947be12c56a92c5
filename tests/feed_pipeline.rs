//! End-to-end pipeline tests: fan-out, trending refresh, feed composition,
//! and notification collapse against one SQLite database.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::too_many_lines)]

use memefeed::config::{ComposerConfig, FanoutConfig, TrendingConfig};
use memefeed::models::{
    ActionEvent, ActionType, EmitRequest, EngagementMetrics, FeedAlgorithm, FeedSource,
    MetricSnapshot, NotificationKind, TargetCard, TargetKind, TargetRef, TrendingPeriod, UserId,
};
use memefeed::services::{
    ActivityFanout, FanoutQueue, FeedComposer, FeedQuery, NotificationService, TrendingService,
};
use memefeed::storage::memory::{CatalogItem, InMemoryCatalog, InMemorySocialGraph};
use memefeed::storage::sqlite::SqliteStore;
use memefeed::storage::traits::FeedStore;
use memefeed::{current_timestamp, gc};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn meme_item(id: &str, owner: &str, tags: &[&str], likes: u64, created_at: u64) -> CatalogItem {
    CatalogItem {
        card: TargetCard {
            target: TargetRef::meme(id),
            owner_id: Some(UserId::from(owner)),
            title: Some(id.to_string()),
            tags: tags.iter().map(ToString::to_string).collect(),
            created_at,
            data: None,
        },
        metrics: MetricSnapshot::Meme(EngagementMetrics {
            likes,
            views: likes * 10,
            created_at,
            ..Default::default()
        }),
    }
}

struct Platform {
    store: Arc<SqliteStore>,
    catalog: Arc<InMemoryCatalog>,
    graph: Arc<InMemorySocialGraph>,
    _dir: tempfile::TempDir,
}

impl Platform {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(SqliteStore::new(dir.path().join("feed.db")).expect("store"));
        Self {
            store,
            catalog: Arc::new(InMemoryCatalog::new()),
            graph: Arc::new(InMemorySocialGraph::new()),
            _dir: dir,
        }
    }
}

#[test]
fn test_fanout_refresh_compose_pipeline() {
    let platform = Platform::new();
    let now = current_timestamp();
    let viewer = UserId::from("viewer");

    // viewer follows alice; alice publishes, bob is a stranger with a hit meme
    platform.graph.follow(&viewer, &UserId::from("alice"));
    platform
        .catalog
        .insert(meme_item("m-alice", "alice", &[], 5, now - 60));
    platform
        .catalog
        .insert(meme_item("m-viral", "bob", &[], 900, now - 120));
    platform.catalog.set_interests(&viewer, vec!["cats".to_string()]);
    platform
        .catalog
        .insert(meme_item("m-cats", "carol", &["cats"], 3, now - 30));

    // fan out alice's publish
    let fanout = ActivityFanout::new(
        Arc::clone(&platform.store),
        Arc::clone(&platform.graph),
        Arc::clone(&platform.catalog),
        1_000,
    );
    let event = ActionEvent::new(
        UserId::from("alice"),
        ActionType::CreateMeme,
        TargetRef::meme("m-alice"),
    );
    let report = fanout.on_action(&event).expect("fanout");
    assert_eq!(report.delivered, 2); // viewer + alice herself

    let (entries, total) = platform.store.entries_for(&viewer, 1, 10).expect("entries");
    assert_eq!(total, 1);
    assert_eq!(entries[0].actor_id, UserId::from("alice"));

    // refresh the daily snapshot and compose the viewer's feed
    let trending = TrendingService::new(
        Arc::clone(&platform.store),
        Arc::clone(&platform.catalog),
        TrendingConfig::default(),
    );
    let cancel = AtomicBool::new(false);
    trending
        .refresh(TrendingPeriod::Day, false, &cancel)
        .expect("refresh");

    let composer = FeedComposer::new(
        Arc::clone(&platform.store),
        Arc::clone(&platform.catalog),
        Arc::clone(&platform.graph),
        ComposerConfig::default(),
    )
    .with_shuffle_seed(1);
    let page = composer
        .compose(
            Some(&viewer),
            &FeedQuery {
                page: 1,
                limit: 20,
                algorithm: FeedAlgorithm::Mixed,
            },
        )
        .expect("compose");

    let find = |id: &str| page.items.iter().find(|i| i.card.target.id == id);
    let alice_item = find("m-alice").expect("followed content present");
    assert_eq!(alice_item.source, FeedSource::Following);
    assert!(alice_item.is_following);

    let cats_item = find("m-cats").expect("interest content present");
    assert_eq!(cats_item.source, FeedSource::Interest);

    let viral_item = find("m-viral").expect("trending content present");
    assert_eq!(viral_item.source, FeedSource::Trending);

    // page is deduplicated
    let ids: Vec<&str> = page.items.iter().map(|i| i.card.target.id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
}

#[test]
fn test_queue_drains_before_shutdown() {
    let platform = Platform::new();
    let fanout = Arc::new(ActivityFanout::new(
        Arc::clone(&platform.store),
        Arc::clone(&platform.graph),
        Arc::clone(&platform.catalog),
        1_000,
    ));

    tokio_test::block_on(async {
        let config = FanoutConfig {
            queue_capacity: 64,
            workers: 3,
            max_retries: 2,
            retry_base_ms: 1,
        };
        let (queue, workers) = FanoutQueue::spawn(fanout, &config);
        for i in 0..20 {
            queue
                .enqueue(ActionEvent::new(
                    UserId::from("alice"),
                    ActionType::CreateMeme,
                    TargetRef::meme(&format!("m{i}")),
                ))
                .expect("enqueue");
        }
        drop(queue);
        workers.join().await;
    });

    assert_eq!(
        platform
            .store
            .count_for(&UserId::from("alice"))
            .expect("count"),
        20
    );
}

#[test]
fn test_retention_survives_event_flood() {
    let platform = Platform::new();
    let fanout = ActivityFanout::new(
        Arc::clone(&platform.store),
        Arc::clone(&platform.graph),
        Arc::clone(&platform.catalog),
        50,
    );

    for i in 0..120 {
        fanout
            .on_action(&ActionEvent::new(
                UserId::from("alice"),
                ActionType::CreateMeme,
                TargetRef::meme(&format!("m{i}")),
            ))
            .expect("fanout");
    }

    let alice = UserId::from("alice");
    assert_eq!(platform.store.count_for(&alice).expect("count"), 50);
    let (entries, _) = platform.store.entries_for(&alice, 1, 1).expect("entries");
    assert_eq!(entries[0].target.id, "m119");
}

#[test]
fn test_notification_collapse_and_gc() {
    let platform = Platform::new();
    let notifications = NotificationService::new(Arc::clone(&platform.store), 3_600);
    let owner = UserId::from("alice");

    let like = |actor: &str| EmitRequest {
        owner_id: owner.clone(),
        kind: NotificationKind::Like,
        actor_id: Some(UserId::from(actor)),
        target: Some(TargetRef::meme("m1")),
        title: None,
        message: format!("{actor} liked your meme"),
        data: None,
        expires_at: None,
    };

    // a burst from one actor collapses, a second actor does not
    let first = notifications.emit(like("bob")).expect("emit");
    let burst = notifications.emit(like("bob")).expect("emit");
    let other = notifications.emit(like("carol")).expect("emit");
    assert!(burst.collapsed);
    assert_eq!(burst.id, first.id);
    assert!(!other.collapsed);

    assert_eq!(notifications.unread_count(&owner).expect("count"), 2);
    notifications.mark_read(&owner, None).expect("mark");
    assert_eq!(notifications.unread_count(&owner).expect("count"), 0);

    // an already-expired system notice is hidden from lists, then GC'd
    notifications
        .emit(EmitRequest {
            owner_id: owner.clone(),
            kind: NotificationKind::System,
            actor_id: None,
            target: None,
            title: Some("maintenance".to_string()),
            message: "done".to_string(),
            data: None,
            expires_at: Some(current_timestamp().saturating_sub(10)),
        })
        .expect("emit");
    let (_, total) = notifications.list(&owner, false, 1, 10).expect("list");
    assert_eq!(total, 2);

    let swept = gc::run(platform.store.as_ref(), platform.store.as_ref(), false).expect("gc");
    assert_eq!(swept.expired_notifications, 1);
}

#[test]
fn test_forced_refresh_leaves_no_stale_rows() {
    let platform = Platform::new();
    let now = current_timestamp();
    for i in 0..10_u64 {
        platform
            .catalog
            .insert(meme_item(&format!("m{i}"), "alice", &[], i + 1, now - 60));
    }

    let trending = TrendingService::new(
        Arc::clone(&platform.store),
        Arc::clone(&platform.catalog),
        TrendingConfig::default(),
    );
    let cancel = AtomicBool::new(false);
    trending
        .refresh(TrendingPeriod::Day, true, &cancel)
        .expect("refresh");
    trending
        .refresh(TrendingPeriod::Day, true, &cancel)
        .expect("refresh");

    // nothing superseded left behind for GC after back-to-back forced runs
    let dry = gc::run(platform.store.as_ref(), platform.store.as_ref(), true).expect("gc");
    assert_eq!(dry.stale_generations, 0);

    let page = trending
        .query(Some(TargetKind::Meme), TrendingPeriod::Day, 100)
        .expect("query");
    assert_eq!(page.items.len(), 10);
    let ranks: Vec<u32> = page.items.iter().map(|i| i.rank).collect();
    assert_eq!(ranks, (1..=10).collect::<Vec<u32>>());
    assert_eq!(page.items[0].card.target.id, "m9");
}
