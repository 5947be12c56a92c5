//! Activity fan-out on content-mutation events.
//!
//! Fan-out-on-write: each event materializes one feed entry per recipient so
//! reads stay cheap. Delivery is fire-and-forget from the producer's point of
//! view; failed batches are logged and counted, never surfaced to the caller
//! that performed the action. Retention is enforced per recipient after every
//! delivery.

use crate::config::FanoutConfig;
use crate::models::{ActionEvent, ActionType, FeedEntry, UserId};
use crate::storage::traits::{ContentCatalog, FeedStore, SocialGraph};
use crate::{Error, Result, current_timestamp, is_retryable_store_error};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::instrument;

/// Batch size for feed-entry inserts.
const INSERT_CHUNK: usize = 256;

/// Outcome of one fan-out delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanoutReport {
    /// Entries written.
    pub delivered: usize,
    /// Entries dropped because their batch failed.
    pub failed: usize,
    /// Old entries pruned to enforce the retention cap.
    pub pruned: usize,
}

/// Materializes feed entries for the audience of an action event.
pub struct ActivityFanout<F: FeedStore, G: SocialGraph, C: ContentCatalog> {
    feed: Arc<F>,
    graph: Arc<G>,
    catalog: Arc<C>,
    retention_cap: usize,
}

impl<F: FeedStore, G: SocialGraph, C: ContentCatalog> ActivityFanout<F, G, C> {
    /// Creates a new fan-out service.
    #[must_use]
    pub const fn new(feed: Arc<F>, graph: Arc<G>, catalog: Arc<C>, retention_cap: usize) -> Self {
        Self {
            feed,
            graph,
            catalog,
            retention_cap,
        }
    }

    /// Delivers an event to its audience and prunes each touched feed.
    ///
    /// Partial failure is tolerated: a failed insert batch is logged and
    /// counted in the report while the remaining batches proceed.
    ///
    /// # Errors
    ///
    /// Returns an error only when audience resolution itself fails; delivery
    /// failures are absorbed into the report.
    #[instrument(
        name = "memefeed.fanout.on_action",
        skip(self, event),
        fields(component = "fanout", operation = "on_action", action = %event.action, actor = %event.actor_id)
    )]
    pub fn on_action(&self, event: &ActionEvent) -> Result<FanoutReport> {
        let audience = self.audience(event)?;
        let now = current_timestamp();

        let entries: Vec<FeedEntry> = audience
            .iter()
            .map(|owner| FeedEntry::from_event(event, owner.clone(), now))
            .collect();

        let mut report = FanoutReport::default();
        for chunk in entries.chunks(INSERT_CHUNK) {
            match self.feed.insert_entries(chunk) {
                Ok(()) => report.delivered += chunk.len(),
                Err(e) => {
                    report.failed += chunk.len();
                    metrics::counter!("feed_fanout_failures_total").increment(chunk.len() as u64);
                    tracing::warn!(action = %event.action, error = %e, lost = chunk.len(), "fan-out batch failed");
                },
            }
        }
        metrics::counter!("feed_fanout_entries_total").increment(report.delivered as u64);

        for owner in &audience {
            match self.feed.prune_owner(owner, self.retention_cap) {
                Ok(removed) => report.pruned += removed,
                Err(e) => {
                    tracing::warn!(owner = %owner, error = %e, "retention prune failed");
                },
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            pruned = report.pruned,
            "fan-out complete"
        );
        Ok(report)
    }

    /// Resolves the recipient set for an event.
    ///
    /// An explicit `affected_users` override skips inference entirely. Create
    /// actions reach the actor's followers, a follow reaches the followed
    /// user, and reactive actions reach the target's owner unless the actor
    /// is reacting to their own content. The actor always receives a copy.
    fn audience(&self, event: &ActionEvent) -> Result<Vec<UserId>> {
        let mut audience: Vec<UserId> = if let Some(users) = &event.affected_users {
            users.clone()
        } else if event.action.is_create() {
            self.graph.followers_of(&event.actor_id)?
        } else if event.action == ActionType::Follow {
            vec![UserId::new(event.target.id.clone())]
        } else {
            match self.owner_of_target(event)? {
                Some(owner) if owner != event.actor_id => vec![owner],
                _ => Vec::new(),
            }
        };
        audience.push(event.actor_id.clone());

        let mut seen: HashSet<UserId> = HashSet::with_capacity(audience.len());
        audience.retain(|u| seen.insert(u.clone()));
        Ok(audience)
    }

    fn owner_of_target(&self, event: &ActionEvent) -> Result<Option<UserId>> {
        let cards = self.catalog.resolve(std::slice::from_ref(&event.target))?;
        Ok(cards.into_iter().next().and_then(|card| card.owner_id))
    }
}

/// Producer handle for the asynchronous fan-out queue.
///
/// `enqueue` never blocks; a full queue is reported as a store error and the
/// event is dropped, keeping the action path latency-bounded.
#[derive(Clone)]
pub struct FanoutQueue {
    tx: mpsc::Sender<ActionEvent>,
}

/// Join handle set for the fan-out worker pool.
pub struct FanoutWorkers {
    handles: Vec<JoinHandle<()>>,
    // Keeps the channel open while the pool exists; with zero workers a full
    // queue must reject as full, not as closed.
    _rx: Arc<Mutex<mpsc::Receiver<ActionEvent>>>,
}

impl FanoutWorkers {
    /// Waits for every worker to drain and exit.
    ///
    /// Workers exit once all [`FanoutQueue`] clones are dropped and the
    /// channel is empty.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "fan-out worker panicked");
            }
        }
    }
}

impl FanoutQueue {
    /// Spawns the worker pool and returns the producer handle.
    ///
    /// Workers pull events off a bounded channel, run the blocking delivery
    /// on the blocking pool, and retry retryable store failures with
    /// exponential backoff.
    #[must_use]
    pub fn spawn<F, G, C>(
        fanout: Arc<ActivityFanout<F, G, C>>,
        config: &FanoutConfig,
    ) -> (Self, FanoutWorkers)
    where
        F: FeedStore + Send + Sync + 'static,
        G: SocialGraph + Send + Sync + 'static,
        C: ContentCatalog + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel::<ActionEvent>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            let fanout = Arc::clone(&fanout);
            let max_retries = config.max_retries;
            let retry_base_ms = config.retry_base_ms;

            handles.push(tokio::spawn(async move {
                loop {
                    let event = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(event) = event else { break };
                    deliver_with_retry(&fanout, event, max_retries, retry_base_ms).await;
                }
                tracing::debug!(worker_id, "fan-out worker exiting");
            }));
        }

        (Self { tx }, FanoutWorkers { handles, _rx: rx })
    }

    /// Enqueues an event for asynchronous delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the queue is full or the workers have
    /// shut down. The caller's action has already committed; the event is
    /// lost, which the queue surfaces in metrics.
    pub fn enqueue(&self, event: ActionEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| {
            metrics::counter!("feed_fanout_queue_rejections_total").increment(1);
            Error::store("fanout_enqueue", e)
        })
    }
}

/// Runs one delivery, retrying retryable store errors with exponential
/// backoff.
async fn deliver_with_retry<F, G, C>(
    fanout: &Arc<ActivityFanout<F, G, C>>,
    event: ActionEvent,
    max_retries: u32,
    retry_base_ms: u64,
) where
    F: FeedStore + Send + Sync + 'static,
    G: SocialGraph + Send + Sync + 'static,
    C: ContentCatalog + Send + Sync + 'static,
{
    let mut attempt = 0;
    loop {
        let fanout = Arc::clone(fanout);
        let attempt_event = event.clone();
        let outcome =
            tokio::task::spawn_blocking(move || fanout.on_action(&attempt_event)).await;

        match outcome {
            Ok(Ok(_)) => return,
            Ok(Err(e)) if is_retryable_store_error(&e) && attempt < max_retries => {
                let backoff = retry_base_ms << attempt;
                attempt += 1;
                tracing::warn!(error = %e, attempt, backoff_ms = backoff, "fan-out delivery failed, retrying");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            },
            Ok(Err(e)) => {
                metrics::counter!("feed_fanout_dropped_events_total").increment(1);
                tracing::error!(error = %e, attempts = attempt + 1, "fan-out delivery dropped");
                return;
            },
            Err(e) => {
                tracing::error!(error = %e, "fan-out delivery task failed");
                return;
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{
        EngagementMetrics, MetricSnapshot, TargetCard, TargetKind, TargetRef,
    };
    use crate::storage::memory::{CatalogItem, InMemoryCatalog, InMemorySocialGraph};
    use crate::storage::sqlite::SqliteStore;

    fn meme_item(id: &str, owner: &str) -> CatalogItem {
        CatalogItem {
            card: TargetCard {
                target: TargetRef::meme(id),
                owner_id: Some(UserId::from(owner)),
                title: None,
                tags: vec![],
                created_at: 100,
                data: None,
            },
            metrics: MetricSnapshot::Meme(EngagementMetrics::default()),
        }
    }

    struct Fixture {
        feed: Arc<SqliteStore>,
        graph: Arc<InMemorySocialGraph>,
        catalog: Arc<InMemoryCatalog>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                feed: Arc::new(SqliteStore::in_memory().unwrap()),
                graph: Arc::new(InMemorySocialGraph::new()),
                catalog: Arc::new(InMemoryCatalog::new()),
            }
        }

        fn fanout(&self, cap: usize) -> ActivityFanout<SqliteStore, InMemorySocialGraph, InMemoryCatalog> {
            ActivityFanout::new(
                Arc::clone(&self.feed),
                Arc::clone(&self.graph),
                Arc::clone(&self.catalog),
                cap,
            )
        }
    }

    #[test]
    fn test_create_reaches_followers_and_actor() {
        let fx = Fixture::new();
        let alice = UserId::from("alice");
        fx.graph.follow(&UserId::from("bob"), &alice);
        fx.graph.follow(&UserId::from("carol"), &alice);

        let event = ActionEvent::new(alice.clone(), ActionType::CreateMeme, TargetRef::meme("m1"));
        let report = fx.fanout(1_000).on_action(&event).unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 0);

        for owner in ["alice", "bob", "carol"] {
            let (entries, total) = fx.feed.entries_for(&UserId::from(owner), 1, 10).unwrap();
            assert_eq!(total, 1, "owner {owner}");
            assert_eq!(entries[0].target, TargetRef::meme("m1"));
            assert_eq!(entries[0].actor_id, alice);
        }
    }

    #[test]
    fn test_reactive_reaches_owner_once() {
        let fx = Fixture::new();
        fx.catalog.insert(meme_item("m1", "alice"));

        let event = ActionEvent::new(
            UserId::from("bob"),
            ActionType::LikeMeme,
            TargetRef::meme("m1"),
        );
        let report = fx.fanout(1_000).on_action(&event).unwrap();
        // owner + actor
        assert_eq!(report.delivered, 2);
        assert_eq!(fx.feed.count_for(&UserId::from("alice")).unwrap(), 1);
        assert_eq!(fx.feed.count_for(&UserId::from("bob")).unwrap(), 1);
    }

    #[test]
    fn test_self_reaction_skips_owner_delivery() {
        let fx = Fixture::new();
        fx.catalog.insert(meme_item("m1", "alice"));

        let event = ActionEvent::new(
            UserId::from("alice"),
            ActionType::LikeMeme,
            TargetRef::meme("m1"),
        );
        let report = fx.fanout(1_000).on_action(&event).unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(fx.feed.count_for(&UserId::from("alice")).unwrap(), 1);
    }

    #[test]
    fn test_follow_reaches_followed_user() {
        let fx = Fixture::new();
        let event = ActionEvent::new(
            UserId::from("bob"),
            ActionType::Follow,
            TargetRef::new(TargetKind::User, "alice"),
        );
        let report = fx.fanout(1_000).on_action(&event).unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(fx.feed.count_for(&UserId::from("alice")).unwrap(), 1);
    }

    #[test]
    fn test_affected_users_override_skips_inference() {
        let fx = Fixture::new();
        fx.graph.follow(&UserId::from("follower"), &UserId::from("alice"));

        let mut event = ActionEvent::new(
            UserId::from("alice"),
            ActionType::CreateMeme,
            TargetRef::meme("m1"),
        );
        event.affected_users = Some(vec![UserId::from("dave")]);

        let report = fx.fanout(1_000).on_action(&event).unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(fx.feed.count_for(&UserId::from("follower")).unwrap(), 0);
        assert_eq!(fx.feed.count_for(&UserId::from("dave")).unwrap(), 1);
    }

    #[test]
    fn test_retention_cap_prunes_oldest() {
        let fx = Fixture::new();
        let fanout = fx.fanout(4);
        let alice = UserId::from("alice");

        let mut pruned = 0;
        for i in 0..10 {
            let event = ActionEvent::new(
                alice.clone(),
                ActionType::CreateMeme,
                TargetRef::meme(&format!("m{i}")),
            );
            pruned += fanout.on_action(&event).unwrap().pruned;
        }
        assert_eq!(pruned, 6);
        assert_eq!(fx.feed.count_for(&alice).unwrap(), 4);

        // the surviving entries are the newest
        let (entries, _) = fx.feed.entries_for(&alice, 1, 10).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.target.id.as_str()).collect();
        assert_eq!(ids, vec!["m9", "m8", "m7", "m6"]);
    }

    #[tokio::test]
    async fn test_queue_delivers_asynchronously() {
        let fx = Fixture::new();
        let fanout = Arc::new(fx.fanout(1_000));
        let config = FanoutConfig {
            queue_capacity: 16,
            workers: 2,
            max_retries: 1,
            retry_base_ms: 1,
        };
        let (queue, workers) = FanoutQueue::spawn(fanout, &config);

        for i in 0..5 {
            let event = ActionEvent::new(
                UserId::from("alice"),
                ActionType::CreateMeme,
                TargetRef::meme(&format!("m{i}")),
            );
            queue.enqueue(event).unwrap();
        }
        drop(queue);
        workers.join().await;

        assert_eq!(fx.feed.count_for(&UserId::from("alice")).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_when_full() {
        let fx = Fixture::new();
        let fanout = Arc::new(fx.fanout(1_000));
        let config = FanoutConfig {
            queue_capacity: 1,
            workers: 0,
            max_retries: 0,
            retry_base_ms: 1,
        };
        let (queue, _workers) = FanoutQueue::spawn(fanout, &config);

        let event = ActionEvent::new(
            UserId::from("alice"),
            ActionType::CreateMeme,
            TargetRef::meme("m1"),
        );
        queue.enqueue(event.clone()).unwrap();
        assert!(queue.enqueue(event).is_err());
    }
}
