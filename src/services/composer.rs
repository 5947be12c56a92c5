//! Feed composition.
//!
//! Blends three sources into one read-time feed window: content from followed
//! creators, content matching the viewer's interest tags, and the trending
//! snapshot as filler. Composition never writes; it reads the score store and
//! the content collaborators and assembles a page.

use crate::config::ComposerConfig;
use crate::models::{
    FeedAlgorithm, FeedItem, FeedPage, FeedSource, Pagination, ScoreRecord, TargetCard,
    TargetKind, TargetRef, TrendingPeriod, UserId,
};
use crate::storage::traits::{ContentCatalog, ScoreStore, SocialGraph};
use crate::{Error, Result, current_timestamp};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Feed pagination period for trending-sourced content.
const COMPOSE_PERIOD: TrendingPeriod = TrendingPeriod::Day;

/// Deepest addressable page; bounds the compose window at
/// `MAX_PAGE * limit` items.
const MAX_PAGE: usize = 10_000;

/// A validated feed request.
#[derive(Debug, Clone, Copy)]
pub struct FeedQuery {
    /// 1-based page number.
    pub page: usize,
    /// Items per page.
    pub limit: usize,
    /// Blending algorithm.
    pub algorithm: FeedAlgorithm,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            algorithm: FeedAlgorithm::default(),
        }
    }
}

impl FeedQuery {
    /// Checks pagination bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a page outside `[1, 10000]` or a
    /// limit outside `[1, 100]`.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 || self.page > MAX_PAGE {
            return Err(Error::validation("page", "must be between 1 and 10000"));
        }
        if self.limit == 0 || self.limit > 100 {
            return Err(Error::validation("limit", "must be between 1 and 100"));
        }
        Ok(())
    }

    const fn window(&self) -> usize {
        self.page.saturating_mul(self.limit)
    }

    const fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// A composed card before viewer flags are attached.
struct Sourced {
    card: TargetCard,
    source: FeedSource,
}

/// Read-time feed assembly over the score store and content collaborators.
pub struct FeedComposer<S: ScoreStore, C: ContentCatalog, G: SocialGraph> {
    scores: Arc<S>,
    catalog: Arc<C>,
    graph: Arc<G>,
    config: ComposerConfig,
    shuffle_seed: Option<u64>,
}

impl<S: ScoreStore, C: ContentCatalog, G: SocialGraph> FeedComposer<S, C, G> {
    /// Creates a new composer.
    #[must_use]
    pub const fn new(scores: Arc<S>, catalog: Arc<C>, graph: Arc<G>, config: ComposerConfig) -> Self {
        Self {
            scores,
            catalog,
            graph,
            config,
            shuffle_seed: None,
        }
    }

    /// Pins the shuffle to a fixed seed. Test hook.
    #[must_use]
    pub const fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Composes a feed page.
    ///
    /// `viewer = None` serves the anonymous feed; with a viewer the page is
    /// personalized and blended per the configured source shares.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for out-of-range pagination, or a store
    /// error if the score store fails. Collaborator failures on the
    /// personalization path degrade to trending fill instead of erroring.
    #[instrument(
        name = "memefeed.feed.compose",
        skip(self),
        fields(component = "composer", operation = "compose", algorithm = %query.algorithm)
    )]
    pub fn compose(&self, viewer: Option<&UserId>, query: &FeedQuery) -> Result<FeedPage> {
        query.validate()?;
        let started = std::time::Instant::now();
        metrics::counter!(
            "feed_compose_total",
            "algorithm" => query.algorithm.as_str(),
            "personalized" => if viewer.is_some() { "true" } else { "false" }
        )
        .increment(1);

        let page = match viewer {
            None => self.compose_anonymous(query),
            Some(viewer) => self.compose_personalized(viewer, query),
        };
        metrics::histogram!("feed_compose_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1_000.0);
        page
    }

    /// Anonymous feed: global recency or the trending snapshot, no viewer
    /// flags to resolve.
    fn compose_anonymous(&self, query: &FeedQuery) -> Result<FeedPage> {
        if query.algorithm == FeedAlgorithm::Chronological {
            let (cards, total) = self
                .catalog
                .recent(TargetKind::Meme, query.limit, query.offset())?;
            let items = cards
                .into_iter()
                .map(|card| FeedItem {
                    card,
                    source: FeedSource::Trending,
                    is_liked: false,
                    is_following: false,
                })
                .collect();
            return Ok(FeedPage {
                items,
                pagination: Pagination::new(query.page, query.limit, total),
            });
        }

        let now = current_timestamp();
        let records = self
            .scores
            .ranked(Some(TargetKind::Meme), COMPOSE_PERIOD, query.window(), now)?;
        let mut cards = self.resolve_ordered(&records)?;
        if query.algorithm == FeedAlgorithm::Mixed {
            self.shuffle(&mut cards);
        }

        let total = *self
            .scores
            .count_by_kind(COMPOSE_PERIOD, now)?
            .get(&TargetKind::Meme)
            .unwrap_or(&0) as u64;
        let items = cards
            .into_iter()
            .skip(query.offset())
            .take(query.limit)
            .map(|card| FeedItem {
                card,
                source: FeedSource::Trending,
                is_liked: false,
                is_following: false,
            })
            .collect();
        Ok(FeedPage {
            items,
            pagination: Pagination::new(query.page, query.limit, total),
        })
    }

    /// Personalized feed: following quota, then interest quota, then trending
    /// fill, deduplicated incrementally.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn compose_personalized(&self, viewer: &UserId, query: &FeedQuery) -> Result<FeedPage> {
        let window = query.window();
        let following_quota = (window as f64 * self.config.following_share).round() as usize;
        let interest_quota = (window as f64 * self.config.interest_share).round() as usize;

        let following: Vec<UserId> = match self.graph.following_of(viewer) {
            Ok(following) => following,
            Err(e) => {
                tracing::warn!(viewer = %viewer, error = %e, "follow graph unavailable, degrading to trending");
                Vec::new()
            },
        };
        let interests: Vec<String> = match self.catalog.interests_of(viewer) {
            Ok(interests) => interests,
            Err(e) => {
                tracing::warn!(viewer = %viewer, error = %e, "interest tags unavailable, degrading to trending");
                Vec::new()
            },
        };
        let following_set: HashSet<&UserId> = following.iter().collect();

        let mut seen: HashSet<TargetRef> = HashSet::new();
        let mut composed: Vec<Sourced> = Vec::with_capacity(window);

        if !following.is_empty() {
            let cards = self.catalog.recent_by_authors(&following, following_quota)?;
            for card in cards {
                if composed.len() >= following_quota {
                    break;
                }
                if seen.insert(card.target.clone()) {
                    composed.push(Sourced {
                        card,
                        source: FeedSource::Following,
                    });
                }
            }
        }

        if !interests.is_empty() {
            // Over-fetch to survive the dedup and ownership filters.
            let cards = self
                .catalog
                .recent_matching_tags(&interests, interest_quota + window)?;
            let mut taken = 0;
            for card in cards {
                if taken >= interest_quota {
                    break;
                }
                // Followed creators belong to the following source; the
                // viewer's own posts never resurface through interests.
                let owner = card.owner_id.as_ref();
                if owner == Some(viewer) || owner.is_some_and(|o| following_set.contains(o)) {
                    continue;
                }
                if seen.insert(card.target.clone()) {
                    composed.push(Sourced {
                        card,
                        source: FeedSource::Interest,
                    });
                    taken += 1;
                }
            }
        }

        if composed.len() < window {
            let now = current_timestamp();
            let records = self.scores.ranked(
                Some(TargetKind::Meme),
                COMPOSE_PERIOD,
                window + seen.len(),
                now,
            )?;
            for card in self.resolve_ordered(&records)? {
                if composed.len() >= window {
                    break;
                }
                if seen.insert(card.target.clone()) {
                    composed.push(Sourced {
                        card,
                        source: FeedSource::Trending,
                    });
                }
            }
        }

        match query.algorithm {
            FeedAlgorithm::Chronological => {
                composed.sort_by(|a, b| {
                    b.card
                        .created_at
                        .cmp(&a.card.created_at)
                        .then_with(|| a.card.target.id.cmp(&b.card.target.id))
                });
            },
            FeedAlgorithm::Mixed => self.shuffle(&mut composed),
            FeedAlgorithm::Popular => {},
        }

        // The composed window is the universe the viewer can page through;
        // totals refer to it rather than the whole platform inventory.
        let total = composed.len() as u64;
        let page: Vec<Sourced> = composed
            .into_iter()
            .skip(query.offset())
            .take(query.limit)
            .collect();
        let items = self.attach_flags(viewer, page)?;

        Ok(FeedPage {
            items,
            pagination: Pagination::new(query.page, query.limit, total),
        })
    }

    /// Resolves ranked records against the catalog, preserving rank order and
    /// dropping targets that no longer resolve.
    fn resolve_ordered(&self, records: &[ScoreRecord]) -> Result<Vec<TargetCard>> {
        let refs: Vec<TargetRef> = records.iter().map(ScoreRecord::target).collect();
        self.catalog.resolve(&refs)
    }

    /// Batched viewer-flag resolution for one page of items.
    fn attach_flags(&self, viewer: &UserId, page: Vec<Sourced>) -> Result<Vec<FeedItem>> {
        let refs: Vec<TargetRef> = page.iter().map(|s| s.card.target.clone()).collect();
        let owners: Vec<UserId> = page
            .iter()
            .filter_map(|s| s.card.owner_id.clone())
            .collect();

        let liked = self.catalog.liked_among(viewer, &refs)?;
        let followed = self.graph.following_among(viewer, &owners)?;

        Ok(page
            .into_iter()
            .map(|s| {
                let is_liked = liked.contains(&s.card.target);
                let is_following = s
                    .card
                    .owner_id
                    .as_ref()
                    .is_some_and(|owner| followed.contains(owner));
                FeedItem {
                    card: s.card,
                    source: s.source,
                    is_liked,
                    is_following,
                }
            })
            .collect())
    }

    /// Fisher-Yates shuffle, seeded when a test pinned the seed.
    fn shuffle<T>(&self, items: &mut [T]) {
        let mut rng = self
            .shuffle_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        items.shuffle(&mut rng);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{EngagementMetrics, MetricSnapshot};
    use crate::storage::memory::{CatalogItem, InMemoryCatalog, InMemorySocialGraph};
    use crate::storage::sqlite::SqliteStore;

    fn meme_item(id: &str, owner: &str, tags: &[&str], created_at: u64) -> CatalogItem {
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
                likes: 1,
                created_at,
                ..Default::default()
            }),
        }
    }

    fn trending_record(id: &str, rank: u32, now: u64) -> ScoreRecord {
        ScoreRecord {
            kind: TargetKind::Meme,
            target_id: id.to_string(),
            period: COMPOSE_PERIOD,
            score: 1_000.0 / f64::from(rank),
            rank,
            data: None,
            computed_at: now,
            expires_at: now + 86_400,
        }
    }

    struct Fixture {
        scores: Arc<SqliteStore>,
        catalog: Arc<InMemoryCatalog>,
        graph: Arc<InMemorySocialGraph>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scores: Arc::new(SqliteStore::in_memory().unwrap()),
                catalog: Arc::new(InMemoryCatalog::new()),
                graph: Arc::new(InMemorySocialGraph::new()),
            }
        }

        fn composer(&self) -> FeedComposer<SqliteStore, InMemoryCatalog, InMemorySocialGraph> {
            FeedComposer::new(
                Arc::clone(&self.scores),
                Arc::clone(&self.catalog),
                Arc::clone(&self.graph),
                ComposerConfig::default(),
            )
            .with_shuffle_seed(7)
        }
    }

    /// 3 followed creators with 10 memes each, 5 interest matches, and a deep
    /// trending pool.
    fn blended_fixture(now: u64) -> Fixture {
        let fx = Fixture::new();
        let viewer = UserId::from("viewer");

        for (c, creator) in ["alice", "bob", "carol"].iter().enumerate() {
            fx.graph.follow(&viewer, &UserId::from(*creator));
            for i in 0..10 {
                let id = format!("f-{creator}-{i}");
                fx.catalog
                    .insert(meme_item(&id, creator, &[], now - (c * 10 + i) as u64));
            }
        }

        fx.catalog.set_interests(&viewer, vec!["cats".to_string()]);
        for i in 0..5 {
            let id = format!("i-{i}");
            fx.catalog
                .insert(meme_item(&id, "stranger", &["cats"], now - 100 - i));
        }

        let mut records = Vec::new();
        for i in 0..40_u32 {
            let id = format!("t-{i}");
            fx.catalog
                .insert(meme_item(&id, "somebody", &[], now - 200 - u64::from(i)));
            records.push(trending_record(&id, i + 1, now));
        }
        fx.scores.upsert_scores(&records).unwrap();
        fx
    }

    #[test]
    fn test_blended_page_respects_source_quotas() {
        let now = current_timestamp();
        let fx = blended_fixture(now);
        let composer = fx.composer();

        let query = FeedQuery {
            page: 1,
            limit: 20,
            algorithm: FeedAlgorithm::Mixed,
        };
        let page = composer.compose(Some(&UserId::from("viewer")), &query).unwrap();
        assert_eq!(page.items.len(), 20);

        let by_source = |source: FeedSource| {
            page.items.iter().filter(|i| i.source == source).count()
        };
        // window 20: following quota 12, interest quota 6, rest trending
        assert_eq!(by_source(FeedSource::Following), 12);
        assert_eq!(by_source(FeedSource::Interest), 5);
        assert_eq!(by_source(FeedSource::Trending), 3);

        // no duplicate targets across sources
        let distinct: HashSet<&TargetRef> = page.items.iter().map(|i| &i.card.target).collect();
        assert_eq!(distinct.len(), 20);
    }

    #[test]
    fn test_own_content_never_surfaces_via_interests() {
        let now = current_timestamp();
        let fx = Fixture::new();
        let viewer = UserId::from("viewer");
        fx.catalog.set_interests(&viewer, vec!["cats".to_string()]);
        fx.catalog.insert(meme_item("mine", "viewer", &["cats"], now));
        fx.catalog.insert(meme_item("theirs", "other", &["cats"], now - 1));

        let page = fx
            .composer()
            .compose(Some(&viewer), &FeedQuery::default())
            .unwrap();
        assert!(page.items.iter().all(|i| i.card.target.id != "mine"));
        assert!(page.items.iter().any(|i| i.card.target.id == "theirs"));
    }

    #[test]
    fn test_followed_creators_not_double_counted_as_interest() {
        let now = current_timestamp();
        let fx = Fixture::new();
        let viewer = UserId::from("viewer");
        fx.graph.follow(&viewer, &UserId::from("alice"));
        fx.catalog.set_interests(&viewer, vec!["cats".to_string()]);
        fx.catalog.insert(meme_item("m-alice", "alice", &["cats"], now));

        let page = fx
            .composer()
            .compose(Some(&viewer), &FeedQuery::default())
            .unwrap();
        let item = page
            .items
            .iter()
            .find(|i| i.card.target.id == "m-alice")
            .unwrap();
        assert_eq!(item.source, FeedSource::Following);
    }

    #[test]
    fn test_no_graph_degrades_to_trending() {
        let now = current_timestamp();
        let fx = Fixture::new();
        for i in 0..5_u32 {
            let id = format!("t-{i}");
            fx.catalog.insert(meme_item(&id, "somebody", &[], now));
            fx.scores
                .upsert_scores(&[trending_record(&id, i + 1, now)])
                .unwrap();
        }

        let query = FeedQuery {
            algorithm: FeedAlgorithm::Popular,
            ..FeedQuery::default()
        };
        let page = fx
            .composer()
            .compose(Some(&UserId::from("nobody")), &query)
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert!(page.items.iter().all(|i| i.source == FeedSource::Trending));
    }

    #[test]
    fn test_anonymous_chronological_reports_inventory_total() {
        let now = current_timestamp();
        let fx = Fixture::new();
        for i in 0..30_u64 {
            fx.catalog
                .insert(meme_item(&format!("m-{i}"), "somebody", &[], now - i));
        }

        let query = FeedQuery {
            page: 2,
            limit: 10,
            algorithm: FeedAlgorithm::Chronological,
        };
        let page = fx.composer().compose(None, &query).unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.pagination.total, 30);
        assert_eq!(page.items[0].card.target.id, "m-10");
    }

    #[test]
    fn test_viewer_flags_are_set() {
        let now = current_timestamp();
        let fx = Fixture::new();
        let viewer = UserId::from("viewer");
        fx.graph.follow(&viewer, &UserId::from("alice"));
        fx.catalog.insert(meme_item("m1", "alice", &[], now));
        fx.catalog.like(&viewer, &TargetRef::meme("m1"));

        let page = fx
            .composer()
            .compose(Some(&viewer), &FeedQuery::default())
            .unwrap();
        let item = page.items.iter().find(|i| i.card.target.id == "m1").unwrap();
        assert!(item.is_liked);
        assert!(item.is_following);
    }

    #[test]
    fn test_seeded_shuffle_is_deterministic() {
        let now = current_timestamp();
        let fx = blended_fixture(now);
        let query = FeedQuery {
            page: 1,
            limit: 20,
            algorithm: FeedAlgorithm::Mixed,
        };
        let viewer = UserId::from("viewer");

        let first = fx.composer().compose(Some(&viewer), &query).unwrap();
        let second = fx.composer().compose(Some(&viewer), &query).unwrap();
        let ids = |p: &FeedPage| -> Vec<String> {
            p.items.iter().map(|i| i.card.target.id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_rejects_invalid_pagination() {
        let fx = Fixture::new();
        let composer = fx.composer();
        let bad_page = FeedQuery {
            page: 0,
            ..FeedQuery::default()
        };
        let bad_limit = FeedQuery {
            limit: 101,
            ..FeedQuery::default()
        };
        assert!(composer.compose(None, &bad_page).is_err());
        assert!(composer.compose(None, &bad_limit).is_err());
    }

    #[test]
    fn test_rejects_excessive_page_depth() {
        let fx = Fixture::new();
        let composer = fx.composer();
        // Deep pages are a validation error, never overflow in the window math
        let deep = FeedQuery {
            page: usize::MAX / 10,
            limit: 20,
            algorithm: FeedAlgorithm::Popular,
        };
        let err = composer.compose(None, &deep).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "page"));

        let deepest_valid = FeedQuery {
            page: 10_000,
            limit: 100,
            algorithm: FeedAlgorithm::Popular,
        };
        assert!(composer.compose(None, &deepest_valid).is_ok());
    }
}
