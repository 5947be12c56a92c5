//! In-memory collaborator implementations.
//!
//! Fast, non-persistent implementations of [`SocialGraph`] and
//! [`ContentCatalog`] for unit tests, development scenarios, and the CLI's
//! snapshot-dump ingestion. The production platform serves these traits from
//! its own user and content services.

use crate::models::{MetricSnapshot, TargetCard, TargetKind, TargetRef, UserId};
use crate::storage::traits::{Candidate, ContentCatalog, SocialGraph};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

/// In-memory follow graph.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
#[derive(Debug, Default)]
pub struct InMemorySocialGraph {
    /// follower -> set of accounts they follow.
    following: RwLock<HashMap<UserId, HashSet<UserId>>>,
}

impl InMemorySocialGraph {
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `follower` follows `followee`.
    pub fn follow(&self, follower: &UserId, followee: &UserId) {
        if let Ok(mut map) = self.following.write() {
            map.entry(follower.clone())
                .or_default()
                .insert(followee.clone());
        }
    }

    /// Removes a follow edge if present.
    pub fn unfollow(&self, follower: &UserId, followee: &UserId) {
        if let Ok(mut map) = self.following.write() {
            if let Some(set) = map.get_mut(follower) {
                set.remove(followee);
            }
        }
    }
}

impl SocialGraph for InMemorySocialGraph {
    fn followers_of(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let map = self
            .following
            .read()
            .map_err(|e| Error::store("followers_of", e))?;
        let mut followers: Vec<UserId> = map
            .iter()
            .filter(|(_, following)| following.contains(user_id))
            .map(|(follower, _)| follower.clone())
            .collect();
        followers.sort();
        Ok(followers)
    }

    fn following_of(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let map = self
            .following
            .read()
            .map_err(|e| Error::store("following_of", e))?;
        let mut following: Vec<UserId> = map
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        following.sort();
        Ok(following)
    }

    fn following_among(&self, viewer: &UserId, candidates: &[UserId]) -> Result<HashSet<UserId>> {
        let map = self
            .following
            .read()
            .map_err(|e| Error::store("following_among", e))?;
        Ok(map.get(viewer).map_or_else(HashSet::new, |set| {
            candidates
                .iter()
                .filter(|c| set.contains(*c))
                .cloned()
                .collect()
        }))
    }
}

/// One catalog item: presentation card plus its current metric snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Presentation card.
    pub card: TargetCard,
    /// Metric snapshot used for scoring.
    pub metrics: MetricSnapshot,
}

/// Serialized catalog dump, the input format for CLI snapshot refresh.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogDump {
    /// Catalog items.
    #[serde(default)]
    pub items: Vec<CatalogItem>,
    /// Interest tags per user.
    #[serde(default)]
    pub interests: HashMap<String, Vec<String>>,
}

/// In-memory content catalog.
///
/// Backs tests and the CLI path that refreshes trending snapshots from an
/// exported metrics dump.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<TargetRef, CatalogItem>>,
    interests: RwLock<HashMap<UserId, Vec<String>>>,
    likes: RwLock<HashMap<UserId, HashSet<TargetRef>>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from a JSON dump file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::store("read_catalog_dump", e))?;
        let dump: CatalogDump =
            serde_json::from_str(&raw).map_err(|e| Error::store("parse_catalog_dump", e))?;

        let catalog = Self::new();
        for item in dump.items {
            catalog.insert(item);
        }
        for (user, tags) in dump.interests {
            catalog.set_interests(&UserId::new(user), tags);
        }
        Ok(catalog)
    }

    /// Inserts or replaces a catalog item.
    pub fn insert(&self, item: CatalogItem) {
        if let Ok(mut items) = self.items.write() {
            items.insert(item.card.target.clone(), item);
        }
    }

    /// Removes an item, simulating deletion or privatization upstream.
    pub fn remove(&self, target: &TargetRef) {
        if let Ok(mut items) = self.items.write() {
            items.remove(target);
        }
    }

    /// Sets a user's interest tags.
    pub fn set_interests(&self, user_id: &UserId, tags: Vec<String>) {
        if let Ok(mut interests) = self.interests.write() {
            interests.insert(user_id.clone(), tags);
        }
    }

    /// Records that a user liked a target.
    pub fn like(&self, user_id: &UserId, target: &TargetRef) {
        if let Ok(mut likes) = self.likes.write() {
            likes
                .entry(user_id.clone())
                .or_default()
                .insert(target.clone());
        }
    }

    /// Returns the number of items stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().map(|i| i.len()).unwrap_or(0)
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cards_where<F>(&self, predicate: F, limit: usize) -> Result<Vec<TargetCard>>
    where
        F: Fn(&CatalogItem) -> bool,
    {
        let items = self
            .items
            .read()
            .map_err(|e| Error::store("catalog_read", e))?;
        let mut cards: Vec<TargetCard> = items
            .values()
            .filter(|item| predicate(item))
            .map(|item| item.card.clone())
            .collect();
        cards.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.target.id.cmp(&b.target.id))
        });
        cards.truncate(limit);
        Ok(cards)
    }
}

impl ContentCatalog for InMemoryCatalog {
    fn candidates(&self, kind: TargetKind, since: u64, limit: usize) -> Result<Vec<Candidate>> {
        let items = self
            .items
            .read()
            .map_err(|e| Error::store("candidates", e))?;
        let mut candidates: Vec<Candidate> = items
            .values()
            .filter(|item| item.card.target.kind == kind)
            // Tags and users carry window-scoped counters rather than a
            // creation time, so the window filter applies to memes only.
            .filter(|item| kind != TargetKind::Meme || item.card.created_at >= since)
            .map(|item| Candidate {
                target: item.card.target.clone(),
                created_at: item.card.created_at,
                metrics: item.metrics,
            })
            .collect();
        candidates.sort_by(|a, b| a.target.id.cmp(&b.target.id));
        candidates.truncate(limit);
        Ok(candidates)
    }

    fn resolve(&self, refs: &[TargetRef]) -> Result<Vec<TargetCard>> {
        let items = self.items.read().map_err(|e| Error::store("resolve", e))?;
        Ok(refs
            .iter()
            .filter_map(|r| items.get(r).map(|item| item.card.clone()))
            .collect())
    }

    fn recent_by_authors(&self, authors: &[UserId], limit: usize) -> Result<Vec<TargetCard>> {
        let authors: HashSet<&UserId> = authors.iter().collect();
        self.cards_where(
            |item| {
                item.card.target.kind == TargetKind::Meme
                    && item
                        .card
                        .owner_id
                        .as_ref()
                        .is_some_and(|owner| authors.contains(owner))
            },
            limit,
        )
    }

    fn recent_matching_tags(&self, tags: &[String], limit: usize) -> Result<Vec<TargetCard>> {
        let tags: HashSet<&String> = tags.iter().collect();
        self.cards_where(
            |item| {
                item.card.target.kind == TargetKind::Meme
                    && item.card.tags.iter().any(|t| tags.contains(t))
            },
            limit,
        )
    }

    fn recent(
        &self,
        kind: TargetKind,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<TargetCard>, u64)> {
        let all = self.cards_where(|item| item.card.target.kind == kind, usize::MAX)?;
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    fn interests_of(&self, user_id: &UserId) -> Result<Vec<String>> {
        let interests = self
            .interests
            .read()
            .map_err(|e| Error::store("interests_of", e))?;
        Ok(interests.get(user_id).cloned().unwrap_or_default())
    }

    fn liked_among(&self, viewer: &UserId, refs: &[TargetRef]) -> Result<HashSet<TargetRef>> {
        let likes = self
            .likes
            .read()
            .map_err(|e| Error::store("liked_among", e))?;
        Ok(likes.get(viewer).map_or_else(HashSet::new, |set| {
            refs.iter().filter(|r| set.contains(*r)).cloned().collect()
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::EngagementMetrics;

    fn meme_item(id: &str, owner: &str, tags: &[&str], created_at: u64) -> CatalogItem {
        CatalogItem {
            card: TargetCard {
                target: TargetRef::meme(id),
                owner_id: Some(UserId::from(owner)),
                title: Some(format!("meme {id}")),
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

    #[test]
    fn test_graph_edges() {
        let graph = InMemorySocialGraph::new();
        graph.follow(&UserId::from("a"), &UserId::from("b"));
        graph.follow(&UserId::from("c"), &UserId::from("b"));

        assert_eq!(
            graph.followers_of(&UserId::from("b")).unwrap(),
            vec![UserId::from("a"), UserId::from("c")]
        );
        assert_eq!(
            graph.following_of(&UserId::from("a")).unwrap(),
            vec![UserId::from("b")]
        );

        let among = graph
            .following_among(&UserId::from("a"), &[UserId::from("b"), UserId::from("c")])
            .unwrap();
        assert!(among.contains(&UserId::from("b")));
        assert!(!among.contains(&UserId::from("c")));
    }

    #[test]
    fn test_resolve_drops_missing() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(meme_item("m1", "alice", &[], 100));

        let cards = catalog
            .resolve(&[TargetRef::meme("m1"), TargetRef::meme("ghost")])
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].target.id, "m1");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(meme_item("m1", "alice", &[], 100));
        catalog.insert(meme_item("m2", "alice", &[], 300));
        catalog.insert(meme_item("m3", "bob", &[], 200));

        let (cards, total) = catalog.recent(TargetKind::Meme, 2, 0).unwrap();
        assert_eq!(total, 3);
        let ids: Vec<&str> = cards.iter().map(|c| c.target.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[test]
    fn test_tag_matching() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(meme_item("m1", "alice", &["cats"], 100));
        catalog.insert(meme_item("m2", "bob", &["dogs"], 200));

        let cards = catalog
            .recent_matching_tags(&["cats".to_string()], 10)
            .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].target.id, "m1");
    }

    #[test]
    fn test_likes_membership() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(meme_item("m1", "alice", &[], 100));
        catalog.like(&UserId::from("bob"), &TargetRef::meme("m1"));

        let liked = catalog
            .liked_among(&UserId::from("bob"), &[TargetRef::meme("m1"), TargetRef::meme("m2")])
            .unwrap();
        assert_eq!(liked.len(), 1);
    }
}
