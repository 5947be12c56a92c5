//! Content catalog collaborator trait.

use crate::Result;
use crate::models::{MetricSnapshot, TargetCard, TargetKind, TargetRef, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A scoring candidate: a target plus the metric snapshot to score it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// The target being scored.
    pub target: TargetRef,
    /// Creation time of the content (Unix seconds). Zero for kinds without a
    /// meaningful creation time (tags, users).
    #[serde(default)]
    pub created_at: u64,
    /// Metric snapshot for the period window.
    pub metrics: MetricSnapshot,
}

/// Read-only view of the platform's content and interest data.
///
/// Content rows and interest profiles are owned by external collaborators.
/// Every method tolerates staleness: refs that no longer resolve are simply
/// absent from results.
pub trait ContentCatalog: Send + Sync {
    /// Returns scoring candidates of `kind` whose activity falls inside the
    /// window starting at `since` (Unix seconds).
    fn candidates(&self, kind: TargetKind, since: u64, limit: usize) -> Result<Vec<Candidate>>;

    /// Resolves refs to presentation cards, dropping any that are missing,
    /// deleted, or private. Order follows the input order of surviving refs.
    fn resolve(&self, refs: &[TargetRef]) -> Result<Vec<TargetCard>>;

    /// Returns recent content cards authored by any of `authors`,
    /// newest-first.
    fn recent_by_authors(&self, authors: &[UserId], limit: usize) -> Result<Vec<TargetCard>>;

    /// Returns recent content cards matching any of `tags`, newest-first.
    fn recent_matching_tags(&self, tags: &[String], limit: usize) -> Result<Vec<TargetCard>>;

    /// Returns one page of recent content of `kind`, newest-first, plus the
    /// full inventory count (the anonymous chronological feed source).
    fn recent(
        &self,
        kind: TargetKind,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<TargetCard>, u64)>;

    /// Returns the viewer's interest tags. An empty vector means no profile.
    fn interests_of(&self, user_id: &UserId) -> Result<Vec<String>>;

    /// Returns the subset of `refs` the viewer has liked, as one batched
    /// membership lookup.
    fn liked_among(&self, viewer: &UserId, refs: &[TargetRef]) -> Result<HashSet<TargetRef>>;
}
