//! Candidate selection
//!
//! The cached `connections` set can undercount real followers (an edge that
//! exists on the graph but was never recorded). Before offering anyone, every
//! store candidate is checked against the graph; candidates already following
//! the member are folded back into the cache instead of being offered again.
//!
//! This is the most expensive read in the system: one membership check per
//! store candidate. Checks run through a fixed-width window and are joined back
//! in store order, so the sequence handed to the coordinator is deterministic.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::graph::SocialGraphClient;
use crate::member::Member;
use crate::store::MemberStore;
use crate::types::Result;

/// Computes members not yet confirmed as connections
pub struct CandidateSelector<S: MemberStore, G: SocialGraphClient> {
    store: Arc<S>,
    graph: Arc<G>,
    concurrency: usize,
}

impl<S: MemberStore, G: SocialGraphClient> Clone for CandidateSelector<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            graph: Arc::clone(&self.graph),
            concurrency: self.concurrency,
        }
    }
}

impl<S: MemberStore, G: SocialGraphClient> CandidateSelector<S, G> {
    pub fn new(store: Arc<S>, graph: Arc<G>, concurrency: usize) -> Self {
        Self {
            store,
            graph,
            concurrency: concurrency.max(1),
        }
    }

    /// Members that do not follow `member`, in store order.
    ///
    /// Candidates the graph reports as already following are recorded in the
    /// member's connections. Candidates whose check fails are dropped from
    /// both outcomes. Only store failures are returned as errors.
    pub async fn find_unconnected(&self, member: &Member) -> Result<Vec<Member>> {
        let store_candidates = self
            .store
            .find_excluding(&member.identity, &member.connections)
            .await?;
        let swept = store_candidates.len();

        let graph = &self.graph;
        let target = member.identity.as_str();

        // `buffered` keeps results in input order
        let checks: Vec<(Member, Result<bool>)> = stream::iter(store_candidates)
            .filter(|candidate| futures::future::ready(candidate.identity != target))
            .map(|candidate| async move {
                let follows = graph.is_following(&candidate.credential, target).await;
                (candidate, follows)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut unconnected = Vec::with_capacity(checks.len());
        let mut healed = 0usize;
        let mut unknown = 0usize;

        for (candidate, follows) in checks {
            match follows {
                Ok(false) => unconnected.push(candidate),
                Ok(true) => {
                    // Stale cache: the edge exists but was never recorded
                    self.store
                        .add_connection(&member.identity, &candidate.identity)
                        .await?;
                    debug!(
                        identity = %member.identity,
                        candidate = %candidate.identity,
                        "Recorded existing follower"
                    );
                    healed += 1;
                }
                Err(e) => {
                    warn!(
                        identity = %member.identity,
                        candidate = %candidate.identity,
                        error = %e,
                        "Membership check failed, candidate skipped"
                    );
                    unknown += 1;
                }
            }
        }

        info!(
            identity = %member.identity,
            swept = swept,
            candidates = unconnected.len(),
            healed = healed,
            unknown = unknown,
            "Candidate sweep complete"
        );

        Ok(unconnected)
    }
}
