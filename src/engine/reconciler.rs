//! Bulk connection release
//!
//! Every recorded follower of a member unfollows that member, acting with its
//! own stored credential. Unfollows are independent and run concurrently
//! (settle-all); none is retried and none rolls back another. The member's
//! cached connections are cleared afterwards whatever the tally.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::graph::SocialGraphClient;
use crate::member::Member;
use crate::store::MemberStore;
use crate::types::{ExchangeError, Result};

/// Aggregate result returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub released: u32,
    pub failed: u32,
}

pub struct ConnectionReconciler<S: MemberStore, G: SocialGraphClient> {
    store: Arc<S>,
    graph: Arc<G>,
    concurrency: usize,
}

impl<S: MemberStore, G: SocialGraphClient> ConnectionReconciler<S, G> {
    pub fn new(store: Arc<S>, graph: Arc<G>, concurrency: usize) -> Self {
        Self {
            store,
            graph,
            concurrency: concurrency.max(1),
        }
    }

    /// Unwind all of `member`'s connections.
    ///
    /// `released + failed` always equals the number of connections held at
    /// call time. Only the final clear can fail the call.
    pub async fn release_all(&self, member: &Member) -> Result<ReleaseResult> {
        let target = member.identity.as_str();

        let outcomes: Vec<Result<bool>> = stream::iter(member.connections.iter())
            .map(|other| self.unfollow_on_behalf_of(other.clone(), target))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut result = ReleaseResult::default();
        for outcome in outcomes {
            match outcome {
                Ok(_) => result.released += 1,
                Err(_) => result.failed += 1,
            }
        }

        self.store.clear_connections(target).await?;

        info!(
            identity = %target,
            released = result.released,
            failed = result.failed,
            "Connections released"
        );

        Ok(result)
    }

    /// `other` unfollows `target`. `Ok(false)` means there was no edge to remove.
    async fn unfollow_on_behalf_of(&self, other: String, target: &str) -> Result<bool> {
        let other_member = match self.store.find_by_id(&other).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                warn!(identity = %target, other = %other, "Connected member no longer exists");
                return Err(ExchangeError::MemberNotFound(other));
            }
            Err(e) => {
                warn!(identity = %target, other = %other, error = %e, "Lookup failed during release");
                return Err(e);
            }
        };

        match self.graph.unfollow(&other_member.credential, target).await {
            Ok(removed) => {
                debug!(identity = %target, other = %other, removed = removed, "Unfollowed");
                Ok(removed)
            }
            Err(e) => {
                warn!(identity = %target, other = %other, error = %e, "Unfollow failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::delayed::DelayedGraph;
    use crate::graph::{GraphOp, InMemoryGraph};
    use crate::member::Credential;
    use crate::store::InMemoryMemberStore;
    use std::time::Duration;

    fn setup(ids: &[&str]) -> (Arc<InMemoryMemberStore>, Arc<InMemoryGraph>) {
        let graph = InMemoryGraph::new();
        let members: Vec<Member> = ids
            .iter()
            .map(|id| {
                let token = format!("{id}-token");
                graph.add_account(id, &token);
                Member::new(*id, Credential::new(token))
            })
            .collect();
        (
            Arc::new(InMemoryMemberStore::with_members(members)),
            Arc::new(graph),
        )
    }

    async fn connect(store: &InMemoryMemberStore, graph: &InMemoryGraph, member: &str, other: &str) {
        graph.insert_edge(other, member);
        store.add_connection(member, other).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_all_success() {
        let (store, graph) = setup(&["alice", "bob", "carol"]);
        connect(&store, &graph, "alice", "bob").await;
        connect(&store, &graph, "alice", "carol").await;
        let alice = store.find_by_id("alice").await.unwrap().unwrap();

        let reconciler = ConnectionReconciler::new(store.clone(), graph.clone(), 4);
        let result = reconciler.release_all(&alice).await.unwrap();

        assert_eq!(result, ReleaseResult { released: 2, failed: 0 });
        assert!(!graph.has_edge("bob", "alice"));
        assert!(!graph.has_edge("carol", "alice"));
        assert!(store.connections_of("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_still_clears() {
        let (store, graph) = setup(&["alice", "bob", "carol", "dave"]);
        connect(&store, &graph, "alice", "bob").await;
        connect(&store, &graph, "alice", "carol").await;
        connect(&store, &graph, "alice", "dave").await;
        graph.revoke("bob");
        graph.fail("carol", GraphOp::Unfollow);
        let alice = store.find_by_id("alice").await.unwrap().unwrap();
        let before = alice.connections.len() as u32;

        let reconciler = ConnectionReconciler::new(store.clone(), graph.clone(), 2);
        let result = reconciler.release_all(&alice).await.unwrap();

        assert_eq!(result.released, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.released + result.failed, before);
        assert!(store.connections_of("alice").await.is_empty());
        // Failed unfollows leave the external edge
        assert!(graph.has_edge("bob", "alice"));
        assert!(!graph.has_edge("dave", "alice"));
    }

    #[tokio::test]
    async fn test_missing_member_counts_as_failed() {
        let (store, graph) = setup(&["alice"]);
        store.add_connection("alice", "ghost").await.unwrap();
        let alice = store.find_by_id("alice").await.unwrap().unwrap();

        let reconciler = ConnectionReconciler::new(store.clone(), graph, 1);
        let result = reconciler.release_all(&alice).await.unwrap();

        assert_eq!(result, ReleaseResult { released: 0, failed: 1 });
        assert!(store.connections_of("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_connection_counts_as_released() {
        let (store, graph) = setup(&["alice", "bob"]);
        // Recorded, but bob already unfollowed outside the exchange
        store.add_connection("alice", "bob").await.unwrap();
        let alice = store.find_by_id("alice").await.unwrap().unwrap();

        let reconciler = ConnectionReconciler::new(store.clone(), graph, 1);
        let result = reconciler.release_all(&alice).await.unwrap();
        assert_eq!(result, ReleaseResult { released: 1, failed: 0 });
    }

    #[tokio::test]
    async fn test_empty_connections() {
        let (store, graph) = setup(&["alice"]);
        let alice = store.find_by_id("alice").await.unwrap().unwrap();

        let reconciler = ConnectionReconciler::new(store, graph.clone(), 1);
        let result = reconciler.release_all(&alice).await.unwrap();
        assert_eq!(result, ReleaseResult::default());
        assert_eq!(graph.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_release_width_is_bounded() {
        let graph = Arc::new(DelayedGraph::new(InMemoryGraph::new()));
        let mut members = Vec::new();
        for i in 0..11u64 {
            let id = format!("m{i}");
            let token = format!("{id}-token");
            graph.inner().add_account(&id, &token);
            graph.set_delay(&token, Duration::from_millis((12 - i) * 3));
            members.push(Member::new(id, Credential::new(token)));
        }
        let store = Arc::new(InMemoryMemberStore::with_members(members));
        for i in 1..11 {
            let other = format!("m{i}");
            graph.inner().insert_edge(&other, "m0");
            store.add_connection("m0", &other).await.unwrap();
        }
        let m0 = store.find_by_id("m0").await.unwrap().unwrap();

        let reconciler = ConnectionReconciler::new(store.clone(), graph.clone(), 2);
        let result = reconciler.release_all(&m0).await.unwrap();

        assert_eq!(result, ReleaseResult { released: 10, failed: 0 });
        assert_eq!(graph.peak_in_flight(), 2);
        assert_eq!(graph.inner().edge_count(), 0);
    }
}
