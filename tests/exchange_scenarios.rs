//! End-to-end exchange workflows over the in-memory store and graph

use std::sync::Arc;

use mutuals::config::{EngineConfig, QuotaConfig};
use mutuals::engine::{HeadroomLimit, ReleaseResult};
use mutuals::graph::{GraphOp, InMemoryGraph};
use mutuals::member::{Amount, Credential, Member, QuotaCount};
use mutuals::store::{InMemoryMemberStore, MemberStore};
use mutuals::Exchange;

type TestExchange = Exchange<InMemoryMemberStore, InMemoryGraph>;

struct Fixture {
    exchange: Arc<TestExchange>,
    store: Arc<InMemoryMemberStore>,
    graph: Arc<InMemoryGraph>,
}

fn fixture(members: Vec<Member>, base: u64, bonus: u64) -> Fixture {
    let graph = Arc::new(InMemoryGraph::new());
    for m in &members {
        graph.add_account(&m.identity, m.credential.expose());
    }
    let store = Arc::new(InMemoryMemberStore::with_members(members));
    let config = EngineConfig {
        quota: QuotaConfig { base, bonus },
        verify_concurrency: 3,
        release_concurrency: 2,
    };
    Fixture {
        exchange: Arc::new(Exchange::new(store.clone(), graph.clone(), config)),
        store,
        graph,
    }
}

fn member(id: &str) -> Member {
    Member::new(id, Credential::new(format!("{id}-token")))
}

#[tokio::test]
async fn test_acquire_all_fills_pool_and_leaves_headroom() {
    let f = fixture(vec![member("a"), member("b"), member("c"), member("d")], 5, 2);

    let result = f.exchange.acquire("a", Amount::All).await.unwrap();
    assert_eq!(result.granted, 3);

    let summary = f.exchange.summarize("a").await.unwrap();
    assert_eq!(summary.privilege.count, QuotaCount::Limited(5));
    assert_eq!(summary.connection_count, 3);
    assert_eq!(summary.remaining, Some(2));
    assert_eq!(summary.candidate_count, 0);
    assert_eq!(summary.amount, 0);
    assert_eq!(summary.limit, HeadroomLimit::PoolExhausted);

    for other in ["b", "c", "d"] {
        assert!(f.graph.has_edge("a", other));
        assert!(f.graph.has_edge(other, "a"));
        // Recorded in both directions
        assert!(f.store.connections_of(other).await.contains("a"));
    }
    assert_eq!(summary.following, vec!["b", "c", "d"]);
}

#[tokio::test]
async fn test_failed_reciprocation_rolls_back() {
    let f = fixture(vec![member("a"), member("b"), member("c")], 5, 2);
    f.graph.fail("b", GraphOp::Follow);

    let result = f.exchange.acquire("a", Amount::All).await.unwrap();
    assert_eq!(result.granted, 1);

    assert!(!f.graph.has_edge("a", "b"));
    assert!(!f.graph.has_edge("b", "a"));
    assert!(!f.store.connections_of("a").await.contains("b"));
    assert!(!f.store.connections_of("b").await.contains("a"));
    assert!(f.store.connections_of("a").await.contains("c"));
}

#[tokio::test]
async fn test_unlimited_headroom_is_candidate_count() {
    let f = fixture(
        vec![
            member("root").with_unlimited_quota(true),
            member("b"),
            member("c"),
        ],
        0,
        0,
    );

    let summary = f.exchange.summarize("root").await.unwrap();
    assert!(summary.privilege.count.is_unlimited());
    assert_eq!(summary.amount, 2);
    assert_eq!(summary.limit, HeadroomLimit::Unlimited);

    let result = f.exchange.acquire_entitled("root").await.unwrap();
    assert_eq!(result.amount, Amount::All);
    assert_eq!(result.granted, 2);
}

#[tokio::test]
async fn test_release_after_acquire() {
    let f = fixture(vec![member("a"), member("b"), member("c"), member("d")], 10, 0);
    f.exchange.acquire("a", Amount::All).await.unwrap();
    f.graph.fail("d", GraphOp::Unfollow);

    let result = f.exchange.release_all("a").await.unwrap();
    assert_eq!(result, ReleaseResult { released: 2, failed: 1 });
    assert!(f.store.connections_of("a").await.is_empty());
    assert!(!f.graph.has_edge("b", "a"));
    assert!(f.graph.has_edge("d", "a"));

    // Nothing left to release
    let again = f.exchange.release_all("a").await.unwrap();
    assert_eq!(again, ReleaseResult::default());
}

#[tokio::test]
async fn test_zero_amount_touches_nothing() {
    let f = fixture(vec![member("a"), member("b")], 5, 2);

    let result = f.exchange.acquire("a", Amount::Limited(0)).await.unwrap();
    assert_eq!(result.granted, 0);
    assert_eq!(f.graph.total_calls(), 0);
    assert_eq!(f.graph.edge_count(), 0);
}

#[tokio::test]
async fn test_existing_follower_is_recorded_not_reacquired() {
    let f = fixture(vec![member("a"), member("b"), member("c")], 5, 2);
    f.graph.insert_edge("b", "a");

    let result = f.exchange.acquire("a", Amount::All).await.unwrap();
    assert_eq!(result.granted, 1);

    let connections = f.store.connections_of("a").await;
    assert!(connections.contains("b"));
    assert!(connections.contains("c"));
    // a never followed b; the exchange only recorded the existing edge
    assert!(!f.graph.has_edge("a", "b"));
}

#[tokio::test]
async fn test_concurrent_entitled_acquires_do_not_overshoot() {
    let f = fixture(
        vec![member("a"), member("b"), member("c"), member("d"), member("e")],
        2,
        0,
    );

    let first = {
        let exchange = f.exchange.clone();
        tokio::spawn(async move { exchange.acquire_entitled("a").await })
    };
    let second = {
        let exchange = f.exchange.clone();
        tokio::spawn(async move { exchange.acquire_entitled("a").await })
    };

    let granted = first.await.unwrap().unwrap().granted + second.await.unwrap().unwrap().granted;
    assert_eq!(granted, 2);
    assert_eq!(f.store.connections_of("a").await.len(), 2);
}

#[tokio::test]
async fn test_referrals_raise_quota() {
    let f = fixture(vec![member("a"), member("b"), member("c"), member("d")], 1, 2);
    f.graph.add_account("e", "e-token");

    let registration = f
        .exchange
        .register(Credential::new("e-token"), Some("a"))
        .await
        .unwrap();
    assert!(registration.created);
    assert_eq!(f.store.len().await, 5);

    let summary = f.exchange.summarize("a").await.unwrap();
    assert_eq!(summary.privilege.referrals, 1);
    assert_eq!(summary.privilege.count, QuotaCount::Limited(3));

    let result = f.exchange.acquire_entitled("a").await.unwrap();
    assert_eq!(result.granted, 3);

    let e = f.store.find_by_id("e").await.unwrap().unwrap();
    assert_eq!(e.referred_by.as_deref(), Some("a"));
}
