//! Graph wrapper that delays calls per actor and records peak concurrency

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{GraphProfile, InMemoryGraph, SocialGraphClient};
use crate::member::Credential;
use crate::types::Result;

pub struct DelayedGraph {
    inner: InMemoryGraph,
    /// token -> delay before the call reaches the inner graph
    delays: Mutex<HashMap<String, Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl DelayedGraph {
    pub fn new(inner: InMemoryGraph) -> Self {
        Self {
            inner,
            delays: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryGraph {
        &self.inner
    }

    pub fn set_delay(&self, token: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(token.to_string(), delay);
    }

    /// Most calls ever observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn track<T, F>(&self, actor: &Credential, call: F) -> T
    where
        F: Future<Output = T> + Send,
        T: Send,
    {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(actor.expose())
            .copied()
            .unwrap_or_default();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        let out = call.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl SocialGraphClient for DelayedGraph {
    async fn is_following(&self, actor: &Credential, target: &str) -> Result<bool> {
        self.track(actor, self.inner.is_following(actor, target)).await
    }

    async fn follow(&self, actor: &Credential, target: &str) -> Result<bool> {
        self.track(actor, self.inner.follow(actor, target)).await
    }

    async fn unfollow(&self, actor: &Credential, target: &str) -> Result<bool> {
        self.track(actor, self.inner.unfollow(actor, target)).await
    }

    async fn whoami(&self, actor: &Credential) -> Result<GraphProfile> {
        self.track(actor, self.inner.whoami(actor)).await
    }

    async fn profile_visible(&self, identity: &str) -> Result<bool> {
        self.inner.profile_visible(identity).await
    }
}
