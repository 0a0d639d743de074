//! In-memory follow graph (for testing/local development)
//!
//! Holds the authoritative edge set plus knobs to make individual actors fail,
//! decline, or present revoked credentials.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{GraphProfile, SocialGraphClient};
use crate::member::Credential;
use crate::types::{ExchangeError, Result};

/// Graph operations, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphOp {
    IsFollowing,
    Follow,
    Unfollow,
    Whoami,
    ProfileVisible,
}

#[derive(Default)]
struct GraphState {
    /// token -> identity
    accounts: HashMap<String, String>,
    /// (follower, followee)
    edges: HashSet<(String, String)>,
    revoked: HashSet<String>,
    failing: HashSet<(String, GraphOp)>,
    /// Actors whose follow calls are declined without error
    declining: HashSet<String>,
    /// Accounts whose public profile is gone
    hidden: HashSet<String>,
}

pub struct InMemoryGraph {
    state: Mutex<GraphState>,
    is_following_calls: AtomicUsize,
    follow_calls: AtomicUsize,
    unfollow_calls: AtomicUsize,
    whoami_calls: AtomicUsize,
    profile_calls: AtomicUsize,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GraphState::default()),
            is_following_calls: AtomicUsize::new(0),
            follow_calls: AtomicUsize::new(0),
            unfollow_calls: AtomicUsize::new(0),
            whoami_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an account reachable through `token`
    pub fn add_account(&self, identity: &str, token: &str) {
        self.state()
            .accounts
            .insert(token.to_string(), identity.to_string());
    }

    /// Insert an edge directly, bypassing any actor
    pub fn insert_edge(&self, follower: &str, followee: &str) {
        self.state()
            .edges
            .insert((follower.to_string(), followee.to_string()));
    }

    pub fn has_edge(&self, follower: &str, followee: &str) -> bool {
        self.state()
            .edges
            .contains(&(follower.to_string(), followee.to_string()))
    }

    pub fn edge_count(&self) -> usize {
        self.state().edges.len()
    }

    /// Every call by `identity` fails with `CredentialInvalid`
    pub fn revoke(&self, identity: &str) {
        self.state().revoked.insert(identity.to_string());
    }

    /// Calls of `op` by `identity` fail with `ExternalCallFailed`
    pub fn fail(&self, identity: &str, op: GraphOp) {
        self.state().failing.insert((identity.to_string(), op));
    }

    /// Follow calls by `identity` return `Ok(false)`
    pub fn decline_follows(&self, identity: &str) {
        self.state().declining.insert(identity.to_string());
    }

    /// The account keeps working credentials but its public profile 404s
    pub fn hide_profile(&self, identity: &str) {
        self.state().hidden.insert(identity.to_string());
    }

    pub fn calls(&self, op: GraphOp) -> usize {
        self.counter(op).load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        [
            GraphOp::IsFollowing,
            GraphOp::Follow,
            GraphOp::Unfollow,
            GraphOp::Whoami,
            GraphOp::ProfileVisible,
        ]
        .iter()
        .map(|op| self.calls(*op))
        .sum()
    }

    fn counter(&self, op: GraphOp) -> &AtomicUsize {
        match op {
            GraphOp::IsFollowing => &self.is_following_calls,
            GraphOp::Follow => &self.follow_calls,
            GraphOp::Unfollow => &self.unfollow_calls,
            GraphOp::Whoami => &self.whoami_calls,
            GraphOp::ProfileVisible => &self.profile_calls,
        }
    }

    /// Resolve the actor and apply injected failures
    fn authorize(&self, actor: &Credential, op: GraphOp) -> Result<(MutexGuard<'_, GraphState>, String)> {
        self.counter(op).fetch_add(1, Ordering::SeqCst);

        let state = self.state();
        let identity = state
            .accounts
            .get(actor.expose())
            .cloned()
            .ok_or_else(|| ExchangeError::CredentialInvalid("unknown token".to_string()))?;

        if state.revoked.contains(&identity) {
            return Err(ExchangeError::CredentialInvalid(identity));
        }
        if state.failing.contains(&(identity.clone(), op)) {
            return Err(ExchangeError::ExternalCallFailed(format!(
                "{:?} by {} failed",
                op, identity
            )));
        }

        Ok((state, identity))
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocialGraphClient for InMemoryGraph {
    async fn is_following(&self, actor: &Credential, target: &str) -> Result<bool> {
        let (state, identity) = self.authorize(actor, GraphOp::IsFollowing)?;
        Ok(state.edges.contains(&(identity, target.to_string())))
    }

    async fn follow(&self, actor: &Credential, target: &str) -> Result<bool> {
        let (mut state, identity) = self.authorize(actor, GraphOp::Follow)?;
        if state.declining.contains(&identity) {
            return Ok(false);
        }
        if identity == target || !state.accounts.values().any(|id| id == target) {
            return Ok(false);
        }
        state.edges.insert((identity, target.to_string()));
        Ok(true)
    }

    async fn unfollow(&self, actor: &Credential, target: &str) -> Result<bool> {
        let (mut state, identity) = self.authorize(actor, GraphOp::Unfollow)?;
        Ok(state.edges.remove(&(identity, target.to_string())))
    }

    async fn whoami(&self, actor: &Credential) -> Result<GraphProfile> {
        let (_state, identity) = self.authorize(actor, GraphOp::Whoami)?;
        Ok(GraphProfile {
            avatar_url: Some(format!("https://avatars.invalid/{}", identity)),
            identity,
        })
    }

    async fn profile_visible(&self, identity: &str) -> Result<bool> {
        self.counter(GraphOp::ProfileVisible).fetch_add(1, Ordering::SeqCst);

        let state = self.state();
        if state
            .failing
            .contains(&(identity.to_string(), GraphOp::ProfileVisible))
        {
            return Err(ExchangeError::ExternalCallFailed(format!(
                "profile lookup for {} failed",
                identity
            )));
        }
        Ok(state.accounts.values().any(|id| id == identity) && !state.hidden.contains(identity))
    }
}
