//! External follow graph
//!
//! The graph is the authority on follow edges. Every call authenticates as the
//! acting member through that member's stored [`Credential`]. Clients normalize
//! whatever status conventions the service uses into plain booleans and
//! [`ExchangeError`](crate::types::ExchangeError) values.
//!
//! - **GithubGraphClient**: GitHub-compatible REST API over reqwest
//! - **InMemoryGraph**: edge set with failure injection, for tests and local runs

#[cfg(test)]
pub(crate) mod delayed;
mod github;
mod memory;

pub use github::{GithubGraphClient, GraphClientConfig};
pub use memory::{GraphOp, InMemoryGraph};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::member::Credential;
use crate::types::Result;

/// Account the credential belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphProfile {
    pub identity: String,
    pub avatar_url: Option<String>,
}

/// Follow operations performed on behalf of the credential's owner
#[async_trait]
pub trait SocialGraphClient: Send + Sync {
    /// Does the actor follow `target`?
    async fn is_following(&self, actor: &Credential, target: &str) -> Result<bool>;

    /// Make the actor follow `target`.
    ///
    /// `Ok(true)` when the service confirms the edge, `Ok(false)` when it
    /// declines without error (for example an unknown target).
    async fn follow(&self, actor: &Credential, target: &str) -> Result<bool>;

    /// Make the actor stop following `target`; same result convention as `follow`
    async fn unfollow(&self, actor: &Credential, target: &str) -> Result<bool>;

    /// Resolve the account behind a credential
    async fn whoami(&self, actor: &Credential) -> Result<GraphProfile>;

    /// Is `identity`'s public profile reachable without credentials?
    ///
    /// Suspended or flagged accounts keep working tokens but disappear from
    /// public view; those report `Ok(false)`.
    async fn profile_visible(&self, identity: &str) -> Result<bool>;
}
