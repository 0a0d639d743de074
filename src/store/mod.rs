//! Member persistence
//!
//! The engine only needs single-document operations; no transactions are
//! assumed. Two backends:
//!
//! - **MongoMemberStore**: production store over the `members` collection
//! - **InMemoryMemberStore**: tests and local development

mod memory;
mod mongo;

pub use memory::InMemoryMemberStore;
pub use mongo::MongoMemberStore;

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::member::{Credential, Member};
use crate::types::Result;

/// Predicates understood by [`MemberStore::count_where`] and [`MemberStore::find_where`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberFilter {
    /// Members whose referrer is the given identity
    ReferredBy(String),
    /// Members whose connections contain the given identity
    ConnectedTo(String),
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        match self {
            MemberFilter::ReferredBy(referrer) => {
                member.referred_by.as_deref() == Some(referrer.as_str())
            }
            MemberFilter::ConnectedTo(identity) => member.connections.contains(identity),
        }
    }
}

/// Persistence operations the engine depends on
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_by_id(&self, identity: &str) -> Result<Option<Member>>;

    /// Every member except `identity` and those listed in `excluded`, in stable store order
    async fn find_excluding(
        &self,
        identity: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<Member>>;

    async fn find_where(&self, filter: &MemberFilter) -> Result<Vec<Member>>;

    async fn count_where(&self, filter: &MemberFilter) -> Result<u64>;

    /// Record `other` in `member`'s connections (set semantics, self ignored)
    async fn add_connection(&self, member: &str, other: &str) -> Result<()>;

    async fn remove_connection(&self, member: &str, other: &str) -> Result<()>;

    async fn clear_connections(&self, member: &str) -> Result<()>;

    /// Create a new member record
    async fn insert(&self, member: &Member) -> Result<()>;

    /// Replace a member's stored credential
    async fn set_credential(&self, identity: &str, credential: &Credential) -> Result<()>;
}
