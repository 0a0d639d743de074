//! In-memory member store (for testing/local development)

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{MemberFilter, MemberStore};
use crate::member::{Credential, Member};
use crate::types::{ExchangeError, Result};

/// Members kept in insertion order
pub struct InMemoryMemberStore {
    members: RwLock<Vec<Member>>,
    /// When set, every mutation fails with `StoreUnavailable`
    fail_writes: AtomicBool,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed with members, keeping their order
    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: RwLock::new(members.into_iter().collect()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of a member's cached connections
    pub async fn connections_of(&self, identity: &str) -> BTreeSet<String> {
        self.members
            .read()
            .await
            .iter()
            .find(|m| m.identity == identity)
            .map(|m| m.connections.clone())
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ExchangeError::StoreUnavailable("writes disabled".into()));
        }
        Ok(())
    }

    async fn mutate<F>(&self, identity: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Member) + Send,
    {
        self.check_writable()?;
        let mut members = self.members.write().await;
        let member = members
            .iter_mut()
            .find(|m| m.identity == identity)
            .ok_or_else(|| ExchangeError::MemberNotFound(identity.to_string()))?;
        f(member);
        Ok(())
    }
}

impl Default for InMemoryMemberStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemberStore for InMemoryMemberStore {
    async fn find_by_id(&self, identity: &str) -> Result<Option<Member>> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .find(|m| m.identity == identity)
            .cloned())
    }

    async fn find_excluding(
        &self,
        identity: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<Member>> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .filter(|m| m.identity != identity && !excluded.contains(&m.identity))
            .cloned()
            .collect())
    }

    async fn find_where(&self, filter: &MemberFilter) -> Result<Vec<Member>> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn count_where(&self, filter: &MemberFilter) -> Result<u64> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .filter(|m| filter.matches(m))
            .count() as u64)
    }

    async fn add_connection(&self, member: &str, other: &str) -> Result<()> {
        let other = other.to_string();
        self.mutate(member, move |m| {
            m.add_connection(&other);
        })
        .await
    }

    async fn remove_connection(&self, member: &str, other: &str) -> Result<()> {
        let other = other.to_string();
        self.mutate(member, move |m| {
            m.connections.remove(&other);
        })
        .await
    }

    async fn clear_connections(&self, member: &str) -> Result<()> {
        self.mutate(member, |m| m.connections.clear()).await
    }

    async fn insert(&self, member: &Member) -> Result<()> {
        self.check_writable()?;
        let mut members = self.members.write().await;
        if members.iter().any(|m| m.identity == member.identity) {
            return Err(ExchangeError::StoreUnavailable(format!(
                "duplicate member {}",
                member.identity
            )));
        }
        members.push(member.clone());
        Ok(())
    }

    async fn set_credential(&self, identity: &str, credential: &Credential) -> Result<()> {
        let credential = credential.clone();
        self.mutate(identity, move |m| m.credential = credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> Member {
        Member::new(id, Credential::new(format!("{id}-token")))
    }

    #[tokio::test]
    async fn test_find_excluding_keeps_order() {
        let store = InMemoryMemberStore::with_members(vec![
            member("alice"),
            member("bob"),
            member("carol"),
            member("dave"),
        ]);

        let excluded: BTreeSet<String> = ["carol".to_string()].into_iter().collect();
        let found = store.find_excluding("alice", &excluded).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.identity.as_str()).collect();
        assert_eq!(ids, vec!["bob", "dave"]);
    }

    #[tokio::test]
    async fn test_connection_mutations() {
        let store = InMemoryMemberStore::with_members(vec![member("alice"), member("bob")]);

        store.add_connection("alice", "bob").await.unwrap();
        store.add_connection("alice", "alice").await.unwrap();
        assert_eq!(store.connections_of("alice").await.len(), 1);

        store.remove_connection("alice", "bob").await.unwrap();
        assert!(store.connections_of("alice").await.is_empty());

        store.add_connection("alice", "bob").await.unwrap();
        store.clear_connections("alice").await.unwrap();
        assert!(store.connections_of("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_member_mutation_fails() {
        let store = InMemoryMemberStore::new();
        let err = store.add_connection("ghost", "bob").await.unwrap_err();
        assert!(matches!(err, ExchangeError::MemberNotFound(_)));
        let err = store.remove_connection("ghost", "bob").await.unwrap_err();
        assert!(matches!(err, ExchangeError::MemberNotFound(_)));
        let err = store.clear_connections("ghost").await.unwrap_err();
        assert!(matches!(err, ExchangeError::MemberNotFound(_)));
        let err = store
            .set_credential("ghost", &Credential::new("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MemberNotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_writes() {
        let store = InMemoryMemberStore::with_members(vec![member("alice")]);
        store.set_fail_writes(true);

        let err = store.add_connection("alice", "bob").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(store.find_by_id("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_count_referrals() {
        let store = InMemoryMemberStore::with_members(vec![
            member("alice"),
            member("bob").with_referrer("alice"),
            member("carol").with_referrer("alice"),
            member("dave").with_referrer("bob"),
        ]);

        let count = store
            .count_where(&MemberFilter::ReferredBy("alice".into()))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
