//! MongoDB-backed member store

use async_trait::async_trait;
use bson::{doc, Document};
use std::collections::BTreeSet;
use tracing::debug;

use super::{MemberFilter, MemberStore};
use crate::db::schemas::{MemberDoc, MEMBER_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::member::{Credential, Member};
use crate::types::{ExchangeError, Result};

pub struct MongoMemberStore {
    members: MongoCollection<MemberDoc>,
}

impl MongoMemberStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let members = client.collection::<MemberDoc>(MEMBER_COLLECTION).await?;
        Ok(Self { members })
    }

    fn filter_doc(filter: &MemberFilter) -> Document {
        match filter {
            MemberFilter::ReferredBy(referrer) => doc! { "referred_by": referrer },
            MemberFilter::ConnectedTo(identity) => doc! { "followed_by": identity },
        }
    }

    /// Updates addressed to a missing member are errors, as in the in-memory store
    fn ensure_matched(matched_count: u64, identity: &str) -> Result<()> {
        if matched_count == 0 {
            return Err(ExchangeError::MemberNotFound(identity.to_string()));
        }
        Ok(())
    }

    /// Insertion order, then login, so candidate sequences are reproducible
    fn store_order() -> Document {
        doc! { "metadata.created_at": 1, "login": 1 }
    }
}

#[async_trait]
impl MemberStore for MongoMemberStore {
    async fn find_by_id(&self, identity: &str) -> Result<Option<Member>> {
        let found = self.members.find_one(doc! { "login": identity }).await?;
        Ok(found.map(Member::from))
    }

    async fn find_excluding(
        &self,
        identity: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<Member>> {
        let excluded: Vec<&str> = excluded.iter().map(String::as_str).collect();
        let filter = doc! {
            "login": { "$ne": identity, "$nin": excluded },
        };

        let docs = self.members.find_many(filter, Self::store_order()).await?;
        Ok(docs.into_iter().map(Member::from).collect())
    }

    async fn find_where(&self, filter: &MemberFilter) -> Result<Vec<Member>> {
        let docs = self
            .members
            .find_many(Self::filter_doc(filter), Self::store_order())
            .await?;
        Ok(docs.into_iter().map(Member::from).collect())
    }

    async fn count_where(&self, filter: &MemberFilter) -> Result<u64> {
        self.members.count(Self::filter_doc(filter)).await
    }

    async fn add_connection(&self, member: &str, other: &str) -> Result<()> {
        if member == other {
            return Ok(());
        }

        let result = self
            .members
            .update_one(
                doc! { "login": member },
                doc! { "$addToSet": { "followed_by": other } },
            )
            .await?;

        Self::ensure_matched(result.matched_count, member)?;

        debug!(member = %member, other = %other, "Connection recorded");
        Ok(())
    }

    async fn remove_connection(&self, member: &str, other: &str) -> Result<()> {
        let result = self
            .members
            .update_one(
                doc! { "login": member },
                doc! { "$pull": { "followed_by": other } },
            )
            .await?;
        Self::ensure_matched(result.matched_count, member)
    }

    async fn clear_connections(&self, member: &str) -> Result<()> {
        let result = self
            .members
            .update_one(
                doc! { "login": member },
                doc! { "$set": { "followed_by": [] } },
            )
            .await?;
        Self::ensure_matched(result.matched_count, member)
    }

    async fn insert(&self, member: &Member) -> Result<()> {
        self.members.insert_one(MemberDoc::from(member)).await
    }

    async fn set_credential(&self, identity: &str, credential: &Credential) -> Result<()> {
        let result = self
            .members
            .update_one(
                doc! { "login": identity },
                doc! { "$set": { "token": credential.expose() } },
            )
            .await?;

        Self::ensure_matched(result.matched_count, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_update_is_member_not_found() {
        let err = MongoMemberStore::ensure_matched(0, "ghost").unwrap_err();
        assert!(matches!(err, ExchangeError::MemberNotFound(ref id) if id == "ghost"));
        assert!(!err.is_fatal());
        assert!(MongoMemberStore::ensure_matched(1, "alice").is_ok());
    }
}
