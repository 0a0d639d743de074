//! Member document schema
//!
//! One document per exchange participant, keyed by its graph login.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::member::{Credential, Member};

/// Collection name for members
pub const MEMBER_COLLECTION: &str = "members";

/// Member document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MemberDoc {
    #[serde(default)]
    pub metadata: Metadata,

    /// Graph login, unique
    pub login: String,

    /// Graph access token
    pub token: String,

    /// Login of the referring member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,

    /// Logins confirmed to follow this member through the exchange
    #[serde(default)]
    pub followed_by: Vec<String>,

    /// Administrative accounts with no quota cap
    #[serde(default)]
    pub unlimited_quota: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&Member> for MemberDoc {
    fn from(member: &Member) -> Self {
        Self {
            metadata: Metadata::new(),
            login: member.identity.clone(),
            token: member.credential.expose().to_string(),
            referred_by: member.referred_by.clone(),
            followed_by: member.connections.iter().cloned().collect(),
            unlimited_quota: member.unlimited_quota,
            avatar_url: member.avatar_url.clone(),
        }
    }
}

impl From<MemberDoc> for Member {
    fn from(doc: MemberDoc) -> Self {
        let mut member = Member::new(doc.login, Credential::new(doc.token));
        member.referred_by = doc.referred_by;
        member.unlimited_quota = doc.unlimited_quota;
        member.avatar_url = doc.avatar_url;
        for other in &doc.followed_by {
            member.add_connection(other);
        }
        member
    }
}

impl IntoIndexes for MemberDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "login": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("login_unique".to_string())
                        .build(),
                ),
            ),
            // Referral counting
            (
                doc! { "referred_by": 1 },
                Some(
                    IndexOptions::builder()
                        .name("referred_by_index".to_string())
                        .build(),
                ),
            ),
            // Reverse lookup: whom a member follows through the exchange
            (
                doc! { "followed_by": 1 },
                Some(
                    IndexOptions::builder()
                        .name("followed_by_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for MemberDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_round_trip_drops_self_connection() {
        let doc = MemberDoc {
            login: "alice".to_string(),
            token: "t".to_string(),
            followed_by: vec!["bob".to_string(), "alice".to_string()],
            ..Default::default()
        };

        let member = Member::from(doc);
        assert_eq!(member.connections.len(), 1);
        assert!(member.is_connected_to("bob"));
    }

    #[test]
    fn test_indexes_declared() {
        let names: Vec<String> = MemberDoc::into_indices()
            .into_iter()
            .filter_map(|(_, opts)| opts.and_then(|o| o.name))
            .collect();
        assert!(names.contains(&"login_unique".to_string()));
        assert!(names.contains(&"referred_by_index".to_string()));
    }
}
