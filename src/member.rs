//! Domain types shared by the engine, the store and the graph client

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque secret used to act on the follow graph on a member's behalf.
///
/// Never printed; `Debug` is redacted and the buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret, only for building authorization headers and persisting
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A participant in the exchange
#[derive(Debug, Clone)]
pub struct Member {
    /// Stable key into the follow graph and the store
    pub identity: String,
    pub credential: Credential,
    /// Member whose referral link brought this one in
    pub referred_by: Option<String>,
    /// Identities this member is confirmed to be followed by (cached projection)
    pub connections: BTreeSet<String>,
    /// Privileged accounts bypass the quota cap
    pub unlimited_quota: bool,
    pub avatar_url: Option<String>,
}

impl Member {
    pub fn new(identity: impl Into<String>, credential: Credential) -> Self {
        Self {
            identity: identity.into(),
            credential,
            referred_by: None,
            connections: BTreeSet::new(),
            unlimited_quota: false,
            avatar_url: None,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referred_by = Some(referrer.into());
        self
    }

    pub fn with_unlimited_quota(mut self, unlimited: bool) -> Self {
        self.unlimited_quota = unlimited;
        self
    }

    /// Insert a connection, refusing self-connections
    pub fn add_connection(&mut self, other: &str) -> bool {
        if other == self.identity {
            return false;
        }
        self.connections.insert(other.to_string())
    }

    pub fn is_connected_to(&self, other: &str) -> bool {
        self.connections.contains(other)
    }
}

/// How many new connections to attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Amount {
    Limited(u32),
    /// As many as the candidate pool allows
    All,
}

impl Amount {
    /// True once `granted` satisfies the requested amount
    pub fn is_satisfied_by(&self, granted: u32) -> bool {
        match self {
            Amount::Limited(cap) => granted >= *cap,
            Amount::All => false,
        }
    }
}

/// Connection allowance of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum QuotaCount {
    Limited(u64),
    Unlimited,
}

impl QuotaCount {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, QuotaCount::Unlimited)
    }

    pub fn limit(&self) -> Option<u64> {
        match self {
            QuotaCount::Limited(n) => Some(*n),
            QuotaCount::Unlimited => None,
        }
    }
}

/// Result of the privilege calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub count: QuotaCount,
    /// Reported even when the count is unlimited
    pub referrals: u64,
}
