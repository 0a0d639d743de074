//! Member read-model: quota, connections and actionable headroom

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::candidates::CandidateSelector;
use super::privilege::PrivilegeCalculator;
use crate::graph::SocialGraphClient;
use crate::member::{Member, Quota};
use crate::store::{MemberFilter, MemberStore};
use crate::types::Result;

/// What bounds `MemberSummary::amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadroomLimit {
    /// Enough candidates to fill the remaining quota
    Available,
    /// Connections already meet or exceed the quota
    QuotaReached,
    /// Fewer candidates than remaining quota
    PoolExhausted,
    /// Quota does not apply; bounded by candidates only
    Unlimited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub identity: String,
    pub privilege: Quota,
    /// Cached connections, not re-verified
    pub connections: Vec<String>,
    pub connection_count: usize,
    /// Members that record this member among their connections
    pub following: Vec<String>,
    pub candidate_count: usize,
    /// `None` when the quota is unlimited
    pub remaining: Option<i64>,
    /// New connections obtainable right now, never negative
    pub amount: u64,
    pub limit: HeadroomLimit,
}

pub struct MemberSummaryAssembler<S: MemberStore, G: SocialGraphClient> {
    store: Arc<S>,
    calculator: PrivilegeCalculator,
    selector: CandidateSelector<S, G>,
}

impl<S: MemberStore, G: SocialGraphClient> MemberSummaryAssembler<S, G> {
    pub fn new(store: Arc<S>, calculator: PrivilegeCalculator, selector: CandidateSelector<S, G>) -> Self {
        Self {
            store,
            calculator,
            selector,
        }
    }

    pub async fn summarize(&self, member: &Member) -> Result<MemberSummary> {
        let (summary, _) = self.summarize_with_candidates(member).await?;
        Ok(summary)
    }

    /// The summary plus the verified candidates it counted, in store order
    pub async fn summarize_with_candidates(&self, member: &Member) -> Result<(MemberSummary, Vec<Member>)> {
        let referrals = self
            .store
            .count_where(&MemberFilter::ReferredBy(member.identity.clone()))
            .await?;
        let privilege = self.calculator.quota(member, referrals);

        let candidates = self.selector.find_unconnected(member).await?;
        let candidate_count = candidates.len();

        // The sweep may have recorded followers it found on the graph
        let connections: Vec<String> = match self.store.find_by_id(&member.identity).await? {
            Some(fresh) => fresh.connections.into_iter().collect(),
            None => member.connections.iter().cloned().collect(),
        };

        let following: Vec<String> = self
            .store
            .find_where(&MemberFilter::ConnectedTo(member.identity.clone()))
            .await?
            .into_iter()
            .map(|m| m.identity)
            .collect();

        let (remaining, amount, limit) = headroom(&privilege, connections.len(), candidate_count);

        debug!(
            identity = %member.identity,
            referrals = referrals,
            candidates = candidate_count,
            amount = amount,
            limit = ?limit,
            "Summary assembled"
        );

        let summary = MemberSummary {
            identity: member.identity.clone(),
            privilege,
            connection_count: connections.len(),
            connections,
            following,
            candidate_count,
            remaining,
            amount,
            limit,
        };
        Ok((summary, candidates))
    }
}

/// `amount = max(0, min(candidates, quota - connections))`
fn headroom(privilege: &Quota, connections: usize, candidates: usize) -> (Option<i64>, u64, HeadroomLimit) {
    let candidates_u64 = candidates as u64;

    let Some(limit) = privilege.count.limit() else {
        return (None, candidates_u64, HeadroomLimit::Unlimited);
    };

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let remaining = limit.saturating_sub(i64::try_from(connections).unwrap_or(i64::MAX));

    if remaining <= 0 {
        return (Some(remaining), 0, HeadroomLimit::QuotaReached);
    }

    let remaining_u64 = remaining as u64;
    if candidates_u64 < remaining_u64 {
        (Some(remaining), candidates_u64, HeadroomLimit::PoolExhausted)
    } else {
        (Some(remaining), remaining_u64, HeadroomLimit::Available)
    }
}
