//! Exchange engine
//!
//! ## Components
//!
//! - **PrivilegeCalculator**: referral count to connection quota
//! - **CandidateSelector**: verified list of members not yet following a member
//! - **ReciprocalFollowCoordinator**: establishes mutual follows, rolling back one-sided ones
//! - **ConnectionReconciler**: bulk release of a member's connections
//! - **MemberSummaryAssembler**: read-model of quota, connections and headroom
//!
//! [`Exchange`] wires them to a store and a graph client. Mutating workflows
//! are serialized per initiating member through [`MemberLocks`].

pub mod candidates;
pub mod coordinator;
pub mod locks;
pub mod privilege;
pub mod reconciler;
pub mod summary;

pub use candidates::CandidateSelector;
pub use coordinator::{AcquireResult, FollowOutcome, ReciprocalFollowCoordinator};
pub use locks::MemberLocks;
pub use privilege::PrivilegeCalculator;
pub use reconciler::{ConnectionReconciler, ReleaseResult};
pub use summary::{HeadroomLimit, MemberSummary, MemberSummaryAssembler};

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::EngineConfig;
use crate::graph::SocialGraphClient;
use crate::logging::ActivityLogger;
use crate::member::{Amount, Credential, Member};
use crate::registration::{self, Registration};
use crate::store::MemberStore;
use crate::types::{ExchangeError, Result};

pub struct Exchange<S: MemberStore, G: SocialGraphClient> {
    store: Arc<S>,
    graph: Arc<G>,
    coordinator: ReciprocalFollowCoordinator<S, G>,
    reconciler: ConnectionReconciler<S, G>,
    assembler: MemberSummaryAssembler<S, G>,
    locks: MemberLocks,
    activity: Option<ActivityLogger>,
}

impl<S: MemberStore, G: SocialGraphClient> Exchange<S, G> {
    pub fn new(store: Arc<S>, graph: Arc<G>, config: EngineConfig) -> Self {
        let selector = CandidateSelector::new(store.clone(), graph.clone(), config.verify_concurrency);
        let calculator = PrivilegeCalculator::new(config.quota);

        Self {
            coordinator: ReciprocalFollowCoordinator::new(store.clone(), graph.clone(), selector.clone()),
            reconciler: ConnectionReconciler::new(store.clone(), graph.clone(), config.release_concurrency),
            assembler: MemberSummaryAssembler::new(store.clone(), calculator, selector),
            locks: MemberLocks::new(),
            activity: None,
            store,
            graph,
        }
    }

    pub fn with_activity_logger(mut self, logger: ActivityLogger) -> Self {
        self.activity = Some(logger);
        self
    }

    async fn load(&self, identity: &str) -> Result<Member> {
        self.store
            .find_by_id(identity)
            .await?
            .ok_or_else(|| ExchangeError::MemberNotFound(identity.to_string()))
    }

    pub async fn summarize(&self, identity: &str) -> Result<MemberSummary> {
        let member = self.load(identity).await?;
        self.assembler.summarize(&member).await
    }

    /// Acquire up to `amount` new mutual connections for `identity`
    pub async fn acquire(&self, identity: &str, amount: Amount) -> Result<AcquireResult> {
        let _guard = self.locks.lock(identity).await;
        // Reload under the lock so a previous run's connections are seen
        let member = self.load(identity).await?;
        self.run_acquire(&member, amount).await
    }

    /// Acquire as many connections as the member's current headroom allows.
    ///
    /// The candidates verified for the summary are attempted directly; the
    /// graph is swept once.
    pub async fn acquire_entitled(&self, identity: &str) -> Result<AcquireResult> {
        let _guard = self.locks.lock(identity).await;
        let member = self.load(identity).await?;

        let (summary, candidates) = self.assembler.summarize_with_candidates(&member).await?;
        let amount = match summary.limit {
            HeadroomLimit::Unlimited => Amount::All,
            _ => Amount::Limited(u32::try_from(summary.amount).unwrap_or(u32::MAX)),
        };

        let started = Instant::now();
        info!(identity = %member.identity, amount = ?amount, "Acquire started");
        let result = self.coordinator.acquire_from(&member, &candidates, amount).await?;
        self.log_acquire(&member, amount, result, started).await;
        Ok(result)
    }

    async fn run_acquire(&self, member: &Member, amount: Amount) -> Result<AcquireResult> {
        let started = Instant::now();
        info!(identity = %member.identity, amount = ?amount, "Acquire started");

        let result = self.coordinator.acquire_connections(member, amount).await?;
        self.log_acquire(member, amount, result, started).await;
        Ok(result)
    }

    async fn log_acquire(&self, member: &Member, amount: Amount, result: AcquireResult, started: Instant) {
        if let Some(activity) = &self.activity {
            activity
                .log_acquire(&member.identity, amount, result.granted, elapsed_ms(started))
                .await;
        }
    }

    /// Release every connection of `identity`
    pub async fn release_all(&self, identity: &str) -> Result<ReleaseResult> {
        let _guard = self.locks.lock(identity).await;
        let member = self.load(identity).await?;
        let started = Instant::now();

        let result = self.reconciler.release_all(&member).await?;

        if let Some(activity) = &self.activity {
            activity
                .log_release(identity, result.released, result.failed, elapsed_ms(started))
                .await;
        }
        Ok(result)
    }

    pub async fn register(&self, credential: Credential, referred_by: Option<&str>) -> Result<Registration> {
        let registration =
            registration::register(self.store.as_ref(), self.graph.as_ref(), credential, referred_by).await?;

        if let Some(activity) = &self.activity {
            activity
                .log_register(
                    &registration.identity,
                    registration.created,
                    registration.referred_by.as_deref(),
                )
                .await;
        }
        Ok(registration)
    }

    /// Whether `identity`'s stored credential still authenticates as that member
    pub async fn validate(&self, identity: &str) -> Result<bool> {
        let member = self.load(identity).await?;
        Ok(registration::validate(self.graph.as_ref(), &member).await)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
