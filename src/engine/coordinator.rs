//! Reciprocal follow coordination
//!
//! For each candidate, in selection order:
//!
//! ```text
//! check ──following──> AlreadyFollowing
//!   │
//!   └─> establish ──fail──> EstablishFailed
//!          │
//!          └─> reciprocate ──fail──> rollback ──ok──> RolledBack
//!                 │                     └─────fail──> RollbackFailed
//!                 └─ok─> commit ──> Granted
//! ```
//!
//! The reciprocal follow is issued with the candidate's own stored credential.
//! Only `Granted` counts toward the requested amount. Everything except a
//! store failure is a silent per-candidate miss; callers only see `granted`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::candidates::CandidateSelector;
use crate::graph::SocialGraphClient;
use crate::member::{Amount, Member};
use crate::store::MemberStore;
use crate::types::{ExchangeError, Result};

/// What happened to a single candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    /// Both edges exist and are recorded
    Granted,
    /// The member already follows the candidate; nothing to do
    AlreadyFollowing,
    /// The follow-state check itself failed
    CheckFailed,
    /// The member's follow was not applied
    EstablishFailed,
    /// The candidate did not follow back and the member's follow was undone
    RolledBack,
    /// The candidate did not follow back and the undo also failed
    RollbackFailed,
}

/// Aggregate result returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireResult {
    pub granted: u32,
    pub amount: Amount,
}

/// Per-outcome counters, logged but never returned
#[derive(Debug, Default, Clone, Copy)]
struct OutcomeTally {
    granted: u32,
    already_following: u32,
    check_failed: u32,
    establish_failed: u32,
    rolled_back: u32,
    rollback_failed: u32,
}

impl OutcomeTally {
    fn record(&mut self, outcome: FollowOutcome) {
        match outcome {
            FollowOutcome::Granted => self.granted += 1,
            FollowOutcome::AlreadyFollowing => self.already_following += 1,
            FollowOutcome::CheckFailed => self.check_failed += 1,
            FollowOutcome::EstablishFailed => self.establish_failed += 1,
            FollowOutcome::RolledBack => self.rolled_back += 1,
            FollowOutcome::RollbackFailed => self.rollback_failed += 1,
        }
    }
}

pub struct ReciprocalFollowCoordinator<S: MemberStore, G: SocialGraphClient> {
    store: Arc<S>,
    graph: Arc<G>,
    selector: CandidateSelector<S, G>,
}

impl<S: MemberStore, G: SocialGraphClient> ReciprocalFollowCoordinator<S, G> {
    pub fn new(store: Arc<S>, graph: Arc<G>, selector: CandidateSelector<S, G>) -> Self {
        Self {
            store,
            graph,
            selector,
        }
    }

    /// Establish up to `amount` new mutual connections for `member`.
    ///
    /// Candidates are attempted one at a time; the run stops as soon as the
    /// amount is reached. A zero amount returns before touching the graph.
    pub async fn acquire_connections(&self, member: &Member, amount: Amount) -> Result<AcquireResult> {
        if amount.is_satisfied_by(0) {
            return Ok(AcquireResult { granted: 0, amount });
        }

        let candidates = self.selector.find_unconnected(member).await?;
        self.acquire_from(member, &candidates, amount).await
    }

    /// Same as [`acquire_connections`](Self::acquire_connections) over an
    /// already verified candidate list
    pub async fn acquire_from(
        &self,
        member: &Member,
        candidates: &[Member],
        amount: Amount,
    ) -> Result<AcquireResult> {
        let mut tally = OutcomeTally::default();

        for candidate in candidates {
            if amount.is_satisfied_by(tally.granted) {
                break;
            }

            let outcome = match self.attempt(member, candidate).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Candidate vanished between selection and commit
                    warn!(
                        identity = %member.identity,
                        candidate = %candidate.identity,
                        error = %e,
                        "Commit skipped"
                    );
                    continue;
                }
            };
            debug!(
                identity = %member.identity,
                candidate = %candidate.identity,
                outcome = ?outcome,
                "Candidate attempted"
            );
            tally.record(outcome);
        }

        info!(
            identity = %member.identity,
            amount = ?amount,
            candidates = candidates.len(),
            granted = tally.granted,
            already_following = tally.already_following,
            check_failed = tally.check_failed,
            establish_failed = tally.establish_failed,
            rolled_back = tally.rolled_back,
            rollback_failed = tally.rollback_failed,
            "Acquisition finished"
        );

        Ok(AcquireResult {
            granted: tally.granted,
            amount,
        })
    }

    /// Run the per-candidate state machine. Errors come from the store only.
    pub async fn attempt(&self, member: &Member, candidate: &Member) -> Result<FollowOutcome> {
        // Check
        match self
            .graph
            .is_following(&member.credential, &candidate.identity)
            .await
        {
            Ok(true) => return Ok(FollowOutcome::AlreadyFollowing),
            Ok(false) => {}
            Err(e) => {
                log_external(&member.identity, &candidate.identity, "check", &e);
                return Ok(FollowOutcome::CheckFailed);
            }
        }

        // Establish
        match self
            .graph
            .follow(&member.credential, &candidate.identity)
            .await
        {
            Ok(true) => {}
            Ok(false) => return Ok(FollowOutcome::EstablishFailed),
            Err(e) => {
                log_external(&member.identity, &candidate.identity, "establish", &e);
                return Ok(FollowOutcome::EstablishFailed);
            }
        }

        // Reciprocate, acting as the candidate
        let reciprocated = match self
            .graph
            .follow(&candidate.credential, &member.identity)
            .await
        {
            Ok(confirmed) => confirmed,
            Err(e) => {
                log_external(&candidate.identity, &member.identity, "reciprocate", &e);
                false
            }
        };

        if !reciprocated {
            return Ok(self.roll_back(member, candidate).await);
        }

        // Commit both directions; a failure here leaves real edges the next
        // candidate sweep will pick up
        self.store
            .add_connection(&member.identity, &candidate.identity)
            .await?;
        self.store
            .add_connection(&candidate.identity, &member.identity)
            .await?;

        Ok(FollowOutcome::Granted)
    }

    async fn roll_back(&self, member: &Member, candidate: &Member) -> FollowOutcome {
        match self
            .graph
            .unfollow(&member.credential, &candidate.identity)
            .await
        {
            Ok(_) => FollowOutcome::RolledBack,
            Err(e) => {
                warn!(
                    identity = %member.identity,
                    candidate = %candidate.identity,
                    error = %e,
                    "Rollback failed, one-sided follow left in place"
                );
                FollowOutcome::RollbackFailed
            }
        }
    }
}

fn log_external(actor: &str, target: &str, step: &str, error: &ExchangeError) {
    match error {
        ExchangeError::CredentialInvalid(_) => warn!(
            actor = %actor,
            target = %target,
            step = step,
            "Credential rejected by follow graph"
        ),
        _ => warn!(
            actor = %actor,
            target = %target,
            step = step,
            error = %error,
            "Follow graph call failed"
        ),
    }
}
