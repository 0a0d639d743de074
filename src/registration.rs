//! Member onboarding and credential validation
//!
//! A member is created the first time a credential authenticates against the
//! graph. Later authentications only refresh the stored credential.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::graph::SocialGraphClient;
use crate::member::{Credential, Member};
use crate::store::MemberStore;
use crate::types::Result;

/// Outcome of [`register`]
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub identity: String,
    /// False when an existing member only had its credential replaced
    pub created: bool,
    pub referred_by: Option<String>,
    #[serde(skip)]
    pub member: Member,
}

pub async fn register<S, G>(
    store: &S,
    graph: &G,
    credential: Credential,
    referred_by: Option<&str>,
) -> Result<Registration>
where
    S: MemberStore + ?Sized,
    G: SocialGraphClient + ?Sized,
{
    let profile = graph.whoami(&credential).await?;

    if let Some(mut existing) = store.find_by_id(&profile.identity).await? {
        store.set_credential(&existing.identity, &credential).await?;
        existing.credential = credential;
        info!(identity = %existing.identity, "Credential refreshed");
        return Ok(Registration {
            identity: existing.identity.clone(),
            created: false,
            referred_by: existing.referred_by.clone(),
            member: existing,
        });
    }

    let referrer = match referred_by {
        Some(r) if r == profile.identity => {
            debug!(identity = %profile.identity, "Ignoring self-referral");
            None
        }
        Some(r) => match store.find_by_id(r).await? {
            Some(referrer) => Some(referrer.identity),
            None => {
                warn!(identity = %profile.identity, referrer = %r, "Unknown referrer ignored");
                None
            }
        },
        None => None,
    };

    let mut member = Member::new(profile.identity, credential);
    member.referred_by = referrer;
    member.avatar_url = profile.avatar_url;
    store.insert(&member).await?;

    info!(
        identity = %member.identity,
        referred_by = ?member.referred_by,
        "Member registered"
    );

    Ok(Registration {
        identity: member.identity.clone(),
        created: true,
        referred_by: member.referred_by.clone(),
        member,
    })
}

/// True iff the stored credential still authenticates as `member` and the
/// member's public profile is reachable
pub async fn validate<G>(graph: &G, member: &Member) -> bool
where
    G: SocialGraphClient + ?Sized,
{
    match graph.whoami(&member.credential).await {
        Ok(profile) if profile.identity == member.identity => {}
        Ok(profile) => {
            debug!(identity = %member.identity, resolved = %profile.identity, "Credential belongs to another account");
            return false;
        }
        Err(e) => {
            debug!(identity = %member.identity, error = %e, "Credential validation failed");
            return false;
        }
    }

    match graph.profile_visible(&member.identity).await {
        Ok(visible) => {
            if !visible {
                warn!(identity = %member.identity, "Public profile not reachable");
            }
            visible
        }
        Err(e) => {
            debug!(identity = %member.identity, error = %e, "Profile lookup failed");
            false
        }
    }
}
