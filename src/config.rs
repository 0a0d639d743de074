//! Configuration for the exchange
//!
//! CLI arguments and environment variable handling using clap. The quota
//! formula constants travel as an immutable [`QuotaConfig`] value.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Mutuals - mutual-follow exchange engine
#[derive(Parser, Debug, Clone)]
#[command(name = "mutuals")]
#[command(about = "Reciprocal follow allocation against an external social graph")]
#[command(version)]
pub struct Args {
    /// Identifier of this process, recorded in activity events
    #[arg(long, env = "HOST_ID", default_value_t = Uuid::new_v4())]
    pub host_id: Uuid,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "mutuals")]
    pub mongodb_db: String,

    /// Follow graph configuration
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Connections every member is entitled to before referrals
    #[arg(long, env = "BASE_FOLLOWERS", default_value = "10")]
    pub base_followers: u64,

    /// Extra connections granted per referred member
    #[arg(long, env = "REFERRAL_BONUS", default_value = "5")]
    pub referral_bonus: u64,

    /// Width of the membership-check sweep when selecting candidates
    #[arg(long, env = "VERIFY_CONCURRENCY", default_value = "4")]
    pub verify_concurrency: usize,

    /// Width of the bulk unfollow when releasing connections
    #[arg(long, env = "RELEASE_CONCURRENCY", default_value = "8")]
    pub release_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Append workflow activity events (JSONL) to this file
    #[arg(long, env = "ACTIVITY_LOG")]
    pub activity_log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Follow graph (GitHub-compatible REST API) connection settings
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// Base URL of the follow graph API
    #[arg(long, env = "GRAPH_API_URL", default_value = "https://api.github.com")]
    pub graph_api_url: String,

    /// User-Agent sent with every graph request
    #[arg(long, env = "GRAPH_USER_AGENT", default_value = "mutuals")]
    pub graph_user_agent: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a member's quota, connections and actionable headroom
    Summary { identity: String },

    /// Acquire new mutual connections for a member
    Acquire {
        identity: String,
        /// Maximum number of connections to grant
        #[arg(long, conflicts_with_all = ["all", "entitled"])]
        amount: Option<u32>,
        /// Attempt every available candidate
        #[arg(long, conflicts_with = "entitled")]
        all: bool,
        /// Grant up to the member's current headroom
        #[arg(long)]
        entitled: bool,
    },

    /// Unwind every connection of a member
    Release { identity: String },

    /// Register (or refresh) a member from a graph credential
    Register {
        #[arg(long, env = "MEMBER_TOKEN")]
        token: String,
        /// Identity of the referring member
        #[arg(long = "ref")]
        referred_by: Option<String>,
    },

    /// Check whether a member's stored credential still works
    Validate { identity: String },
}

/// Quota formula constants: `count = base + referrals * bonus`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    pub base: u64,
    pub bonus: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { base: 10, bonus: 5 }
    }
}

/// Engine-wide settings derived from [`Args`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub quota: QuotaConfig,
    /// Concurrent membership checks during candidate selection
    pub verify_concurrency: usize,
    /// Concurrent unfollows during release
    pub release_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quota: QuotaConfig::default(),
            verify_concurrency: 4,
            release_concurrency: 8,
        }
    }
}

impl Args {
    pub fn quota_config(&self) -> QuotaConfig {
        QuotaConfig {
            base: self.base_followers,
            bonus: self.referral_bonus,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            quota: self.quota_config(),
            verify_concurrency: self.verify_concurrency,
            release_concurrency: self.release_concurrency,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.verify_concurrency == 0 {
            return Err("VERIFY_CONCURRENCY must be at least 1".to_string());
        }

        if self.release_concurrency == 0 {
            return Err("RELEASE_CONCURRENCY must be at least 1".to_string());
        }

        if self.graph.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than 0".to_string());
        }

        if !self.graph.graph_api_url.starts_with("http://")
            && !self.graph.graph_api_url.starts_with("https://")
        {
            return Err("GRAPH_API_URL must be an http(s) URL".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["mutuals"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["summary", "alice"]);
        assert_eq!(args.quota_config(), QuotaConfig { base: 10, bonus: 5 });
        assert_eq!(args.verify_concurrency, 4);
        assert_eq!(args.graph.graph_api_url, "https://api.github.com");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_quota_flags() {
        let args = parse(&["--base-followers", "5", "--referral-bonus", "2", "summary", "a"]);
        let engine = args.engine_config();
        assert_eq!(engine.quota, QuotaConfig { base: 5, bonus: 2 });
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let args = parse(&["--verify-concurrency", "0", "summary", "alice"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_acquire_flags_conflict() {
        let result = Args::try_parse_from(["mutuals", "acquire", "alice", "--amount", "3", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_acquire_entitled() {
        let args = parse(&["acquire", "alice", "--entitled"]);
        match args.command {
            Command::Acquire { entitled, amount, all, .. } => {
                assert!(entitled);
                assert!(amount.is_none());
                assert!(!all);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
