//! Quota calculation: referral count to connection allowance

use crate::config::QuotaConfig;
use crate::member::{Member, Quota, QuotaCount};

/// Pure quota formula: `base + referrals * bonus`, or unlimited for privileged members
#[derive(Debug, Clone, Copy)]
pub struct PrivilegeCalculator {
    config: QuotaConfig,
}

impl PrivilegeCalculator {
    pub fn new(config: QuotaConfig) -> Self {
        Self { config }
    }

    pub fn quota(&self, member: &Member, referrals: u64) -> Quota {
        let count = if member.unlimited_quota {
            QuotaCount::Unlimited
        } else {
            QuotaCount::Limited(
                self.config
                    .base
                    .saturating_add(referrals.saturating_mul(self.config.bonus)),
            )
        };

        Quota { count, referrals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Credential;

    fn calculator() -> PrivilegeCalculator {
        PrivilegeCalculator::new(QuotaConfig { base: 5, bonus: 2 })
    }

    #[test]
    fn test_base_without_referrals() {
        let member = Member::new("alice", Credential::new("t"));
        let quota = calculator().quota(&member, 0);
        assert_eq!(quota.count, QuotaCount::Limited(5));
        assert_eq!(quota.referrals, 0);
    }

    #[test]
    fn test_monotonic_in_referrals() {
        let member = Member::new("alice", Credential::new("t"));
        let calc = calculator();
        let mut previous = 0;
        for referrals in 0..20 {
            let limit = calc.quota(&member, referrals).count.limit().unwrap();
            assert!(limit >= 5);
            assert!(limit >= previous);
            previous = limit;
        }
        assert_eq!(calc.quota(&member, 3).count, QuotaCount::Limited(11));
    }

    #[test]
    fn test_unlimited_still_reports_referrals() {
        let member = Member::new("root", Credential::new("t")).with_unlimited_quota(true);
        let quota = calculator().quota(&member, 4);
        assert!(quota.count.is_unlimited());
        assert_eq!(quota.referrals, 4);
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let member = Member::new("alice", Credential::new("t"));
        let calc = PrivilegeCalculator::new(QuotaConfig { base: 1, bonus: u64::MAX });
        assert_eq!(calc.quota(&member, 2).count, QuotaCount::Limited(u64::MAX));
    }
}
