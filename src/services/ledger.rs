//! Whether a pair should be extracted, given its ledger entry.
//!
//! The rescan interval is the only knob: without one a success is final,
//! with one a success older than the interval is treated like a failure.

use crate::models::ledger::LedgerEntry;
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairDecision {
    /// No ledger entry yet.
    Fresh,
    /// The last attempt failed.
    Retry,
    /// The pair succeeded before the rescan cutoff.
    Rescan,
    Skip,
}

impl PairDecision {
    #[must_use]
    pub const fn should_attempt(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RescanPolicy {
    rescan_after: Option<TimeDelta>,
}

impl RescanPolicy {
    #[must_use]
    pub const fn terminal() -> Self {
        Self { rescan_after: None }
    }

    #[must_use]
    pub fn from_hours(hours: Option<u64>) -> Self {
        let rescan_after = hours
            .and_then(|h| i64::try_from(h).ok())
            .and_then(TimeDelta::try_hours);
        Self { rescan_after }
    }

    #[must_use]
    pub const fn with_interval(rescan_after: TimeDelta) -> Self {
        Self {
            rescan_after: Some(rescan_after),
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.rescan_after.is_none()
    }

    /// Successes extracted before this instant may be claimed again.
    #[must_use]
    pub fn reclaim_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.rescan_after.and_then(|d| now.checked_sub_signed(d))
    }

    #[must_use]
    pub fn decide(&self, entry: Option<&LedgerEntry>, now: DateTime<Utc>) -> PairDecision {
        let Some(entry) = entry else {
            return PairDecision::Fresh;
        };

        if !entry.success {
            return PairDecision::Retry;
        }

        match self.reclaim_before(now) {
            Some(cutoff) if entry.extracted_at < cutoff => PairDecision::Rescan,
            _ => PairDecision::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PairKey, ProductId, TemplateId};

    fn entry(success: bool, extracted_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            pair: PairKey::new(ProductId::new(1), TemplateId::new(1)),
            constructed_url: "https://x.example/search?q=laptop".to_string(),
            products_found: if success { 3 } else { 0 },
            products_saved: if success { 3 } else { 0 },
            success,
            attempts: 1,
            extracted_at,
        }
    }

    #[test]
    fn unseen_and_failed_pairs_are_attempted() {
        let now = Utc::now();
        let policy = RescanPolicy::terminal();
        assert_eq!(policy.decide(None, now), PairDecision::Fresh);
        assert_eq!(
            policy.decide(Some(&entry(false, now)), now),
            PairDecision::Retry
        );
    }

    #[test]
    fn success_is_final_without_rescan_interval() {
        let now = Utc::now();
        let long_ago = now - TimeDelta::days(365);
        let policy = RescanPolicy::from_hours(None);
        assert!(policy.is_terminal());
        assert_eq!(policy.reclaim_before(now), None);
        assert_eq!(
            policy.decide(Some(&entry(true, long_ago)), now),
            PairDecision::Skip
        );
    }

    #[test]
    fn stale_success_is_rescanned() {
        let now = Utc::now();
        let policy = RescanPolicy::from_hours(Some(24));

        let fresh = entry(true, now - TimeDelta::hours(1));
        assert_eq!(policy.decide(Some(&fresh), now), PairDecision::Skip);

        let stale = entry(true, now - TimeDelta::hours(25));
        assert_eq!(policy.decide(Some(&stale), now), PairDecision::Rescan);
        assert!(PairDecision::Rescan.should_attempt());
        assert!(!PairDecision::Skip.should_attempt());
    }
}
