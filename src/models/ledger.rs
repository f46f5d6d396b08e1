use crate::domain::{PairKey, PairState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The durable record of the latest attempt for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: i32,
    pub pair: PairKey,
    pub constructed_url: String,
    pub products_found: i32,
    pub products_saved: i32,
    pub success: bool,
    pub attempts: i32,
    pub extracted_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[must_use]
    pub const fn state(&self) -> PairState {
        PairState::from_success(self.success)
    }
}

/// Counts for one successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessCounts {
    pub found: i32,
    pub saved: i32,
}

impl SuccessCounts {
    /// Saved can never exceed found; a larger `saved` is capped.
    #[must_use]
    pub fn new(found: usize, saved: usize) -> Self {
        let found = i32::try_from(found).unwrap_or(i32::MAX);
        let saved = i32::try_from(saved).unwrap_or(i32::MAX).min(found);
        Self { found, saved }
    }
}

/// Result of committing a pair's unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer already holds a terminal entry for the pair; nothing
    /// from this attempt was kept.
    AlreadyClaimed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub entries: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_is_capped_at_found() {
        assert_eq!(SuccessCounts::new(3, 3), SuccessCounts { found: 3, saved: 3 });
        assert_eq!(SuccessCounts::new(3, 5), SuccessCounts { found: 3, saved: 3 });
        assert_eq!(SuccessCounts::new(4, 1), SuccessCounts { found: 4, saved: 1 });
    }
}
