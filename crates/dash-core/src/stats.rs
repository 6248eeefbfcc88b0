//! Aggregate status counts.

use serde::Serialize;

use crate::event::Status;

/// Status counts over a filtered event set.
///
/// Counts are only ever incremented through [`Stats::record`], which keeps
/// `success + error + warning == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub warning: u64,
}

impl Stats {
    /// Counts one event with the given status.
    pub const fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Success => self.success += 1,
            Status::Error => self.error += 1,
            Status::Warning => self.warning += 1,
        }
    }

    /// Whole-number success percentage, rounded down. Zero when empty.
    pub const fn success_percent(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.success * 100 / self.total
        }
    }
}

impl FromIterator<Status> for Stats {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut stats = Self::default();
        for status in iter {
            stats.record(status);
        }
        stats
    }
}
