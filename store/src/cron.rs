//! Periodic job bookkeeping.

use ccn_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A periodic job's schedule row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub interval_secs: u64,
    pub last_run: Timestamp,
}

impl CronJob {
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.last_run.has_expired(self.interval_secs, now)
    }
}

/// Storage for periodic job rows.
pub trait CronStore {
    fn get_cron_job(&self, id: &str) -> Result<Option<CronJob>, StoreError>;
    fn upsert_cron_job(&self, job: &CronJob) -> Result<(), StoreError>;
    fn list_cron_jobs(&self) -> Result<Vec<CronJob>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_when_interval_elapsed() {
        let job = CronJob {
            id: "sweep".into(),
            interval_secs: 60,
            last_run: Timestamp::from_secs(1_000),
        };
        assert!(!job.is_due(Timestamp::from_secs(1_059)));
        assert!(job.is_due(Timestamp::from_secs(1_060)));
    }
}
