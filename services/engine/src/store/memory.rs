//! In-memory store for tests and local runs.
//!
//! Holds one async mutex across the conflict check and the insert, which
//! gives the same effective isolation as the Postgres store's
//! serializable transaction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use havoc_model::{AppConfig, MinTimeViolation, Termination};
use tokio::sync::Mutex;

use super::{no_kills_since, records_conflict, Checker, SchedStore, StoreError, TerminationRecord};
use crate::schedule::Schedule;

#[derive(Default)]
struct Inner {
    terminations: Vec<TerminationRecord>,
    schedules: HashMap<NaiveDate, Schedule>,
}

/// Store backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    /// Pause between the conflict check and the insert, lock held.
    /// Lets tests widen the race window.
    record_delay: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_record_delay(delay: Duration) -> Self {
        Self {
            record_delay: delay,
            ..Self::default()
        }
    }

    /// All recorded terminations, oldest first.
    pub async fn terminations(&self) -> Vec<TerminationRecord> {
        self.inner.lock().await.terminations.clone()
    }
}

#[async_trait]
impl Checker for MemoryStore {
    async fn check(
        &self,
        term: &Termination,
        app_cfg: &AppConfig,
        end_hour: u32,
        tz: Tz,
    ) -> Result<(), StoreError> {
        let record = TerminationRecord::from(term);
        let since = no_kills_since(
            app_cfg.min_time_between_kills_in_work_days,
            term.time,
            end_hour,
            tz,
        )?;

        let mut inner = self.inner.lock().await;
        let conflict = inner
            .terminations
            .iter()
            .filter(|prior| prior.killed_at >= since)
            .filter(|prior| records_conflict(&record, prior, app_cfg))
            .max_by_key(|prior| prior.killed_at);
        if let Some(prior) = conflict {
            return Err(MinTimeViolation {
                instance_id: prior.instance_id.clone(),
                killed_at: prior.killed_at,
                tz: Some(tz),
            }
            .into());
        }

        if !self.record_delay.is_zero() {
            tokio::time::sleep(self.record_delay).await;
        }
        inner.terminations.push(record);
        Ok(())
    }
}

#[async_trait]
impl SchedStore for MemoryStore {
    async fn publish(&self, date: NaiveDate, schedule: &Schedule) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.schedules.contains_key(&date) {
            return Err(StoreError::AlreadyExists(date));
        }
        inner.schedules.insert(date, schedule.clone());
        Ok(())
    }

    async fn retrieve(&self, date: NaiveDate) -> Result<Schedule, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .schedules
            .get(&date)
            .cloned()
            .ok_or(StoreError::NotFound(date))
    }
}
