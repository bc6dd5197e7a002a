//! Postgres-backed store.
//!
//! The conflict check and the insert for a termination run inside one
//! SERIALIZABLE transaction. When two engine processes race on the same
//! group, Postgres aborts one side with a serialization failure
//! (SQLSTATE 40001 or 40P01), surfaced as [`StoreError::TxConflict`]. A
//! retry then sees the winner's row and fails the check instead.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use havoc_model::{AppConfig, Grouping, MinTimeViolation, Termination};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{QueryBuilder, Row};
use tracing::info;

use super::{no_kills_since, Checker, SchedStore, StoreError, TerminationRecord};
use crate::schedule::Schedule;

/// SQLSTATE codes Postgres raises when a serializable transaction loses.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
/// Unique constraint violation, raised on double publish.
const UNIQUE_VIOLATION: &str = "23505";

/// Store backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a new pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations.
    ///
    /// Looks for the migrations directory relative to the working
    /// directory first, then falls back to the crate source tree.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("running database migrations");

        let candidates = [
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/engine/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error = None;
        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "loaded migrations");
                    migrator
                        .run(&self.pool)
                        .await
                        .map_err(|e| StoreError::Query(sqlx::Error::Migrate(Box::new(e))))?;
                    info!("database migrations complete");
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(StoreError::Migration(format!(
            "no migrations directory found: {}",
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        )))
    }

    /// All terminations recorded at or after `since`, oldest first.
    pub async fn terminations_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TerminationRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT app, account, region, stack, cluster, asg, instance_id, killed_at, leashed
            FROM terminations
            WHERE killed_at >= $1
            ORDER BY killed_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &PgRow) -> Result<TerminationRecord, StoreError> {
    Ok(TerminationRecord {
        app: row.try_get("app")?,
        account: row.try_get("account")?,
        region: row.try_get("region")?,
        stack: row.try_get("stack")?,
        cluster: row.try_get("cluster")?,
        asg: row.try_get("asg")?,
        instance_id: row.try_get("instance_id")?,
        killed_at: row.try_get("killed_at")?,
        leashed: row.try_get("leashed")?,
    })
}

/// Map serialization failures to [`StoreError::TxConflict`].
fn map_tx_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ) {
            return StoreError::TxConflict(db_err.message().to_string());
        }
    }
    StoreError::Query(e)
}

/// The most recent conflicting kill query, scoped by the app's policy.
///
/// All conflicts share app and account. `Stack` grouping adds the stack
/// column, `Cluster` adds the cluster column. Independent regions add
/// the region column. An unleashed proposal ignores leashed history.
fn conflict_query<'a>(
    record: &'a TerminationRecord,
    app_cfg: &AppConfig,
    since: DateTime<Utc>,
) -> QueryBuilder<'a, sqlx::Postgres> {
    let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "SELECT instance_id, killed_at FROM terminations WHERE app = ",
    );
    qb.push_bind(&record.app);
    qb.push(" AND account = ");
    qb.push_bind(&record.account);

    match app_cfg.grouping {
        Grouping::App => {}
        Grouping::Stack => {
            qb.push(" AND stack = ");
            qb.push_bind(&record.stack);
        }
        Grouping::Cluster => {
            qb.push(" AND cluster = ");
            qb.push_bind(&record.cluster);
        }
    }
    if app_cfg.regions_are_independent {
        qb.push(" AND region = ");
        qb.push_bind(&record.region);
    }
    if !record.leashed {
        qb.push(" AND leashed = FALSE");
    }

    qb.push(" AND killed_at >= ");
    qb.push_bind(since);
    qb.push(" ORDER BY killed_at DESC LIMIT 1");
    qb
}

#[async_trait]
impl Checker for PgStore {
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

        let mut tx = self.pool.begin().await.map_err(map_tx_err)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_tx_err)?;

        let conflict = conflict_query(&record, app_cfg, since)
            .build()
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_tx_err)?;
        if let Some(row) = conflict {
            return Err(MinTimeViolation {
                instance_id: row.try_get("instance_id")?,
                killed_at: row.try_get("killed_at")?,
                tz: Some(tz),
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO terminations (
                app, account, region, stack, cluster, asg, instance_id, killed_at, leashed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&record.app)
        .bind(&record.account)
        .bind(&record.region)
        .bind(&record.stack)
        .bind(&record.cluster)
        .bind(&record.asg)
        .bind(&record.instance_id)
        .bind(record.killed_at)
        .bind(record.leashed)
        .execute(&mut *tx)
        .await
        .map_err(map_tx_err)?;

        tx.commit().await.map_err(map_tx_err)?;
        Ok(())
    }
}

#[async_trait]
impl SchedStore for PgStore {
    async fn publish(&self, date: NaiveDate, schedule: &Schedule) -> Result<(), StoreError> {
        let entries = serde_json::to_value(schedule)
            .map_err(|e| StoreError::Query(sqlx::Error::Encode(Box::new(e))))?;

        sqlx::query("INSERT INTO schedules (date, entries) VALUES ($1, $2)")
            .bind(date)
            .bind(entries)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                        return StoreError::AlreadyExists(date);
                    }
                }
                StoreError::Query(e)
            })?;

        info!(%date, entries = schedule.entries().len(), "schedule published");
        Ok(())
    }

    async fn retrieve(&self, date: NaiveDate) -> Result<Schedule, StoreError> {
        let row = sqlx::query("SELECT entries FROM schedules WHERE date = $1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(date))?;

        let entries: serde_json::Value = row.try_get("entries")?;
        serde_json::from_value(entries)
            .map_err(|e| StoreError::Query(sqlx::Error::Decode(Box::new(e))))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use havoc_model::Grouping;
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(leashed: bool) -> TerminationRecord {
        TerminationRecord {
            app: "abc".into(),
            account: "prod".into(),
            region: "us-east-1".into(),
            stack: "staging".into(),
            cluster: "abc-staging".into(),
            asg: "abc-staging-v001".into(),
            instance_id: "i-12345678".into(),
            killed_at: Utc::now(),
            leashed,
        }
    }

    fn policy(grouping: Grouping, independent: bool) -> AppConfig {
        AppConfig {
            grouping,
            regions_are_independent: independent,
            ..AppConfig::with_exceptions(vec![])
        }
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 12, 16, 23, 0, 0).unwrap()
    }

    #[test]
    fn test_conflict_query_app_grouping() {
        let record = record(false);
        let qb = conflict_query(&record, &policy(Grouping::App, false), since());
        assert_eq!(
            qb.sql(),
            "SELECT instance_id, killed_at FROM terminations WHERE app = $1 \
             AND account = $2 AND leashed = FALSE AND killed_at >= $3 \
             ORDER BY killed_at DESC LIMIT 1"
        );
    }

    #[test]
    fn test_conflict_query_cluster_grouping_independent_regions() {
        let record = record(false);
        let qb = conflict_query(&record, &policy(Grouping::Cluster, true), since());
        assert_eq!(
            qb.sql(),
            "SELECT instance_id, killed_at FROM terminations WHERE app = $1 \
             AND account = $2 AND cluster = $3 AND region = $4 \
             AND leashed = FALSE AND killed_at >= $5 \
             ORDER BY killed_at DESC LIMIT 1"
        );
    }

    #[test]
    fn test_conflict_query_stack_grouping() {
        let record = record(false);
        let qb = conflict_query(&record, &policy(Grouping::Stack, false), since());
        assert!(qb.sql().contains("AND stack = $3"));
        assert!(!qb.sql().contains("cluster"));
        assert!(!qb.sql().contains("region"));
    }

    #[test]
    fn test_conflict_query_leashed_proposal_sees_all_history() {
        let record = record(true);
        let qb = conflict_query(&record, &policy(Grouping::App, false), since());
        assert!(!qb.sql().contains("leashed"));
    }
}
