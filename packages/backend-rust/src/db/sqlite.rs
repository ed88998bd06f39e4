use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use pecs_algo::Trend;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{ActivityRecord, ActivityStore, SessionRecord, SessionSummaryRecord, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS "adaptive_sessions" (
        "id" TEXT PRIMARY KEY,
        "learner_id" TEXT NOT NULL,
        "initial_difficulty" INTEGER NOT NULL,
        "settings" TEXT NOT NULL,
        "started_at" TEXT NOT NULL,
        "ended_at" TEXT,
        "duration_seconds" INTEGER,
        "total_trials" INTEGER,
        "final_difficulty" INTEGER,
        "success_rate" REAL,
        "trend" TEXT,
        "mean_response_time_ms" REAL,
        "recommendation" TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS "adaptive_activities" (
        "id" TEXT PRIMARY KEY,
        "session_id" TEXT NOT NULL,
        "sequence" INTEGER NOT NULL,
        "success" INTEGER NOT NULL,
        "response_time_ms" INTEGER NOT NULL,
        "difficulty" INTEGER NOT NULL,
        "difficulty_after" INTEGER NOT NULL,
        "difficulty_changed" INTEGER NOT NULL,
        "recorded_at" TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS "idx_adaptive_activities_session"
        ON "adaptive_activities" ("session_id", "recorded_at")
    "#,
];

#[derive(Clone)]
pub struct SqliteActivityStore {
    pool: SqlitePool,
}

impl SqliteActivityStore {
    /// Open (creating if needed) the database at `url` and ensure the schema
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!(url = %url, "sqlite activity store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn count_activities(&self, session_id: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM "adaptive_activities" WHERE "session_id" = ?"#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        from_sql_int(count, "count")
    }

    pub async fn load_activities(&self, session_id: &str) -> Result<Vec<ActivityRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "id", "session_id", "sequence", "success", "response_time_ms",
                   "difficulty", "difficulty_after", "difficulty_changed", "recorded_at"
            FROM "adaptive_activities"
            WHERE "session_id" = ?
            ORDER BY "recorded_at" ASC, "sequence" ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_activity_row).collect()
    }

    /// Summary written by `end_session`, if the session has ended
    pub async fn load_summary(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionSummaryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT "id", "ended_at", "duration_seconds", "total_trials", "final_difficulty",
                   "success_rate", "trend", "mean_response_time_ms", "recommendation"
            FROM "adaptive_sessions"
            WHERE "id" = ? AND "ended_at" IS NOT NULL
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_summary_row).transpose()
    }
}

impl ActivityStore for SqliteActivityStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn create_session<'a>(
        &'a self,
        session: &'a SessionRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let settings = serde_json::to_string(&session.settings)?;
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO "adaptive_sessions"
                    ("id", "learner_id", "initial_difficulty", "settings", "started_at")
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&session.id)
            .bind(&session.learner_id)
            .bind(i64::from(session.initial_difficulty))
            .bind(settings)
            .bind(session.started_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn record_activity<'a>(
        &'a self,
        activity: &'a ActivityRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO "adaptive_activities"
                    ("id", "session_id", "sequence", "success", "response_time_ms",
                     "difficulty", "difficulty_after", "difficulty_changed", "recorded_at")
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&activity.id)
            .bind(&activity.session_id)
            .bind(to_sql_int(activity.sequence))
            .bind(activity.success)
            .bind(to_sql_int(activity.response_time_ms))
            .bind(i64::from(activity.difficulty))
            .bind(i64::from(activity.difficulty_after))
            .bind(activity.difficulty_changed)
            .bind(activity.recorded_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn end_session<'a>(
        &'a self,
        summary: &'a SessionSummaryRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE "adaptive_sessions"
                SET "ended_at" = ?, "duration_seconds" = ?, "total_trials" = ?,
                    "final_difficulty" = ?, "success_rate" = ?, "trend" = ?,
                    "mean_response_time_ms" = ?, "recommendation" = ?
                WHERE "id" = ?
                "#,
            )
            .bind(summary.ended_at.to_rfc3339())
            .bind(summary.duration_seconds)
            .bind(to_sql_int(summary.total_trials))
            .bind(i64::from(summary.final_difficulty))
            .bind(summary.success_rate)
            .bind(summary.trend.as_str())
            .bind(summary.mean_response_time_ms)
            .bind(&summary.recommendation)
            .bind(&summary.session_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Unavailable(format!(
                    "session {} was never created in this store",
                    summary.session_id
                )));
            }
            Ok(())
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRow(format!("bad timestamp {raw}: {e}")))
}

/// SQLite integers are signed; counters past `i64::MAX` saturate
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T, StoreError> {
    T::try_from(value).map_err(|_| StoreError::InvalidRow(format!("{column} out of range: {value}")))
}

fn map_activity_row(row: &SqliteRow) -> Result<ActivityRecord, StoreError> {
    let recorded_at: String = row.try_get("recorded_at")?;
    let sequence: i64 = row.try_get("sequence")?;
    let response_time_ms: i64 = row.try_get("response_time_ms")?;
    let difficulty: i64 = row.try_get("difficulty")?;
    let difficulty_after: i64 = row.try_get("difficulty_after")?;

    Ok(ActivityRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        sequence: from_sql_int(sequence, "sequence")?,
        success: row.try_get("success")?,
        response_time_ms: from_sql_int(response_time_ms, "response_time_ms")?,
        difficulty: from_sql_int(difficulty, "difficulty")?,
        difficulty_after: from_sql_int(difficulty_after, "difficulty_after")?,
        difficulty_changed: row.try_get("difficulty_changed")?,
        recorded_at: parse_timestamp(&recorded_at)?,
    })
}

fn map_summary_row(row: &SqliteRow) -> Result<SessionSummaryRecord, StoreError> {
    let ended_at: String = row.try_get("ended_at")?;
    let total_trials: i64 = row.try_get("total_trials")?;
    let final_difficulty: i64 = row.try_get("final_difficulty")?;
    let trend: String = row.try_get("trend")?;

    Ok(SessionSummaryRecord {
        session_id: row.try_get("id")?,
        ended_at: parse_timestamp(&ended_at)?,
        duration_seconds: row.try_get("duration_seconds")?,
        total_trials: from_sql_int(total_trials, "total_trials")?,
        final_difficulty: from_sql_int(final_difficulty, "final_difficulty")?,
        success_rate: row.try_get("success_rate")?,
        trend: Trend::parse(&trend),
        mean_response_time_ms: row.try_get("mean_response_time_ms")?,
        recommendation: row.try_get("recommendation")?,
    })
}
