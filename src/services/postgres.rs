use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::MatchRecord;
use crate::services::store::{MatchStore, PersistenceError};

/// Errors that can occur when setting up PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

/// PostgreSQL match store
///
/// Writes straight to the `startup_investor_matches` table. Unlike the REST
/// store, a replace runs inside one transaction, so readers never observe
/// the gap between the delete and the insert.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
        run_migrations: bool,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
        run_migrations: bool,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
            run_migrations,
        )
        .await
    }

    /// Count stored matches for a startup
    pub async fn count_matches(&self, startup_id: &str) -> Result<i64, PostgresError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM startup_investor_matches WHERE startup_id = $1",
        )
        .bind(startup_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Column arrays for one `UNNEST` insert
///
/// `rank` is the position in the ranked set, so ties keep pool order when
/// read back.
#[derive(Debug, PartialEq)]
struct MatchRows {
    ids: Vec<Uuid>,
    startup_ids: Vec<String>,
    investor_ids: Vec<String>,
    scores: Vec<i32>,
    ranks: Vec<i32>,
}

impl MatchRows {
    fn from_records(matches: &[MatchRecord]) -> Self {
        Self {
            ids: matches.iter().map(|_| Uuid::new_v4()).collect(),
            startup_ids: matches.iter().map(|m| m.startup_id.clone()).collect(),
            investor_ids: matches.iter().map(|m| m.investor_id.clone()).collect(),
            scores: matches.iter().map(|m| i32::from(m.score)).collect(),
            ranks: (0..matches.len())
                .map(|i| i32::try_from(i).unwrap_or(i32::MAX))
                .collect(),
        }
    }
}

/// A failed statement inside the replace transaction
///
/// The transaction is dropped without commit, so the previous rows survive
/// and the error is never partial.
fn rolled_back(startup_id: &str, step: &str, e: sqlx::Error) -> PersistenceError {
    PersistenceError::TransactionFailed {
        startup_id: startup_id.to_string(),
        message: format!("{} rolled back: {}", step, e),
    }
}

#[async_trait]
impl MatchStore for PostgresClient {
    async fn replace_matches(
        &self,
        startup_id: &str,
        matches: &[MatchRecord],
    ) -> Result<(), PersistenceError> {
        let tx_error = |e: sqlx::Error| PersistenceError::TransactionFailed {
            startup_id: startup_id.to_string(),
            message: e.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(tx_error)?;

        let deleted = sqlx::query("DELETE FROM startup_investor_matches WHERE startup_id = $1")
            .bind(startup_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| rolled_back(startup_id, "delete", e))?;

        if !matches.is_empty() {
            let rows = MatchRows::from_records(matches);

            let query = r#"
                INSERT INTO startup_investor_matches (id, startup_id, investor_id, match_score, rank)
                SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::int4[], $5::int4[])
            "#;

            sqlx::query(query)
                .bind(&rows.ids)
                .bind(&rows.startup_ids)
                .bind(&rows.investor_ids)
                .bind(&rows.scores)
                .bind(&rows.ranks)
                .execute(&mut *tx)
                .await
                .map_err(|e| rolled_back(startup_id, "insert", e))?;
        }

        tx.commit().await.map_err(tx_error)?;

        tracing::debug!(
            "Replaced {} matches with {} for startup {}",
            deleted.rows_affected(),
            matches.len(),
            startup_id
        );

        Ok(())
    }

    async fn list_matches(
        &self,
        startup_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, PersistenceError> {
        let query = r#"
            SELECT startup_id, investor_id, match_score
            FROM startup_investor_matches
            WHERE startup_id = $1
            ORDER BY match_score DESC, rank ASC
            LIMIT $2
        "#;

        let read_error = |e: sqlx::Error| PersistenceError::ReadFailed {
            startup_id: startup_id.to_string(),
            message: e.to_string(),
        };

        let rows = sqlx::query(query)
            .bind(startup_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(read_error)?;

        rows.iter()
            .map(|row| {
                let score: i32 = row.try_get("match_score").map_err(read_error)?;
                Ok(MatchRecord {
                    startup_id: row.try_get("startup_id").map_err(read_error)?,
                    investor_id: row.try_get("investor_id").map_err(read_error)?,
                    score: score.clamp(0, i32::from(u8::MAX)) as u8,
                })
            })
            .collect()
    }
}
