use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::{
        error::DbResult,
        repos::{LogRepo, sql_limit},
    },
    models::{CreateLogEntry, LogDataset, LogEntry},
};

pub struct PostgresLogRepo {
    pool: PgPool,
}

impl PostgresLogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepo for PostgresLogRepo {
    async fn create(&self, dataset: LogDataset, input: CreateLogEntry) -> DbResult<LogEntry> {
        let id = Uuid::new_v4();
        let created_at = input.created_at.unwrap_or_else(Utc::now);

        let sql = format!(
            r#"
            INSERT INTO {} (
                id, created_at, url, sent_to, referrer, user_agent, ip_address, http_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            dataset.table_name()
        );

        sqlx::query(&sql)
            .bind(id)
            .bind(created_at)
            .bind(&input.url)
            .bind(&input.sent_to)
            .bind(&input.referrer)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .bind(input.http_code)
            .execute(&self.pool)
            .await?;

        Ok(LogEntry {
            id,
            created_at,
            url: input.url,
            sent_to: input.sent_to,
            referrer: input.referrer,
            user_agent: input.user_agent,
            ip_address: input.ip_address,
            http_code: input.http_code,
        })
    }

    async fn count(&self, dataset: LogDataset) -> DbResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", dataset.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    // ==================== Retention Operations ====================

    async fn delete_expired(
        &self,
        dataset: LogDataset,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> DbResult<u64> {
        let table = dataset.table_name();

        let sql = format!(
            r#"
            DELETE FROM {table}
            WHERE ctid IN (
                SELECT ctid FROM {table}
                WHERE created_at < $1
                ORDER BY created_at
                LIMIT $2
            )
            "#
        );

        let result = sqlx::query(&sql)
            .bind(cutoff)
            .bind(sql_limit(limit))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_expired(
        &self,
        dataset: LogDataset,
        cutoff: DateTime<Utc>,
        cap: u64,
    ) -> DbResult<u64> {
        // Runs on the primary: the estimate must see the rows this cycle
        // just deleted, which a lagging replica may not.
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM (
                SELECT 1 FROM {}
                WHERE created_at < $1
                LIMIT $2
            ) AS expired
            "#,
            dataset.table_name()
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(cutoff)
            .bind(sql_limit(cap))
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn compact(&self, dataset: LogDataset) -> DbResult<()> {
        // VACUUM refuses to run inside a transaction block, so send it over
        // the simple query protocol.
        let sql = format!("VACUUM (ANALYZE) {}", dataset.table_name());
        sqlx::raw_sql(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
