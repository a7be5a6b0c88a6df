use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{
        error::DbResult,
        repos::{LogRepo, sql_limit},
    },
    models::{CreateLogEntry, LogDataset, LogEntry},
};

pub struct SqliteLogRepo {
    pool: SqlitePool,
}

impl SqliteLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepo for SqliteLogRepo {
    async fn create(&self, dataset: LogDataset, input: CreateLogEntry) -> DbResult<LogEntry> {
        let id = Uuid::new_v4();
        let created_at = input.created_at.unwrap_or_else(Utc::now);

        let sql = format!(
            r#"
            INSERT INTO {} (
                id, created_at, url, sent_to, referrer, user_agent, ip_address, http_code
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            dataset.table_name()
        );

        sqlx::query(&sql)
            .bind(id.to_string())
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

        // SQLite has no DELETE ... LIMIT without a compile-time flag, so pick
        // the victims in a bounded subquery.
        let sql = format!(
            r#"
            DELETE FROM {table}
            WHERE id IN (
                SELECT id FROM {table}
                WHERE created_at < ?
                ORDER BY created_at
                LIMIT ?
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
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM (
                SELECT 1 FROM {}
                WHERE created_at < ?
                LIMIT ?
            )
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
        // VACUUM is database-wide in SQLite; rebuilding the table's indexes is
        // the per-table equivalent.
        let sql = format!("REINDEX {}", dataset.table_name());
        sqlx::raw_sql(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
