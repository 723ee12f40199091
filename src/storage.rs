//! SQLite persistence for raw records.
//!
//! One table holds every outlet's records, keyed for deduplication by
//! `(company_id, url_pattern)`. Uniqueness is enforced by the writer, not
//! by a UNIQUE constraint: it snapshots the existing keys, filters the
//! batch (in-batch duplicates included), and inserts the remainder inside
//! a single transaction. Repeating a run against an unchanged outlet
//! therefore inserts nothing.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::Path;

use itertools::Itertools;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, instrument};

use crate::models::RawRecord;

/// Handle to the raw-news database.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open the database at `path`, creating the file and its parent
    /// directories when missing.
    pub async fn open(path: &str) -> Result<Self, Box<dyn Error>> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let url = format!("sqlite:{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        info!(path, "database ready");
        Ok(storage)
    }

    /// In-memory database for tests.
    pub async fn open_in_memory() -> Result<Self, Box<dyn Error>> {
        // Each pooled connection to `sqlite::memory:` gets its own database,
        // so the pool must stay at a single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), Box<dyn Error>> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL,
                url_pattern TEXT NOT NULL,
                raw_content TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_news_company ON news (company_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Snapshot the `url_pattern`s already stored for one company.
    pub async fn existing_patterns(
        &self,
        company_id: i64,
    ) -> Result<HashSet<String>, Box<dyn Error>> {
        let rows = sqlx::query("SELECT url_pattern FROM news WHERE company_id = ?")
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;

        let mut patterns = HashSet::with_capacity(rows.len());
        for row in rows {
            patterns.insert(row.try_get("url_pattern")?);
        }
        Ok(patterns)
    }

    /// Insert the previously-unseen records of a batch, in one transaction.
    ///
    /// Records whose `(company_id, url_pattern)` key is already stored are
    /// dropped, as are duplicate keys inside the batch itself (first
    /// occurrence wins).
    ///
    /// # Returns
    ///
    /// How many records were actually inserted.
    #[instrument(level = "info", skip_all, fields(batch = records.len()))]
    pub async fn write_new_records(&self, records: &[RawRecord]) -> Result<usize, Box<dyn Error>> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut existing: HashMap<i64, HashSet<String>> = HashMap::new();
        for company_id in records.iter().map(|r| r.company_id).unique() {
            existing.insert(company_id, self.existing_patterns(company_id).await?);
        }

        let fresh: Vec<&RawRecord> = records
            .iter()
            .unique_by(|r| (r.company_id, r.url_pattern.as_str()))
            .filter(|r| !existing[&r.company_id].contains(&r.url_pattern))
            .collect();

        if fresh.is_empty() {
            debug!("nothing new in this batch");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for record in &fresh {
            sqlx::query("INSERT INTO news (company_id, url_pattern, raw_content) VALUES (?, ?, ?)")
                .bind(record.company_id)
                .bind(&record.url_pattern)
                .bind(&record.raw_content)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(
            inserted = fresh.len(),
            skipped = records.len() - fresh.len(),
            "batch committed"
        );
        Ok(fresh.len())
    }

    /// Rows stored for one company.
    pub async fn count_for(&self, company_id: i64) -> Result<i64, Box<dyn Error>> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM news WHERE company_id = ?")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

/// One row read back from the `news` table.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredRecord {
    pub idx: i64,
    pub company_id: i64,
    pub url_pattern: String,
    pub raw_content: String,
}

#[cfg(test)]
impl Storage {
    /// Every row for one company, in insertion order.
    pub(crate) async fn read_all(
        &self,
        company_id: i64,
    ) -> Result<Vec<StoredRecord>, Box<dyn Error>> {
        let rows = sqlx::query(
            "SELECT idx, company_id, url_pattern, raw_content \
             FROM news WHERE company_id = ? ORDER BY idx",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(StoredRecord {
                idx: row.try_get("idx")?,
                company_id: row.try_get("company_id")?,
                url_pattern: row.try_get("url_pattern")?,
                raw_content: row.try_get("raw_content")?,
            });
        }
        Ok(records)
    }
}
