use super::query::{IndexQuery, SearchOptions, SearchResult, SearchResults};
use super::{IndexOperationSummary, SearchIndex};
use crate::error::IndexResult;
use crate::validation::{ValidationStatus, Validator};
use crate::value_set::{FieldValue, ValueSet, fields};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub name: String,
    pub published_values_only: bool,
    pub enable_default_event_handler: bool,
}

impl IndexOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            published_values_only: false,
            enable_default_event_handler: true,
        }
    }

    pub fn published_values_only(mut self, value: bool) -> Self {
        self.published_values_only = value;
        self
    }

    pub fn enable_default_event_handler(mut self, value: bool) -> Self {
        self.enable_default_event_handler = value;
        self
    }
}

/// SQLite-backed index, one database file per index.
///
/// Every stored value lives in `fields`; text values of non-raw fields are also
/// concatenated into the FTS5 `contents` table.
pub struct SqliteIndex {
    pool: SqlitePool,
    db_path: PathBuf,
    options: IndexOptions,
    validator: Arc<dyn Validator>,
}

impl SqliteIndex {
    pub async fn open(
        dir: &Path,
        options: IndexOptions,
        validator: Arc<dyn Validator>,
    ) -> IndexResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let db_path = dir.join(format!("{}.db", options.name));
        let connection_path = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePool::connect(&connection_path).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                item_type TEXT NOT NULL,
                path TEXT NOT NULL DEFAULT '',
                indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fields (
                doc_id TEXT NOT NULL,
                name TEXT NOT NULL,
                position INTEGER NOT NULL,
                kind TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (doc_id, name, position)
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS fields_name_value ON fields (name, value)")
            .execute(&pool)
            .await?;

        sqlx::query("CREATE VIRTUAL TABLE IF NOT EXISTS contents USING fts5(doc_id UNINDEXED, content)")
            .execute(&pool)
            .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS index_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;

        Ok(SqliteIndex {
            pool,
            db_path,
            options,
            validator,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn mark_created(conn: &mut SqliteConnection) -> IndexResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO index_meta (key, value) VALUES ('created', CURRENT_TIMESTAMP)",
        )
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove_document(conn: &mut SqliteConnection, id: &str) -> IndexResult<bool> {
        sqlx::query("DELETE FROM fields WHERE doc_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM contents WHERE doc_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        let res = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn write_document(conn: &mut SqliteConnection, value_set: &ValueSet) -> IndexResult<()> {
        Self::remove_document(conn, value_set.id()).await?;

        sqlx::query("INSERT INTO documents (id, category, item_type, path) VALUES (?, ?, ?, ?)")
            .bind(value_set.id())
            .bind(value_set.category().as_str())
            .bind(value_set.item_type())
            .bind(value_set.first_value(fields::PATH).unwrap_or_default())
            .execute(&mut *conn)
            .await?;

        let mut text = Vec::new();
        for (key, values) in value_set.values() {
            let name = key.index_name();
            for (position, value) in values.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO fields (doc_id, name, position, kind, value) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(value_set.id())
                .bind(&name)
                .bind(position as i64)
                .bind(value.kind())
                .bind(value.as_index_string())
                .execute(&mut *conn)
                .await?;

                if let FieldValue::Text(s) = value {
                    if !key.is_raw() && !s.trim().is_empty() {
                        text.push(s.as_str());
                    }
                }
            }
        }

        sqlx::query("INSERT INTO contents (doc_id, content) VALUES (?, ?)")
            .bind(value_set.id())
            .bind(text.join(" "))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn load_values(&self, id: &str) -> IndexResult<BTreeMap<String, Vec<String>>> {
        let rows = sqlx::query("SELECT name, value FROM fields WHERE doc_id = ? ORDER BY name, position")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let name: String = row.get(0);
            let value: String = row.get(1);
            values.entry(name).or_default().push(value);
        }
        Ok(values)
    }
}

#[async_trait]
impl SearchIndex for SqliteIndex {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn published_values_only(&self) -> bool {
        self.options.published_values_only
    }

    fn enable_default_event_handler(&self) -> bool {
        self.options.enable_default_event_handler
    }

    fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    async fn index_exists(&self) -> IndexResult<bool> {
        let row = sqlx::query("SELECT value FROM index_meta WHERE key = 'created'")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_index(&self) -> IndexResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM fields").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM contents").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;
        Self::mark_created(&mut tx).await?;
        tx.commit().await?;

        debug!(index = %self.options.name, "index created");
        Ok(())
    }

    async fn index_items(&self, items: Vec<ValueSet>) -> IndexResult<IndexOperationSummary> {
        let mut summary = IndexOperationSummary::default();
        let mut tx = self.pool.begin().await?;

        for item in items {
            let result = self.validator.validate(&item);
            match result.status {
                ValidationStatus::Valid => {
                    Self::write_document(&mut tx, &result.value_set).await?;
                    summary.indexed += 1;
                }
                ValidationStatus::Filtered => {
                    if Self::remove_document(&mut tx, item.id()).await? {
                        summary.removed += 1;
                    }
                }
                ValidationStatus::Failed => {
                    debug!(
                        index = %self.options.name,
                        id = item.id(),
                        item_type = item.item_type(),
                        "value set failed validation"
                    );
                    summary.rejected += 1;
                }
            }
        }

        Self::mark_created(&mut tx).await?;
        tx.commit().await?;
        Ok(summary)
    }

    async fn delete_from_index(&self, id: &str) -> IndexResult<u64> {
        // Descendants carry the id as an inner or final path segment.
        const MATCHING: &str = "SELECT id FROM documents
             WHERE id = ?
                OR path LIKE '%,' || ? || ',%'
                OR path LIKE '%,' || ?";

        // Write-only, so the lock is taken by the first statement.
        let mut tx = self.pool.begin().await?;
        for table in ["fields", "contents"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE doc_id IN ({MATCHING})"))
                .bind(id)
                .bind(id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let res = sqlx::query(&format!("DELETE FROM documents WHERE id IN ({MATCHING})"))
            .bind(id)
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(res.rows_affected())
    }

    async fn search(&self, query: &IndexQuery, options: &SearchOptions) -> IndexResult<SearchResults> {
        let limit = options.take as i64;
        let offset = options.skip as i64;

        let (total, hits): (i64, Vec<(String, f64)>) = match query {
            IndexQuery::All => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query("SELECT id FROM documents ORDER BY id LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?;
                (total, rows.iter().map(|r| (r.get::<String, _>(0), 0.0)).collect())
            }
            IndexQuery::Field { name, value } => {
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(DISTINCT doc_id) FROM fields WHERE name = ? AND value = ?",
                )
                .bind(name)
                .bind(value)
                .fetch_one(&self.pool)
                .await?;
                let rows = sqlx::query(
                    "SELECT DISTINCT doc_id FROM fields
                     WHERE name = ? AND value = ?
                     ORDER BY doc_id
                     LIMIT ? OFFSET ?",
                )
                .bind(name)
                .bind(value)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, rows.iter().map(|r| (r.get::<String, _>(0), 0.0)).collect())
            }
            IndexQuery::Text(text) => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE contents MATCH ?")
                    .bind(text)
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(
                    r#"
                    SELECT doc_id, bm25(contents) as rank
                    FROM contents
                    WHERE contents MATCH ?
                    ORDER BY rank
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(text)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (
                    total,
                    rows.iter()
                        .map(|r| (r.get::<String, _>(0), -r.get::<f64, _>(1)))
                        .collect(),
                )
            }
        };

        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let values = self.load_values(&id).await?;
            results.push(SearchResult { id, score, values });
        }

        Ok(SearchResults {
            total_item_count: total as u64,
            results,
        })
    }

    async fn document_count(&self) -> IndexResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn field_names(&self) -> IndexResult<Vec<String>> {
        let names = sqlx::query_scalar("SELECT DISTINCT name FROM fields ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}
