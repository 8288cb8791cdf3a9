use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{QaRow, QaStore};
use crate::core::errors::PipelineError;

/// SQLite bind-parameter budget per statement, with headroom below the default limit.
const MAX_BINDS: usize = 900;

#[derive(Clone)]
pub struct SqliteQaStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteQaStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, PipelineError> {
        if let Some(parent) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                PipelineError::Store(format!(
                    "failed to create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), PipelineError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS question_answering (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                question TEXT NOT NULL,
                answer TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_question_answering_question
             ON question_answering(question)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl QaStore for SqliteQaStore {
    async fn insert_rows(&self, rows: &[QaRow]) -> Result<usize, PipelineError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_BINDS / 3) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO question_answering (id, question, answer) ");
            builder.push_values(chunk, |mut row, qa| {
                row.push_bind(&qa.id)
                    .push_bind(&qa.question)
                    .push_bind(&qa.answer);
            });
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;

        tracing::debug!(rows = inserted, "question/answer rows stored");
        Ok(inserted)
    }

    async fn lookup_questions(&self, ids: &[String]) -> Result<Vec<String>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<String, String> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BINDS) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id, question FROM question_answering WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in rows {
                found.insert(row.get("id"), row.get("question"));
            }
        }

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    async fn clear(&self) -> Result<usize, PipelineError> {
        let result = sqlx::query("DELETE FROM question_answering")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn answers_for_question(&self, question: &str) -> Result<Vec<String>, PipelineError> {
        let answers = sqlx::query_scalar(
            "SELECT answer FROM question_answering WHERE question = ?1 ORDER BY idx",
        )
        .bind(question)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question_answering")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
