//! Question pipeline
//!
//! schema → SQL → date-column patch → execute → answer, run sequentially for
//! each question. Database failures become [`Notice`]s; language-model
//! failures end the question with an error.

use crate::db::Database;
use crate::error::{ChatError, Result};
use crate::llm::LanguageModel;
use crate::notice::Notice;
use crate::patcher::patch_date_columns;
use crate::result::ResultTable;
use crate::schema::{read_schema, DateColumnIndex};
use crate::synthesizer::{generate_answer, generate_sql};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything produced for one question
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub question: String,
    /// SQL as cleaned from the model reply
    pub sql: String,
    /// SQL actually sent to the database, after the date-column patch
    pub executed_sql: String,
    pub table: ResultTable,
    pub answer: String,
    pub notices: Vec<Notice>,
    pub elapsed_ms: u64,
}

/// Outcome of running one SQL string
#[derive(Debug, Clone)]
pub struct Execution {
    pub executed_sql: String,
    pub table: ResultTable,
    pub notice: Option<Notice>,
}

pub struct SqlChat {
    db: Arc<dyn Database>,
    llm: Arc<dyn LanguageModel>,
    date_columns: RwLock<DateColumnIndex>,
}

impl SqlChat {
    /// Build the date-column index and return a ready pipeline. Fails if the
    /// catalog cannot be read.
    pub async fn start(db: Arc<dyn Database>, llm: Arc<dyn LanguageModel>) -> Result<Self> {
        let index = DateColumnIndex::build(db.as_ref()).await?;
        info!(
            "SQL chat ready: database={}, model={}",
            db.name(),
            llm.model_name()
        );
        Ok(Self::with_index(db, llm, index))
    }

    pub fn with_index(db: Arc<dyn Database>, llm: Arc<dyn LanguageModel>, index: DateColumnIndex) -> Self {
        Self {
            db,
            llm,
            date_columns: RwLock::new(index),
        }
    }

    /// Snapshot of the current date-column index
    pub async fn date_columns(&self) -> DateColumnIndex {
        self.date_columns.read().await.clone()
    }

    /// Rebuild the date-column index from the catalog. On failure the
    /// previous index stays in place.
    pub async fn refresh_date_columns(&self) -> Result<DateColumnIndex> {
        let index = DateColumnIndex::build(self.db.as_ref()).await?;
        *self.date_columns.write().await = index.clone();
        Ok(index)
    }

    /// Current schema description plus any notice from reading it
    pub async fn schema(&self) -> (String, Vec<Notice>) {
        let mut notices = Vec::new();
        let schema = read_schema(self.db.as_ref(), &mut notices).await;
        (schema, notices)
    }

    /// Patch and run `sql`. A database error yields an empty table and a notice.
    pub async fn execute(&self, sql: &str) -> Execution {
        let executed_sql = {
            let index = self.date_columns.read().await;
            patch_date_columns(sql, &index)
        };
        if executed_sql != sql {
            info!("Date columns cast before execution");
        }

        match self.db.execute(&executed_sql).await {
            Ok(table) => Execution {
                executed_sql,
                table,
                notice: None,
            },
            Err(e) => {
                warn!("Query execution failed: {}", e);
                Execution {
                    executed_sql,
                    table: ResultTable::empty(),
                    notice: Some(Notice::execution(&e)),
                }
            }
        }
    }

    /// Run the full pipeline for one question
    pub async fn ask(&self, question: &str) -> Result<ChatTurn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let id = Uuid::new_v4();
        let started = Instant::now();
        info!("[{}] Question: {}", id, question);

        let (schema, mut notices) = self.schema().await;

        let sql = generate_sql(self.llm.as_ref(), question, &schema)
            .await
            .map_err(|e| {
                error!("[{}] SQL generation failed: {}", id, e);
                e
            })?;

        let execution = self.execute(&sql).await;
        notices.extend(execution.notice);
        info!(
            "[{}] Result: {} rows, {} columns",
            id,
            execution.table.row_count(),
            execution.table.column_count()
        );

        let answer = generate_answer(self.llm.as_ref(), question, &execution.table)
            .await
            .map_err(|e| {
                error!("[{}] Answer generation failed: {}", id, e);
                e
            })?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!("[{}] Answered in {}ms", id, elapsed_ms);

        Ok(ChatTurn {
            id,
            question: question.to_string(),
            sql,
            executed_sql: execution.executed_sql,
            table: execution.table,
            answer,
            notices,
            elapsed_ms,
        })
    }
}
