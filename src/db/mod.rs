//! Database module for PostgreSQL connection and operations
//!
//! The pipeline talks to the database only through the [`Database`] trait:
//! catalog reads for the schema description and the date-column index, and
//! execution of generated SQL.

pub mod connection;
pub mod postgres;

pub use connection::{display_target, init_pool, DbPool};
pub use postgres::PgDatabase;

use crate::error::Result;
use crate::result::ResultTable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One `(table, column)` pair from `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Naming heuristic for date/time columns: the name contains `date` or
/// `time`, ignoring case.
pub fn is_date_like(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower.contains("date") || lower.contains("time")
}

#[async_trait]
pub trait Database: Send + Sync {
    /// Backend name, used in logs
    fn name(&self) -> &'static str;

    /// Every column of every table in the `public` schema, ordered by table
    /// name and then column position.
    async fn list_columns(&self) -> Result<Vec<ColumnRef>>;

    /// Columns whose name passes [`is_date_like`], in catalog order
    async fn list_date_like_columns(&self) -> Result<Vec<ColumnRef>> {
        Ok(self
            .list_columns()
            .await?
            .into_iter()
            .filter(|c| is_date_like(&c.column))
            .collect())
    }

    /// Execute arbitrary SQL text and materialize the result
    async fn execute(&self, sql: &str) -> Result<ResultTable>;
}
