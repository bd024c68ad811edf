//! Schema description and date-column index
//!
//! Both are derived from `information_schema.columns`. The schema description
//! is rebuilt for every question; the date-column index is built once at
//! start-up and only changes through an explicit refresh.

use crate::db::{ColumnRef, Database};
use crate::error::Result;
use crate::notice::Notice;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Render catalog columns as `Table: <name>` / `Columns: a, b` blocks, one
/// block per run of consecutive rows sharing a table name.
pub fn describe_columns(columns: &[ColumnRef]) -> String {
    let mut out = String::new();
    let mut current_table: Option<&str> = None;

    for col in columns {
        if current_table != Some(col.table.as_str()) {
            out.push_str(&format!("\nTable: {}\nColumns: {}", col.table, col.column));
            current_table = Some(col.table.as_str());
        } else {
            out.push_str(", ");
            out.push_str(&col.column);
        }
    }

    out
}

/// Read the schema description. A database failure is pushed onto `notices`
/// and an empty description is returned.
pub async fn read_schema(db: &dyn Database, notices: &mut Vec<Notice>) -> String {
    match db.list_columns().await {
        Ok(columns) => describe_columns(&columns),
        Err(e) => {
            warn!("Schema read failed: {}", e);
            notices.push(Notice::schema(&e));
            String::new()
        }
    }
}

/// Table name → date/time-like column names, in catalog order per table.
///
/// The index is a snapshot: columns added or renamed after [`build`] are not
/// seen until the owner rebuilds it.
///
/// [`build`]: DateColumnIndex::build
#[derive(Debug, Clone, Default, Serialize)]
pub struct DateColumnIndex {
    tables: BTreeMap<String, Vec<String>>,
    built_at: DateTime<Utc>,
}

impl DateColumnIndex {
    pub fn from_columns<I>(columns: I) -> Self
    where
        I: IntoIterator<Item = ColumnRef>,
    {
        let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for ColumnRef { table, column } in columns {
            let entry = tables.entry(table).or_default();
            if !entry.contains(&column) {
                entry.push(column);
            }
        }
        Self {
            tables,
            built_at: Utc::now(),
        }
    }

    /// Query the catalog for date-like columns
    pub async fn build(db: &dyn Database) -> Result<Self> {
        let columns = db.list_date_like_columns().await?;
        let index = Self::from_columns(columns);
        info!(
            "Date-column index built: {} tables, {} columns",
            index.tables.len(),
            index.column_count()
        );
        Ok(index)
    }

    pub fn tables(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tables
    }

    pub fn columns_for(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(|cols| cols.as_slice())
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Every indexed column name once, regardless of table
    pub fn distinct_columns(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for column in self.tables.values().flatten() {
            if !seen.contains(&column.as_str()) {
                seen.push(column.as_str());
            }
        }
        seen
    }
}
