//! Natural-language questions over a PostgreSQL database.
//!
//! A question is answered in one sequential pass: the catalog is rendered as a
//! schema description, a language model writes SQL for it, quoted date-like
//! columns are cast when the SQL uses date functions, the SQL runs, and the
//! model summarizes the result.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod notice;
pub mod patcher;
pub mod pipeline;
pub mod result;
pub mod schema;
pub mod synthesizer;
pub mod web;

pub use config::{AppConfig, LlmProvider};
pub use db::{ColumnRef, Database, PgDatabase};
pub use error::{ChatError, Result};
pub use llm::{LanguageModel, LlmClient};
pub use notice::{Notice, Stage};
pub use pipeline::{ChatTurn, SqlChat};
pub use result::ResultTable;
pub use schema::DateColumnIndex;
