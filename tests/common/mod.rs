//! In-memory stand-ins for the database and the language model

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use sql_chat::db::{ColumnRef, Database};
use sql_chat::error::{ChatError, Result};
use sql_chat::llm::LanguageModel;
use sql_chat::result::ResultTable;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct FakeDatabase {
    pub columns: Mutex<Vec<ColumnRef>>,
    pub catalog_error: Mutex<Option<String>>,
    pub execution_error: Option<String>,
    /// First entry whose needle occurs in the SQL supplies the result
    pub results: Vec<(String, ResultTable)>,
    pub executed: Mutex<Vec<String>>,
}

impl FakeDatabase {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self {
            columns: Mutex::new(columns),
            catalog_error: Mutex::new(None),
            execution_error: None,
            results: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(mut self, needle: &str, table: ResultTable) -> Self {
        self.results.push((needle.to_string(), table));
        self
    }

    pub fn failing_execution(mut self, message: &str) -> Self {
        self.execution_error = Some(message.to_string());
        self
    }

    pub fn set_catalog_error(&self, message: Option<&str>) {
        *self.catalog_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn add_column(&self, table: &str, column: &str) {
        self.columns.lock().unwrap().push(ColumnRef::new(table, column));
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_columns(&self) -> Result<Vec<ColumnRef>> {
        if let Some(message) = self.catalog_error.lock().unwrap().clone() {
            return Err(ChatError::Database(message));
        }
        Ok(self.columns.lock().unwrap().clone())
    }

    async fn execute(&self, sql: &str) -> Result<ResultTable> {
        self.executed.lock().unwrap().push(sql.to_string());
        if let Some(message) = &self.execution_error {
            return Err(ChatError::Database(message.clone()));
        }
        Ok(self
            .results
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, table)| table.clone())
            .unwrap_or_default())
    }
}

type AnswerFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Replies with fixed SQL to SQL prompts and with `answer` to answer prompts
pub struct ScriptedModel {
    sql_reply: String,
    answer: AnswerFn,
    fail_with: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(sql_reply: &str, answer: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            sql_reply: sql_reply.to_string(),
            answer: Box::new(answer),
            fail_with: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sql_reply: String::new(),
            answer: Box::new(|_| String::new()),
            fail_with: Some(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(message) = &self.fail_with {
            return Err(ChatError::Llm(message.clone()));
        }
        if prompt.contains("Your task is to write a SQL query") {
            Ok(self.sql_reply.clone())
        } else {
            Ok((self.answer)(prompt))
        }
    }
}

/// Answers by restating every `year | count` line of the rendered table
pub fn summarize_year_counts(prompt: &str) -> String {
    let counts: Vec<String> = prompt
        .lines()
        .filter_map(|line| {
            let (year, count) = line.split_once(" | ")?;
            let year: u32 = year.trim().parse().ok()?;
            let count: u32 = count.trim().parse().ok()?;
            Some(format!("{} orders in {}", count, year))
        })
        .collect();

    if counts.is_empty() {
        "No results match the criteria.".to_string()
    } else {
        format!("There were {}.", counts.join(" and "))
    }
}

/// Group `YYYY-MM-DD` strings by year, like
/// `SELECT EXTRACT(YEAR FROM TO_DATE(..)) AS year, COUNT(*) ... GROUP BY 1 ORDER BY 1`
pub fn orders_per_year(dates: &[&str]) -> ResultTable {
    let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
    for date in dates {
        if let Some(year) = date.get(..4).and_then(|y| y.parse().ok()) {
            *counts.entry(year).or_default() += 1;
        }
    }
    ResultTable::new(
        vec!["year".to_string(), "order_count".to_string()],
        counts
            .into_iter()
            .map(|(year, count)| vec![json!(year), json!(count)])
            .collect(),
    )
}

pub fn orders_catalog() -> Vec<ColumnRef> {
    vec![
        ColumnRef::new("customers", "id"),
        ColumnRef::new("customers", "signup_date"),
        ColumnRef::new("orders", "id"),
        ColumnRef::new("orders", "created_at"),
    ]
}

pub const ORDER_DATES: [&str; 5] = ["2020-01-04", "2020-05-17", "2020-11-30", "2021-02-14", "2021-08-09"];
