//! User-visible error notices
//!
//! Database failures while reading the schema or executing the generated
//! query do not abort a question; they become notices shown next to the
//! (partial or empty) output.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schema,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub stage: Stage,
    pub message: String,
}

impl Notice {
    pub fn schema(error: impl fmt::Display) -> Self {
        Self {
            stage: Stage::Schema,
            message: format!("Error reading schema: {}", error),
        }
    }

    pub fn execution(error: impl fmt::Display) -> Self {
        Self {
            stage: Stage::Execution,
            message: format!("Error executing SQL: {}", error),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
