//! Prompt templates and the two language-model steps of a question:
//! question + schema → SQL, and question + result → answer.

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::result::ResultTable;
use tracing::debug;

/// Prompt asking for a single PostgreSQL query
pub fn sql_prompt(question: &str, schema: &str) -> String {
    format!(
        r#"You are an expert PostgresSql Data Analyst.
Here is the database schema:
{schema}

Your task is to write a SQL query that answers the following question:
{question}

The tables were created via pandas.
- Always use double quotes around any table or column names that are not all lowercase.
- Always use double quotes around any table or column names exactly as they appear in the schema.
- Return only the SQL query, without any explanation or comments.
- Make sure the query works in PostgreSQL without errors."#
    )
}

/// Prompt asking for a natural-language answer over the result table
pub fn answer_prompt(question: &str, table: &ResultTable) -> String {
    format!(
        r#"User Question: {question}
Data returned from SQL query: {data}

Task: Answer the user's question based on the data returned from the SQL query.

- Always wrap table and column names in double quotes if they are not all lowercase.
- If the SQL query returns no rows, respond:"No results match the criteria."
- Do not modify column or table names yourself in Python.
- Make sure the query runs directly in PostgreSQL without errors."#,
        data = table.render_text()
    )
}

/// Drop markdown code fences and surrounding whitespace from a model reply.
/// Anything else the model wrote is kept as-is.
pub fn clean_sql(reply: &str) -> String {
    reply.replace("```sql", "").replace("```", "").trim().to_string()
}

/// Ask the model for SQL answering `question` over `schema`
pub async fn generate_sql(llm: &dyn LanguageModel, question: &str, schema: &str) -> Result<String> {
    let reply = llm.complete(&sql_prompt(question, schema)).await?;
    let sql = clean_sql(&reply);
    debug!("Generated SQL: {}", sql);
    Ok(sql)
}

/// Ask the model to answer `question` from `table`
pub async fn generate_answer(llm: &dyn LanguageModel, question: &str, table: &ResultTable) -> Result<String> {
    let reply = llm.complete(&answer_prompt(question, table)).await?;
    Ok(reply.trim().to_string())
}
