mod common;

use common::{orders_catalog, orders_per_year, summarize_year_counts, FakeDatabase, ScriptedModel, ORDER_DATES};
use serde_json::Value;
use sql_chat::db::ColumnRef;
use sql_chat::pipeline::SqlChat;
use sql_chat::schema::DateColumnIndex;
use sql_chat::web::handle_request;
use sql_chat::web::http::{Request, Response};
use std::sync::Arc;

const YEAR_SQL: &str = "SELECT EXTRACT(YEAR FROM \"created_at\") AS year, COUNT(*) AS order_count FROM \"orders\" GROUP BY 1 ORDER BY 1";

fn chat_with(db: FakeDatabase, llm: ScriptedModel) -> SqlChat {
    let index = DateColumnIndex::from_columns(vec![ColumnRef::new("orders", "created_at")]);
    SqlChat::with_index(Arc::new(db), Arc::new(llm), index)
}

fn orders_chat() -> SqlChat {
    chat_with(
        FakeDatabase::new(orders_catalog()).with_result("TO_DATE(", orders_per_year(&ORDER_DATES)),
        ScriptedModel::new(YEAR_SQL, summarize_year_counts),
    )
}

fn get(path: &str) -> Request {
    Request::parse(&format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path)).unwrap()
}

fn post(path: &str, body: &str) -> Request {
    Request::parse(&format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        path,
        body.len(),
        body
    ))
    .unwrap()
}

fn body(response: &Response) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

#[tokio::test]
async fn index_serves_chat_page() {
    let response = handle_request(&get("/"), &orders_chat()).await;
    assert_eq!(response.status, 200);
    assert!(response.content_type.starts_with("text/html"));
    assert!(response.body.contains("Ask a question about your database:"));
}

#[tokio::test]
async fn health_reports_ok() {
    let response = handle_request(&get("/api/health"), &orders_chat()).await;
    assert_eq!(response.status, 200);
    assert_eq!(body(&response)["status"], "ok");
}

#[tokio::test]
async fn ask_returns_full_turn() {
    let request = post("/api/ask", r#"{"question":"How many orders per year?"}"#);
    let response = handle_request(&request, &orders_chat()).await;
    assert_eq!(response.status, 200);

    let turn = body(&response);
    assert_eq!(turn["question"], "How many orders per year?");
    assert_eq!(turn["sql"], YEAR_SQL);
    assert!(turn["executed_sql"].as_str().unwrap().contains("TO_DATE(\"created_at\", 'YYYY-MM-DD')"));
    assert_eq!(turn["table"]["columns"], serde_json::json!(["year", "order_count"]));
    assert_eq!(turn["table"]["rows"], serde_json::json!([[2020, 3], [2021, 2]]));
    assert_eq!(turn["answer"], "There were 3 orders in 2020 and 2 orders in 2021.");
    assert_eq!(turn["notices"], serde_json::json!([]));
}

#[tokio::test]
async fn ask_reports_execution_notice_with_success_status() {
    let chat = chat_with(
        FakeDatabase::new(orders_catalog()).failing_execution("syntax error at or near \"FROMM\""),
        ScriptedModel::new("SELECT * FROMM orders", summarize_year_counts),
    );
    let response = handle_request(&post("/api/ask", r#"{"question":"Everything"}"#), &chat).await;
    assert_eq!(response.status, 200);

    let turn = body(&response);
    assert_eq!(turn["table"]["rows"], serde_json::json!([]));
    assert_eq!(turn["notices"][0]["stage"], "execution");
    assert!(turn["notices"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Error executing SQL"));
}

#[tokio::test]
async fn ask_rejects_blank_and_malformed_bodies() {
    let chat = orders_chat();

    let blank = handle_request(&post("/api/ask", r#"{"question":"  "}"#), &chat).await;
    assert_eq!(blank.status, 400);
    assert_eq!(body(&blank)["error"], "Question is required");

    let missing = handle_request(&post("/api/ask", "{}"), &chat).await;
    assert_eq!(missing.status, 400);

    let garbage = handle_request(&post("/api/ask", "question=hi"), &chat).await;
    assert_eq!(garbage.status, 400);
}

#[tokio::test]
async fn ask_maps_model_failure_to_bad_gateway() {
    let chat = chat_with(FakeDatabase::new(orders_catalog()), ScriptedModel::failing("quota exceeded"));
    let response = handle_request(&post("/api/ask", r#"{"question":"Anything"}"#), &chat).await;
    assert_eq!(response.status, 502);
    assert!(body(&response)["error"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn schema_endpoint_lists_tables() {
    let response = handle_request(&get("/api/schema"), &orders_chat()).await;
    assert_eq!(response.status, 200);

    let value = body(&response);
    let schema = value["schema"].as_str().unwrap();
    assert!(schema.contains("Table: customers\nColumns: id, signup_date"));
    assert!(schema.contains("Table: orders\nColumns: id, created_at"));
    assert_eq!(value["notices"], serde_json::json!([]));
}

#[tokio::test]
async fn date_columns_endpoint_and_refresh() {
    let db = Arc::new(FakeDatabase::new(orders_catalog()));
    let llm = Arc::new(ScriptedModel::new("SELECT 1", |_| String::new()));
    let chat = SqlChat::with_index(db.clone(), llm, DateColumnIndex::default());

    let before = handle_request(&get("/api/date-columns"), &chat).await;
    assert_eq!(before.status, 200);
    assert_eq!(body(&before)["tables"], serde_json::json!({}));

    let refreshed = handle_request(&post("/api/date-columns/refresh", ""), &chat).await;
    assert_eq!(refreshed.status, 200);
    assert_eq!(body(&refreshed)["tables"]["customers"], serde_json::json!(["signup_date"]));

    db.set_catalog_error(Some("connection reset"));
    let failed = handle_request(&post("/api/date-columns/refresh", ""), &chat).await;
    assert_eq!(failed.status, 500);

    let after = handle_request(&get("/api/date-columns"), &chat).await;
    assert_eq!(body(&after)["tables"]["customers"], serde_json::json!(["signup_date"]));
}

#[tokio::test]
async fn unknown_routes_and_wrong_methods() {
    let chat = orders_chat();

    assert_eq!(handle_request(&get("/nope"), &chat).await.status, 404);
    assert_eq!(handle_request(&get("/api/ask"), &chat).await.status, 405);
    assert_eq!(handle_request(&post("/api/health", ""), &chat).await.status, 405);

    let preflight = Request::parse("OPTIONS /api/ask HTTP/1.1\r\n\r\n").unwrap();
    let response = handle_request(&preflight, &chat).await;
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
}
