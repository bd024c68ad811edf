//! HTTP server for the chat page
//! Simple HTTP server using tokio and basic HTTP handling

use super::http::{read_request, write_response, Request, Response};
use crate::error::ChatError;
use crate::pipeline::SqlChat;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

const CHAT_PAGE: &str = include_str!("page.html");

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

/// Accept connections forever, one task per connection
pub async fn serve(bind_addr: &str, chat: Arc<SqlChat>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from: {}", addr);
        let chat = Arc::clone(&chat);
        tokio::spawn(async move {
            handle_connection(stream, &chat).await;
        });
    }
}

async fn handle_connection(mut stream: TcpStream, chat: &SqlChat) {
    let raw = match read_request(&mut stream).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return,
        Err(e) => {
            warn!("Failed to read request: {}", e);
            let _ = write_response(&mut stream, &Response::error(400, e.to_string())).await;
            return;
        }
    };

    let response = match Request::parse(&raw) {
        Ok(request) => handle_request(&request, chat).await,
        Err(e) => Response::error(400, e.to_string()),
    };

    if let Err(e) = write_response(&mut stream, &response).await {
        error!("Failed to write response: {}", e);
    }
}

/// Route one parsed request
pub async fn handle_request(request: &Request, chat: &SqlChat) -> Response {
    debug!("Request: {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => Response::no_content(),
        ("GET", "/") => Response::html(CHAT_PAGE),
        ("GET", "/api/health") => Response::json(200, &serde_json::json!({"status": "ok"})),
        ("POST", "/api/ask") => ask(request, chat).await,
        ("GET", "/api/schema") => {
            let (schema, notices) = chat.schema().await;
            Response::json(200, &serde_json::json!({"schema": schema, "notices": notices}))
        }
        ("GET", "/api/date-columns") => Response::json(200, &chat.date_columns().await),
        ("POST", "/api/date-columns/refresh") => match chat.refresh_date_columns().await {
            Ok(index) => Response::json(200, &index),
            Err(e) => {
                warn!("Date-column refresh failed: {}", e);
                Response::error(500, e.to_string())
            }
        },
        (_, "/" | "/api/health" | "/api/ask" | "/api/schema" | "/api/date-columns" | "/api/date-columns/refresh") => {
            Response::error(405, format!("{} not allowed on {}", request.method, request.path))
        }
        _ => Response::error(404, format!("No route for {}", request.path)),
    }
}

async fn ask(request: &Request, chat: &SqlChat) -> Response {
    let question = match request.json::<AskRequest>() {
        Ok(body) => body.question,
        Err(_) => return Response::error(400, "Body must be JSON like {\"question\": \"...\"}"),
    };

    match chat.ask(&question).await {
        Ok(turn) => Response::json(200, &turn),
        Err(ChatError::EmptyQuestion) => Response::error(400, "Question is required"),
        Err(e) => {
            error!("Question failed: {}", e);
            Response::error(502, e.to_string())
        }
    }
}
