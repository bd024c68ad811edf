//! Minimal HTTP/1.1 request parsing and response building over tokio streams

use crate::error::{ChatError, Result};
use serde::Serialize;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Parse a complete request. The path loses its query string and any
    /// trailing slash (except for `/`).
    pub fn parse(raw: &str) -> Result<Self> {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let mut lines = head.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| ChatError::Http("Empty request".to_string()))?;
        let mut parts = request_line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next()) {
            (Some(m), Some(t)) => (m.to_string(), t),
            _ => return Err(ChatError::Http(format!("Malformed request line: {}", request_line))),
        };

        let (path_str, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target, None),
        };
        let mut path = path_str.trim_end_matches('/').to_string();
        if path.is_empty() {
            path = "/".to_string();
        }

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self {
            method,
            path,
            query,
            headers,
            body: body.to_string(),
        })
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string(value)
            .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "error": message.into() }))
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: "text/plain",
            body: String::new(),
        }
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

pub fn extract_content_length(head: &str) -> Option<usize> {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Read one request: headers plus `Content-Length` bytes of body.
/// Returns `Ok(None)` when the peer sent nothing.
pub async fn read_request<S>(stream: &mut S) -> Result<Option<String>>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut temp_buf = [0u8; 8192];

    let read_result = timeout(READ_TIMEOUT, async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                break; // EOF
            }
            buffer.extend_from_slice(&temp_buf[..n]);

            if let Some(headers_end) = find_headers_end(&buffer) {
                let head = String::from_utf8_lossy(&buffer[..headers_end]);
                let content_length = extract_content_length(&head).unwrap_or(0);
                if content_length > MAX_REQUEST_BYTES {
                    return Err(ChatError::Http("Request too large".to_string()));
                }
                if buffer.len() >= headers_end + 4 + content_length {
                    break;
                }
            }
            if buffer.len() > MAX_REQUEST_BYTES {
                return Err(ChatError::Http("Request too large".to_string()));
            }
        }
        Ok::<(), ChatError>(())
    })
    .await;

    match read_result {
        Err(_) => return Err(ChatError::Http("Request read timeout".to_string())),
        Ok(Err(e)) => return Err(e),
        Ok(Ok(())) => {}
    }

    if buffer.is_empty() {
        return Ok(None);
    }

    String::from_utf8(buffer)
        .map(Some)
        .map_err(|e| ChatError::Http(format!("Request is not valid UTF-8: {}", e)))
}

fn find_headers_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

pub async fn write_response<S>(stream: &mut S, response: &Response) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(response.to_http().as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
