//! Just enough HTTP/1.1 for JSON POST endpoints: one request per
//! connection, `Content-Length` bodies, `Connection: close` replies.

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("body of {length} bytes exceeds limit of {limit}")]
    PayloadTooLarge { length: usize, limit: usize },

    #[error("connection closed before a full request arrived")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First header with this name, case-insensitive, trimmed; empty counts
    /// as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: bytes,
            },
            Err(e) => Self::json(
                500,
                &serde_json::json!({"status": "error", "message": format!("failed to encode response: {e}")}),
            ),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Read one request.  The body is rejected before it is read when its
/// declared length exceeds `max_body`.
pub async fn read_request<R>(reader: &mut R, max_body: usize) -> Result<Request, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut header_bytes = 0usize;
    let mut line = String::new();

    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(HttpError::Closed);
    }
    header_bytes += n;
    let mut parts = line.split_whitespace();
    let (method, path, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(p), Some(v)) => (m.to_string(), p.to_string(), v),
        _ => return Err(HttpError::Malformed(format!("bad request line {:?}", line.trim_end()))),
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed(format!("unsupported version {version}")));
    }
    // query strings are not used by any route
    let path = path.split('?').next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(HttpError::Closed);
        }
        header_bytes += n;
        if header_bytes > MAX_HEADER_BYTES {
            return Err(HttpError::Malformed("headers too large".to_string()));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(HttpError::Malformed(format!("bad header line {trimmed:?}")));
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let length = match headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
    {
        Some((_, v)) => v
            .parse::<usize>()
            .map_err(|_| HttpError::Malformed(format!("bad content-length {v:?}")))?,
        None => 0,
    };
    if length > max_body {
        return Err(HttpError::PayloadTooLarge {
            length,
            limit: max_body,
        });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => HttpError::Closed,
        _ => HttpError::Io(e),
    })?;

    Ok(Request {
        method,
        path,
        headers,
        body,
    })
}

pub async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason_phrase(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse(raw: &[u8], max_body: usize) -> Result<Request, HttpError> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader, max_body).await
    }

    #[tokio::test]
    async fn test_parses_post_with_body() {
        let raw = b"POST /init-optimization?x=1 HTTP/1.1\r\nHost: localhost\r\nX-User-Email: a@b.c\r\nContent-Length: 7\r\n\r\n{\"a\":1}";
        let request = parse(raw, 1024).await.unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/init-optimization");
        assert_eq!(request.header("x-user-email"), Some("a@b.c"));
        assert_eq!(request.body, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_no_content_length_means_empty_body() {
        let request = parse(b"POST /ping HTTP/1.1\r\n\r\n", 0).await.unwrap();
        assert!(request.body.is_empty());
        assert_eq!(request.header("X-User-Email"), None);
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 100\r\n\r\n";
        match parse(raw, 10).await {
            Err(HttpError::PayloadTooLarge { length: 100, limit: 10 }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let cases: [&[u8]; 4] = [
            b"GARBAGE\r\n\r\n",
            b"POST /x SPDY/3\r\n\r\n",
            b"POST /x HTTP/1.1\r\nno colon here\r\n\r\n",
            b"POST /x HTTP/1.1\r\nContent-Length: lots\r\n\r\n",
        ];
        for raw in cases {
            assert!(matches!(parse(raw, 1024).await, Err(HttpError::Malformed(_))));
        }
    }

    #[tokio::test]
    async fn test_truncated_body_is_closed() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        assert!(matches!(parse(raw, 1024).await, Err(HttpError::Closed)));
        assert!(matches!(parse(b"", 1024).await, Err(HttpError::Closed)));
    }

    #[tokio::test]
    async fn test_writes_status_line_and_headers() {
        let response = Response::json(429, &serde_json::json!({"status": "error"}))
            .with_header("X-Request-ID", "r-1");
        let mut out: Vec<u8> = Vec::new();
        write_response(&mut out, &response).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 429 Too Many Requests\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("X-Request-ID: r-1\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"status\":\"error\"}"));
    }
}
