//! Accept loop and per-request logging.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};
use uuid::Uuid;

use crate::http::{read_request, write_response, HttpError, Response};
use crate::routes::{error_body, handle, AppState, USER_HEADER};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Serve until the listener fails.  Each connection gets its own task.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let sweeper = Arc::clone(&state);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sweeper.limiter.window());
        loop {
            tick.tick().await;
            sweeper.limiter.sweep();
        }
    });

    loop {
        let (socket, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, peer, state).await {
                debug!(%peer, error = %e, "connection ended with an error");
            }
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
) -> std::io::Result<()> {
    let started = Instant::now();
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let (method, path, user, request_id, response) =
        match read_request(&mut reader, state.config.max_content_length).await {
            Ok(request) => {
                let method = request.method.clone();
                let path = request.path.clone();
                let user = request.header(USER_HEADER).unwrap_or("unknown").to_string();
                let request_id = request
                    .header(REQUEST_ID_HEADER)
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let response = handle(&state, request).await;
                (method, path, user, request_id, response)
            }
            Err(HttpError::Closed) => return Ok(()),
            Err(HttpError::Io(e)) => return Err(e),
            Err(e) => {
                let status = match e {
                    HttpError::PayloadTooLarge { .. } => 413,
                    _ => 400,
                };
                let response = Response::json(status, &error_body(&e.to_string(), None));
                (
                    "-".to_string(),
                    "-".to_string(),
                    "unknown".to_string(),
                    Uuid::new_v4().to_string(),
                    response,
                )
            }
        };

    let response = response.with_header(REQUEST_ID_HEADER, &request_id);
    write_response(&mut write_half, &response).await?;
    write_half.shutdown().await?;

    info!(
        method = %method,
        path = %path,
        status = response.status,
        duration_ms = started.elapsed().as_secs_f64() * 1000.0,
        user = %user,
        request_id = %request_id,
        %peer,
        "request completed"
    );
    Ok(())
}
