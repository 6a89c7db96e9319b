//! Liveness endpoint for hosts that expect the service to hold an open HTTP port.

use hyper::server::conn::http1;
use hyper::{Method, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::net::TcpListener;

fn route(method: &Method, path: &str) -> (StatusCode, String) {
    match (method, path) {
        (&Method::GET, "/" | "/health") => (
            StatusCode::OK,
            serde_json::json!({"status": "ok", "service": "telegram-movie-bot"}).to_string(),
        ),
        _ => (StatusCode::NOT_FOUND, "Not Found".to_string()),
    }
}

/// Binds `0.0.0.0:port` and serves on a background task.
pub async fn spawn(port: u16) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    let addr = listener.local_addr()?;
    tracing::info!("HTTP health server running on {}", addr);

    tokio::spawn(async move {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::error!("Error accepting connection: {}", e);
                    continue;
                }
            };
            tokio::spawn(async move {
                let service = hyper::service::service_fn(|req: hyper::Request<hyper::body::Incoming>| async move {
                    let (status, body) = route(req.method(), req.uri().path());
                    let mut response = Response::new(body);
                    *response.status_mut() = status;
                    if status == StatusCode::OK {
                        response.headers_mut().insert(
                            hyper::header::CONTENT_TYPE,
                            hyper::header::HeaderValue::from_static("application/json"),
                        );
                    }
                    Ok::<_, std::convert::Infallible>(response)
                });
                if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    tracing::debug!("Error serving health connection: {:?}", err);
                }
            });
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn routes() {
        let (status, body) = route(&Method::GET, "/health");
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"ok\""));
        assert_eq!(route(&Method::GET, "/").0, StatusCode::OK);
        assert_eq!(route(&Method::POST, "/health").0, StatusCode::NOT_FOUND);
        assert_eq!(route(&Method::GET, "/metrics").0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_health_over_tcp() {
        let addr = spawn(0).await.unwrap();
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.contains("telegram-movie-bot"));
    }
}
