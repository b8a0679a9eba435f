//! Shared HTTP plumbing for every OnionMesh server
//!
//! Error-to-status mapping and a small handle around a spawned axum server.

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use onionmesh_core::{ErrorBody, OnionError};

/// Failure to bring a node's server up
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Onion(#[from] OnionError),
}

/// Bind a listener, naming the address on failure
pub async fn bind(addr: &str) -> std::result::Result<TcpListener, ServeError> {
    TcpListener::bind(addr).await.map_err(|source| ServeError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// HTTP status for an operation failure
pub fn status_for(err: &OnionError) -> StatusCode {
    match err {
        OnionError::Validation(_) | OnionError::Protocol(_) => StatusCode::BAD_REQUEST,
        OnionError::Crypto(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OnionError::Delivery(_) => StatusCode::BAD_GATEWAY,
        OnionError::InsufficientRelays { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler error: renders as `{ error, kind }` with the mapped status
#[derive(Debug)]
pub struct ApiError(pub OnionError);

impl From<OnionError> for ApiError {
    fn from(err: OnionError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(OnionError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        warn!("Request failed ({}): {}", status, self.0);
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// A server running on a background task
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!("Server task on {} ended abnormally: {}", self.addr, e);
        }
    }

    /// Wait until the server stops on its own
    pub async fn wait(mut self) {
        if let Err(e) = (&mut self.task).await {
            error!("Server task on {} ended abnormally: {}", self.addr, e);
        }
    }
}

/// Serve `router` on an already-bound listener from a background task
pub fn spawn_server(listener: TcpListener, router: Router) -> std::io::Result<ServerHandle> {
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Server on {} failed: {}", addr, e);
        }
        debug!("Server on {} stopped", addr);
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&OnionError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&OnionError::Protocol("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&OnionError::Crypto("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&OnionError::Delivery("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&OnionError::InsufficientRelays {
                required: 3,
                available: 1
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_response_status() {
        let response = ApiError(OnionError::Crypto("bad tag".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_spawned_server_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let router = Router::new().route("/ping", axum::routing::get(|| async { "pong" }));
        let handle = spawn_server(listener, router).unwrap();

        let url = format!("http://{}/ping", handle.local_addr());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "pong");

        handle.shutdown().await;
        assert!(reqwest::get(&url).await.is_err());
    }
}
