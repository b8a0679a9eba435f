//! Registry HTTP server

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use onionmesh_core::config::{routes, STATUS_LIVE};
use onionmesh_core::{Ack, NodeRecord, RegistryListing};

use crate::directory::Directory;
use crate::http::{bind, spawn_server, ApiError, ApiResult, ServeError, ServerHandle};

/// Router for the registry routes, backed by `directory`
pub fn registry_router(directory: Arc<Directory>) -> Router {
    Router::new()
        .route(routes::STATUS, get(|| async { STATUS_LIVE }))
        .route(routes::REGISTER_NODE, post(register_node))
        .route(routes::GET_REGISTRY, get(get_registry))
        .with_state(directory)
}

async fn register_node(
    State(directory): State<Arc<Directory>>,
    body: Result<Json<NodeRecord>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(record) = body.map_err(ApiError::from)?;
    directory.register(record.id, &record.public_key)?;
    Ok(Json(Ack::ok()))
}

async fn get_registry(State(directory): State<Arc<Directory>>) -> ApiResult<RegistryListing> {
    Ok(Json(directory.listing()?))
}

/// Standalone registry service
pub struct RegistryServer {
    directory: Arc<Directory>,
}

impl RegistryServer {
    pub fn new() -> Self {
        Self::with_directory(Arc::new(Directory::new()))
    }

    pub fn with_directory(directory: Arc<Directory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> Arc<Directory> {
        self.directory.clone()
    }

    pub fn router(&self) -> Router {
        registry_router(self.directory.clone())
    }

    /// Bind `addr` and serve in the background
    pub async fn start(&self, addr: &str) -> Result<ServerHandle, ServeError> {
        let listener = bind(addr).await?;
        let handle = spawn_server(listener, self.router())?;
        info!("Registry listening on {}", handle.local_addr());
        Ok(handle)
    }
}

impl Default for RegistryServer {
    fn default() -> Self {
        Self::new()
    }
}
