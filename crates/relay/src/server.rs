//! Relay HTTP surface and node lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info};

use onionmesh_core::config::{routes, STATUS_LIVE};
use onionmesh_core::{Ack, Envelope, NodeId, OnionError, RelayStats, ResultBody};
use onionmesh_crypto::RelayKeypair;
use onionmesh_registry::http::{bind, spawn_server, ApiError, ApiResult};
use onionmesh_registry::{RegistryClient, ServeError, ServerHandle};
use onionmesh_settings::NetworkSettings;

use crate::handler::RelayHandler;
use crate::transport::HttpTransport;

/// Router for one relay's routes
pub fn relay_router(handler: Arc<RelayHandler>) -> Router {
    Router::new()
        .route(routes::STATUS, get(|| async { STATUS_LIVE }))
        .route(routes::RECEIVE, post(receive))
        .route(routes::LAST_ENCRYPTED, get(last_encrypted))
        .route(routes::LAST_DECRYPTED, get(last_decrypted))
        .route(routes::LAST_DESTINATION, get(last_destination))
        .route(routes::STATS, get(stats))
        .with_state(handler)
}

async fn receive(
    State(handler): State<Arc<RelayHandler>>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(envelope) = body.map_err(ApiError::from)?;
    handler.handle(envelope).await?;
    Ok(Json(Ack::ok()))
}

async fn last_encrypted(
    State(handler): State<Arc<RelayHandler>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: handler.diagnostics().last_encrypted,
    })
}

async fn last_decrypted(
    State(handler): State<Arc<RelayHandler>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: handler.diagnostics().last_decrypted,
    })
}

async fn last_destination(
    State(handler): State<Arc<RelayHandler>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: handler.diagnostics().last_destination,
    })
}

async fn stats(State(handler): State<Arc<RelayHandler>>) -> Json<RelayStats> {
    Json(handler.stats())
}

/// A running relay: key pair, HTTP server and registry membership
pub struct RelayNode {
    handler: Arc<RelayHandler>,
    server: ServerHandle,
}

impl RelayNode {
    /// Generate a key pair, serve on the relay's port, then register.
    ///
    /// A failed registration is logged and the relay keeps serving.
    pub async fn start(id: NodeId, network: &NetworkSettings) -> Result<Self, ServeError> {
        let keypair = RelayKeypair::generate().map_err(OnionError::from)?;
        info!(
            "Relay {} generated key {}",
            id,
            keypair.public_key().fingerprint()
        );

        let transport = Arc::new(HttpTransport::new(network.request_timeout())?);
        let handler = Arc::new(RelayHandler::new(id, Arc::new(keypair), transport));

        let listener = bind(&network.relay_bind_addr(id)).await?;
        let server = spawn_server(listener, relay_router(handler.clone()))?;
        info!("Onion relay {} listening on {}", id, server.local_addr());

        let registry = RegistryClient::new(network.registry_url(), network.request_timeout())?;
        match registry.register(id, handler.public_key()).await {
            Ok(()) => info!("Relay {} registered with {}", id, registry.base_url()),
            Err(e) => error!("Relay {} failed to register: {}", id, e),
        }

        Ok(Self { handler, server })
    }

    pub fn id(&self) -> NodeId {
        self.handler.node_id()
    }

    pub fn handler(&self) -> &Arc<RelayHandler> {
        &self.handler
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub async fn shutdown(self) {
        self.server.shutdown().await
    }

    pub async fn wait(self) {
        self.server.wait().await
    }
}
