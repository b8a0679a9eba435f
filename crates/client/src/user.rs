//! User node: sends onions, receives delivered payloads

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tracing::info;

use onionmesh_core::config::{routes, STATUS_LIVE};
use onionmesh_core::{Ack, NodeId, Result, ResultBody, SendMessageBody, TerminalPayload};
use onionmesh_registry::http::{bind, spawn_server, ApiError, ApiResult};
use onionmesh_registry::{RegistryClient, ServeError, ServerHandle};
use onionmesh_relay::HttpTransport;
use onionmesh_settings::{NetworkSettings, Settings};

use crate::builder::{build_onion, Onion};
use crate::recipient::unwrap_text;

/// Fetches the directory, builds an onion and posts it to the entry relay
pub struct OnionSender {
    registry: RegistryClient,
    transport: HttpTransport,
    network: NetworkSettings,
    path_length: usize,
}

impl OnionSender {
    pub fn new(network: NetworkSettings, path_length: usize) -> Result<Self> {
        let registry = RegistryClient::new(network.registry_url(), network.request_timeout())?;
        let transport = HttpTransport::new(network.request_timeout())?;
        Ok(Self {
            registry,
            transport,
            network,
            path_length,
        })
    }

    /// Send `message` to user `destination_user_id`.
    ///
    /// A failed response from the entry relay surfaces as `Delivery`.
    pub async fn send(&self, message: &[u8], destination_user_id: NodeId) -> Result<Onion> {
        let snapshot = self.registry.snapshot().await?;
        let recipient = self.network.user_deliver_url(destination_user_id);

        let onion = build_onion(
            message,
            &recipient,
            &snapshot,
            self.path_length,
            &self.network,
        )?;

        self.transport
            .post_json(&onion.entry_address, &onion.envelope)
            .await?;
        info!(
            "Sent message to entry node {} via {:?}",
            onion.circuit[0], onion.circuit
        );

        Ok(onion)
    }
}

/// What the user last sent and received, for the debug routes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub last_received: Option<String>,
    pub last_sent: Option<String>,
    pub last_circuit: Option<Vec<NodeId>>,
}

/// One user: a sender plus its receive-side state
pub struct User {
    id: NodeId,
    sender: OnionSender,
    state: Mutex<UserState>,
}

impl User {
    pub fn new(id: NodeId, sender: OnionSender) -> Self {
        Self {
            id,
            sender,
            state: Mutex::new(UserState::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub async fn send(&self, message: &str, destination_user_id: NodeId) -> Result<Vec<NodeId>> {
        let onion = self
            .sender
            .send(message.as_bytes(), destination_user_id)
            .await?;

        let mut state = self.state.lock();
        state.last_sent = Some(message.to_string());
        state.last_circuit = Some(onion.circuit.clone());
        Ok(onion.circuit)
    }

    /// Accept a delivered payload and return its text
    pub fn receive(&self, payload: &TerminalPayload) -> Result<String> {
        let text = unwrap_text(payload)?;
        info!("User {} received message: {}", self.id, text);
        self.state.lock().last_received = Some(text.clone());
        Ok(text)
    }

    pub fn state(&self) -> UserState {
        self.state.lock().clone()
    }
}

/// Router for one user's routes
pub fn user_router(user: Arc<User>) -> Router {
    Router::new()
        .route(routes::STATUS, get(|| async { STATUS_LIVE }))
        .route(routes::SEND_MESSAGE, post(send_message))
        .route(routes::RECEIVE_MESSAGE, post(receive_message))
        .route(routes::LAST_RECEIVED_MESSAGE, get(last_received))
        .route(routes::LAST_SENT_MESSAGE, get(last_sent))
        .route(routes::LAST_CIRCUIT, get(last_circuit))
        .with_state(user)
}

async fn send_message(
    State(user): State<Arc<User>>,
    body: std::result::Result<Json<SendMessageBody>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(body) = body.map_err(ApiError::from)?;
    user.send(&body.message, body.destination_user_id).await?;
    Ok(Json(Ack::ok()))
}

async fn receive_message(
    State(user): State<Arc<User>>,
    body: std::result::Result<Json<TerminalPayload>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(payload) = body.map_err(ApiError::from)?;
    user.receive(&payload)?;
    Ok(Json(Ack::ok()))
}

async fn last_received(State(user): State<Arc<User>>) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: user.state().last_received,
    })
}

async fn last_sent(State(user): State<Arc<User>>) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: user.state().last_sent,
    })
}

async fn last_circuit(State(user): State<Arc<User>>) -> Json<ResultBody<Option<Vec<NodeId>>>> {
    Json(ResultBody {
        result: user.state().last_circuit,
    })
}

/// A running user node
pub struct UserNode {
    user: Arc<User>,
    server: ServerHandle,
}

impl UserNode {
    pub async fn start(id: NodeId, settings: &Settings) -> std::result::Result<Self, ServeError> {
        let sender = OnionSender::new(settings.network.clone(), settings.routing.path_length)?;
        let user = Arc::new(User::new(id, sender));

        let listener = bind(&settings.network.user_bind_addr(id)).await?;
        let server = spawn_server(listener, user_router(user.clone()))?;
        info!("User {} listening on {}", id, server.local_addr());

        Ok(Self { user, server })
    }

    pub fn user(&self) -> &Arc<User> {
        &self.user
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
