//! OnionMesh CLI
//!
//! Runs the registry, relays and users of an onion-routing overlay, alone or
//! as a whole local network, and drives sends against running users.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use onionmesh_client::UserNode;
use onionmesh_core::config::routes;
use onionmesh_core::{ErrorBody, NodeId};
use onionmesh_crypto::RelayKeypair;
use onionmesh_registry::RegistryServer;
use onionmesh_relay::RelayNode;
use onionmesh_settings::Settings;

/// OnionMesh - layered-encryption message relay network
#[derive(Parser)]
#[command(name = "onionmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.onionmesh/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node directory
    Registry,

    /// Run one onion relay
    Relay {
        /// Relay id; listens on the relay base port + id
        #[arg(long)]
        id: NodeId,
    },

    /// Run one user node
    User {
        /// User id; listens on the user base port + id
        #[arg(long)]
        id: NodeId,
    },

    /// Run a registry, relays and users in one process
    Network {
        /// Number of relays (defaults to routing.relay_count)
        #[arg(long)]
        relays: Option<u32>,

        /// Number of users (defaults to routing.user_count)
        #[arg(long)]
        users: Option<u32>,
    },

    /// Ask a running user node to send a message
    Send {
        /// Sending user id
        #[arg(long)]
        from: NodeId,

        /// Destination user id
        #[arg(long)]
        to: NodeId,

        /// Message text
        #[arg(short, long)]
        message: String,
    },

    /// Print a fresh relay key pair (base64 SPKI / PKCS#8)
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    onionmesh_logging::init_logging(cli.verbose);

    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Registry => run_registry(&settings).await?,
        Commands::Relay { id } => run_relay(&settings, id).await?,
        Commands::User { id } => run_user(&settings, id).await?,
        Commands::Network { relays, users } => {
            let relays = relays.unwrap_or(settings.routing.relay_count);
            let users = users.unwrap_or(settings.routing.user_count);
            run_network(&settings, relays, users).await?
        }
        Commands::Send { from, to, message } => send(&settings, from, to, &message).await?,
        Commands::Keygen => keygen()?,
    }

    Ok(())
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load_or_default().context("loading default settings")?,
    };
    Ok(settings)
}

async fn run_registry(settings: &Settings) -> Result<()> {
    let registry = RegistryServer::new();
    let handle = registry
        .start(&settings.network.registry_bind_addr())
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down registry...");
    handle.shutdown().await;
    Ok(())
}

async fn run_relay(settings: &Settings, id: NodeId) -> Result<()> {
    let relay = RelayNode::start(id, &settings.network).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down relay {}...", id);
    relay.shutdown().await;
    Ok(())
}

async fn run_user(settings: &Settings, id: NodeId) -> Result<()> {
    let user = UserNode::start(id, settings).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down user {}...", id);
    user.shutdown().await;
    Ok(())
}

async fn run_network(settings: &Settings, relays: u32, users: u32) -> Result<()> {
    if (relays as usize) < settings.routing.path_length {
        bail!(
            "{} relays cannot carry a {}-hop path",
            relays,
            settings.routing.path_length
        );
    }

    let registry = RegistryServer::new();
    let registry_handle = registry
        .start(&settings.network.registry_bind_addr())
        .await?;

    let mut relay_nodes = Vec::with_capacity(relays as usize);
    for id in 1..=relays {
        relay_nodes.push(
            RelayNode::start(id, &settings.network)
                .await
                .with_context(|| format!("starting relay {}", id))?,
        );
    }

    let mut user_nodes = Vec::with_capacity(users as usize);
    for id in 1..=users {
        user_nodes.push(
            UserNode::start(id, settings)
                .await
                .with_context(|| format!("starting user {}", id))?,
        );
    }

    println!("OnionMesh network running");
    println!("  Registry: {}", settings.network.registry_url());
    println!("  Relays:   {} ({} registered)", relays, registry.directory().len());
    for id in 1..=users {
        println!("  User {}:   {}", id, settings.network.user_url(id));
    }
    println!();
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down network...");

    for user in user_nodes {
        user.shutdown().await;
    }
    for relay in relay_nodes {
        relay.shutdown().await;
    }
    registry_handle.shutdown().await;
    Ok(())
}

async fn send(settings: &Settings, from: NodeId, to: NodeId, message: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(settings.network.request_timeout())
        .build()?;
    let url = format!("{}{}", settings.network.user_url(from), routes::SEND_MESSAGE);

    let response = client
        .post(&url)
        .json(&json!({ "message": message, "destinationUserId": to }))
        .send()
        .await
        .with_context(|| format!("user {} is not reachable at {}", from, url))?;

    if !response.status().is_success() {
        let status = response.status();
        let reason = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => "no details".to_string(),
        };
        bail!("send failed ({}): {}", status, reason);
    }

    let circuit_url = format!("{}{}", settings.network.user_url(from), routes::LAST_CIRCUIT);
    let circuit: serde_json::Value = client.get(&circuit_url).send().await?.json().await?;

    println!("Sent from user {} to user {}", from, to);
    println!("  Circuit: {}", circuit["result"]);
    Ok(())
}

fn keygen() -> Result<()> {
    let keypair = RelayKeypair::generate()?;

    println!("Fingerprint: {}", keypair.public_key().fingerprint());
    println!("Public key:  {}", keypair.public_key().to_base64()?);
    println!("Private key: {}", keypair.private_key_base64()?);
    Ok(())
}
