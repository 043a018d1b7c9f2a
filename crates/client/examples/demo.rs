//! Minimal walkthrough against a running rack server.
//!
//! ```sh
//! cargo run --example demo -- ws://localhost:4044
//! ```
//!
//! Connects, authenticates with the default key pair, fetches the command
//! catalog, issues an echo, then tails the `news` channel until ctrl-c.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use client::{ClientConfig, ClientEvent, RemoteClient, WebSocketTransport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:4044".to_string());

    let config = ClientConfig::new().with_endpoint(&endpoint);
    let client = Arc::new(RemoteClient::new(
        config,
        Arc::new(WebSocketTransport::new()),
    )?);
    client.clone().start();

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::Error { message } => warn!(%message, "connection fault"),
                other => info!(event = ?other, "lifecycle"),
            }
        }
    });

    client.connect().await?;
    let auth = client.authenticate().await?;
    info!(level = auth.level, cipher = auth.cipher_active, "authenticated");

    let count = client.refresh_command_list().await?;
    info!(count, "commands advertised");
    for (name, command) in client.command_list().await {
        info!(command = %name, level = command.level, "{}", command.description);
    }

    let reply = client.command("echo", json!({"msg": "hello rack"})).await?;
    info!(%reply, "echo reply");

    let mut news = client.join_channel("news").await?;
    info!("listening on the news channel, ctrl-c to stop");
    loop {
        tokio::select! {
            frame = news.recv() => match frame {
                Some(frame) => info!(channel = %frame.target, payload = ?frame.payload, "broadcast"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await?;
    Ok(())
}
