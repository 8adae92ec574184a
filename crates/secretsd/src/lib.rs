//! # secretsd
//!
//! A user-session D-Bus daemon implementing the freedesktop.org Secret
//! Service API on top of an external password store. Applications talk the
//! standard protocol (`org.freedesktop.secrets`); persistence and at-rest
//! encryption are delegated to the store's own GPG layer.
//!
//! Architecture: [`state::ServiceState`] holds the registries and the
//! operation semantics; [`api`] exports the object graph (Service →
//! Collection → Item, plus Session and Prompt) and translates between wire
//! types and the state layer; [`secretsd_store`] and [`secretsd_crypto`]
//! supply persistence and transport encryption.

#![forbid(unsafe_code)]

pub mod api;
pub mod collections;
pub mod config;
pub mod error;
pub mod items;
pub mod paths;
pub mod prompts;
pub mod secret;
pub mod sessions;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use secretsd_store::PassStore;
use tracing::{info, warn};
use zbus::fdo::{RequestNameFlags, RequestNameReply};

pub use config::{Cli, Config};
pub use error::ServiceError;
use state::ServiceState;

/// Run the daemon until SIGINT/SIGTERM.
///
/// Aborts (per the error contract) only when the bus connection, the name
/// acquisition, or the initial store bootstrap fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(PassStore::new(&config.store_bin, &config.prefix));
    let state = Arc::new(ServiceState::new(config.clone(), store));

    let conn = zbus::connection::Builder::session()
        .context("connecting to the session bus")?
        .build()
        .await
        .context("connecting to the session bus")?;

    api::bootstrap(&conn, state.clone())
        .await
        .context("bootstrapping the object graph from the store")?;

    acquire_name(&conn, config.replace)
        .await
        .context("acquiring the well-known bus name")?;
    info!(name = api::BUS_NAME, "acquired bus name");

    // Reclaim sessions whose clients drop off the bus.
    let watcher = tokio::spawn(api::watch_disconnects(conn.clone(), state.clone()));

    shutdown_signal().await;
    info!("shutting down");

    watcher.abort();
    api::teardown(&conn, &state).await;
    if let Err(err) = conn.release_name(api::BUS_NAME).await {
        warn!(%err, "failed to release bus name");
    }
    Ok(())
}

/// Request `org.freedesktop.secrets` with do-not-queue semantics, adding
/// replace-existing when configured. Anything but primary ownership fails.
async fn acquire_name(conn: &zbus::Connection, replace: bool) -> anyhow::Result<()> {
    let flags = if replace {
        RequestNameFlags::DoNotQueue | RequestNameFlags::ReplaceExisting
    } else {
        RequestNameFlags::DoNotQueue.into()
    };

    let reply = conn.request_name_with_flags(api::BUS_NAME, flags).await?;
    if reply != RequestNameReply::PrimaryOwner {
        anyhow::bail!("name {} already taken", api::BUS_NAME);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
