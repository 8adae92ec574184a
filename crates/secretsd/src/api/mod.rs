//! The D-Bus surface: one module per exported interface.
//!
//! Everything here is a thin adapter over [`crate::state::ServiceState`]:
//! wire-type conversion, object export/unexport, signal emission, and
//! property-changed notifications. Semantics live in the state layer.

mod collection;
mod item;
mod prompt;
mod service;
mod session;

pub use collection::CollectionIface;
pub use item::ItemIface;
pub use prompt::PromptIface;
pub use service::SecretService;
pub use session::SessionIface;

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, info, warn};
use zbus::names::BusName;
use zbus::zvariant::OwnedObjectPath;
use zbus::{Connection, ObjectServer};

use crate::error::ServiceError;
use crate::paths;
use crate::state::ServiceState;

/// The well-known bus name this service owns.
pub const BUS_NAME: &str = "org.freedesktop.secrets";

/// Map a service error onto the properties interface's error space.
pub(crate) fn to_fdo(err: ServiceError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

/// Convert path strings into owned object paths, rejecting invalid ones.
pub(crate) fn to_object_paths(paths: Vec<String>) -> Result<Vec<OwnedObjectPath>, ServiceError> {
    paths
        .into_iter()
        .map(|p| OwnedObjectPath::try_from(p).map_err(ServiceError::from))
        .collect()
}

/// Export a collection object at `path` (canonical or alias).
pub(crate) async fn export_collection(
    server: &ObjectServer,
    state: &Arc<ServiceState>,
    name: &str,
    path: &str,
) -> Result<(), ServiceError> {
    server
        .at(path, CollectionIface::new(state.clone(), name.to_string()))
        .await?;
    Ok(())
}

/// Export an item object and record it in the item registry.
pub(crate) async fn export_item(
    server: &ObjectServer,
    state: &Arc<ServiceState>,
    collection: &str,
    id: &str,
) -> Result<(), ServiceError> {
    let path = state.items.insert(collection, id);
    server
        .at(
            path.as_str(),
            ItemIface::new(state.clone(), collection.to_string(), id.to_string()),
        )
        .await?;
    Ok(())
}

/// Allocate a prompt around `action` and export it.
///
/// No shipped operation requires a prompt (every method answers `/` in its
/// prompt slot), but the facade can hand out working handles this way.
pub async fn export_prompt(
    server: &ObjectServer,
    state: &Arc<ServiceState>,
    action: crate::prompts::PromptAction,
) -> Result<OwnedObjectPath, ServiceError> {
    let prompt = state.prompts.create(action);
    server
        .at(
            prompt.path(),
            PromptIface::new(state.clone(), prompt.path().to_string()),
        )
        .await?;
    Ok(OwnedObjectPath::try_from(prompt.path().to_string())?)
}

/// Export the object graph: the service root, every stored collection with
/// its items, and the `default` alias (creating its collection on first
/// run).
pub async fn bootstrap(conn: &Connection, state: Arc<ServiceState>) -> Result<(), ServiceError> {
    let server = conn.object_server();
    server
        .at(paths::SERVICE_PATH, SecretService::new(state.clone()))
        .await?;

    let collections = state.bootstrap_collections().await?;
    for (name, item_ids) in &collections {
        export_collection(server, &state, name, &paths::collection(name)).await?;
        for id in item_ids {
            export_item(server, &state, name, id).await?;
        }
    }
    info!(collections = collections.len(), "exported stored collections");

    let (default_name, created) = state.ensure_default_collection().await?;
    export_collection(server, &state, &default_name, &paths::collection(&default_name)).await?;
    export_collection(server, &state, &default_name, &paths::alias("default")).await?;
    if created {
        info!(collection = %default_name, "created default collection");
    } else {
        debug!(collection = %default_name, "default alias resolved");
    }
    Ok(())
}

/// Close the sessions of clients that drop off the bus.
///
/// Runs until the connection goes away; spawned as a background task.
pub async fn watch_disconnects(conn: Connection, state: Arc<ServiceState>) -> zbus::Result<()> {
    let dbus = zbus::fdo::DBusProxy::new(&conn).await?;
    let mut stream = dbus.receive_name_owner_changed().await?;

    while let Some(signal) = stream.next().await {
        let Ok(args) = signal.args() else { continue };
        if args.new_owner().is_some() {
            continue;
        }
        let BusName::Unique(unique) = args.name() else {
            continue;
        };

        for session in state.sessions.remove_client(unique.as_str()) {
            session.close();
            if let Err(err) = conn
                .object_server()
                .remove::<SessionIface, _>(session.path())
                .await
            {
                warn!(session = session.path(), %err, "failed to unexport session");
            }
            debug!(session = session.path(), client = %unique, "session reclaimed after disconnect");
        }
    }
    Ok(())
}

/// Tear down every session and prompt; used at shutdown.
pub async fn teardown(conn: &Connection, state: &Arc<ServiceState>) {
    let server = conn.object_server();

    for session in state.sessions.drain() {
        session.close();
        let _ = server.remove::<SessionIface, _>(session.path()).await;
    }
    for prompt in state.prompts.drain() {
        prompt.dismiss();
        let _ = server.remove::<PromptIface, _>(prompt.path()).await;
    }
}
