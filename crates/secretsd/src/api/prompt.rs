//! `org.freedesktop.Secret.Prompt` objects.
//!
//! Prompts auto-complete: the store is already unlocked by the user's GPG
//! session, so `Prompt` runs the deferred action immediately and fires
//! `Completed` without any window ever appearing.

use std::sync::Arc;

use zbus::object_server::SignalEmitter;
use zbus::zvariant::Value;
use zbus::{interface, ObjectServer};

use crate::error::ServiceError;
use crate::prompts::empty_result;
use crate::state::ServiceState;

pub struct PromptIface {
    state: Arc<ServiceState>,
    path: String,
}

impl PromptIface {
    pub fn new(state: Arc<ServiceState>, path: String) -> Self {
        Self { state, path }
    }

    async fn finish(&self, server: &ObjectServer) -> Result<(), ServiceError> {
        self.state.prompts.remove(&self.path);
        server.remove::<Self, _>(self.path.as_str()).await?;
        Ok(())
    }
}

#[interface(name = "org.freedesktop.Secret.Prompt")]
impl PromptIface {
    /// Run the deferred action and emit `Completed(false, result)`.
    async fn prompt(
        &self,
        window_id: String,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> Result<(), ServiceError> {
        // No UI exists; the window id has nothing to parent to.
        let _ = window_id;

        if let Some(prompt) = self.state.prompts.get(&self.path) {
            if let Some(result) = prompt.complete() {
                Self::completed(&emitter, false, result.into()).await?;
            }
        }
        self.finish(server).await
    }

    /// Abandon the action and emit `Completed(true, "")`.
    async fn dismiss(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> Result<(), ServiceError> {
        if let Some(prompt) = self.state.prompts.get(&self.path) {
            prompt.dismiss();
        }
        Self::completed(&emitter, true, empty_result().into()).await?;
        self.finish(server).await
    }

    #[zbus(signal)]
    async fn completed(
        emitter: &SignalEmitter<'_>,
        dismissed: bool,
        result: Value<'_>,
    ) -> zbus::Result<()>;
}
