//! `org.freedesktop.Secret.Session` objects.

use std::sync::Arc;

use zbus::{interface, ObjectServer};

use crate::error::ServiceError;
use crate::state::ServiceState;

pub struct SessionIface {
    state: Arc<ServiceState>,
    path: String,
}

impl SessionIface {
    pub fn new(state: Arc<ServiceState>, path: String) -> Self {
        Self { state, path }
    }
}

#[interface(name = "org.freedesktop.Secret.Session")]
impl SessionIface {
    /// Close the session: the registry entry goes away, the derived key is
    /// wiped, and the object leaves the bus.
    async fn close(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> Result<(), ServiceError> {
        self.state.close_session(&self.path);
        server.remove::<Self, _>(self.path.as_str()).await?;
        Ok(())
    }
}
