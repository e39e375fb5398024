use crate::errors::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a broadcaster announces about a running server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub server_uuid: Uuid,
    pub server_name: String,
    pub address: String,
    pub port: u16,
}

/// Opaque receipt for one broadcast registration; passed back to
/// [`Broadcaster::unregister_server`] exactly once during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(u64);

impl RegistrationHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Announces a running server's presence on the local network.
///
/// Discovery is a best-effort side channel: a failed registration is
/// logged and does not prevent the server from serving direct
/// connections. Broadcast packet formats are the implementation's
/// concern.
pub trait Broadcaster: Send + Sync {
    fn register_server(&self, info: &ServiceInfo) -> Result<RegistrationHandle>;

    fn unregister_server(&self, handle: RegistrationHandle) -> Result<()>;
}
