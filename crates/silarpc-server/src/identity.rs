use crate::errors::{Result, ServerError};
use silarpc_framework::Feature;
use uuid::Uuid;

/// Identity of one server instance.
///
/// Every field except the UUID is validated at construction time against
/// the constraints the built-in SiLAService feature definition declares
/// for it (the server is self-describing): the name has a maximum length,
/// type, version, and vendor URL each match a declared pattern.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub server_name: String,
    pub server_type: String,
    pub server_description: String,
    pub server_version: String,
    pub server_vendor_url: String,
    /// Generated when not supplied.
    pub server_uuid: Option<Uuid>,
}

/// Sizing of the two independent worker pools.
///
/// RPC workers accept and dispatch incoming calls; child task workers run
/// work spawned by command implementations. The pools are separate so
/// long-running child work cannot starve call acceptance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrently served RPC connections.
    ///
    /// Default: 100
    pub max_rpc_workers: usize,
    /// Maximum concurrently running child tasks.
    ///
    /// Default: 100
    pub max_child_task_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_rpc_workers: 100,
            max_child_task_workers: 100,
        }
    }
}

/// Identity fields and the SiLAService data type definition that
/// constrains each of them.
const CONSTRAINED_FIELDS: [(&str, &str); 4] = [
    ("server_name", "ServerName"),
    ("server_type", "ServerType"),
    ("server_version", "ServerVersion"),
    ("server_vendor_url", "ServerVendorURL"),
];

/// Validates an identity against the constraints declared by the
/// SiLAService feature definition itself.
pub(crate) fn validate_identity(identity: &ServerIdentity, sila_service: &Feature) -> Result<()> {
    for (field, definition) in CONSTRAINED_FIELDS {
        let value = match field {
            "server_name" => &identity.server_name,
            "server_type" => &identity.server_type,
            "server_version" => &identity.server_version,
            _ => &identity.server_vendor_url,
        };
        let Some(definition) = sila_service.data_type_definitions().get(definition) else {
            continue;
        };
        for constraint in definition.data_type.constraints() {
            if !constraint.check_str(value) {
                return Err(ServerError::InvalidIdentity {
                    field: field.to_string(),
                    constraint: constraint.to_string(),
                });
            }
        }
    }
    Ok(())
}
