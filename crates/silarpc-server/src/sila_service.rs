//! Built-in SiLAService feature.
//!
//! Every server hosts this feature: it describes the server itself
//! (name, type, UUID, version, vendor URL, description), lists the
//! features the server implements, and serves their definition documents.
//! The definition also declares the constraints server identity fields
//! are validated against at construction time.

use crate::errors::CallError;
use crate::server::ServerState;
use crate::servicer::{CallContext, FeatureImplementation};
use serde_json::{json, Value};
use silarpc_framework::{Command, Property};
use std::sync::Arc;

pub(crate) const SILA_SERVICE_DEFINITION: &str = include_str!("sila_service.sila.xml");

/// Maximum server name length, as declared by the ServerName definition.
const MAX_SERVER_NAME_LENGTH: usize = 255;

pub(crate) struct SilaServiceImpl {
    state: Arc<ServerState>,
}

impl SilaServiceImpl {
    pub(crate) fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

impl FeatureImplementation for SilaServiceImpl {
    fn call_command(
        &self,
        command: &Command,
        parameters: Value,
        _context: &CallContext,
    ) -> Result<Value, CallError> {
        match command.identifier() {
            "GetFeatureDefinition" => {
                let requested = parameters
                    .get("FeatureIdentifier")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CallError::Validation("missing parameter 'FeatureIdentifier'".to_string())
                    })?;
                let features = self.state.features.read().unwrap_or_else(|e| e.into_inner());
                features
                    .values()
                    .find(|f| f.fully_qualified_identifier().as_str() == requested)
                    .map(|f| json!({ "FeatureDefinition": f.definition() }))
                    .ok_or_else(|| CallError::DefinedExecution {
                        identifier: "UnimplementedFeature".to_string(),
                        message: format!("feature '{requested}' is not implemented by this server"),
                    })
            }
            "SetServerName" => {
                let name = parameters
                    .get("ServerName")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CallError::Validation("missing parameter 'ServerName'".to_string())
                    })?;
                if name.chars().count() > MAX_SERVER_NAME_LENGTH {
                    return Err(CallError::Validation(format!(
                        "server name exceeds {MAX_SERVER_NAME_LENGTH} characters"
                    )));
                }
                *self.state.name.write().unwrap_or_else(|e| e.into_inner()) = name.to_string();
                Ok(json!({}))
            }
            other => Err(CallError::UndefinedExecution(format!(
                "unexpected SiLAService command '{other}'"
            ))),
        }
    }

    fn read_property(
        &self,
        property: &Property,
        _context: &CallContext,
    ) -> Result<Value, CallError> {
        match property.identifier() {
            "ServerName" => Ok(json!(self
                .state
                .name
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone())),
            "ServerType" => Ok(json!(self.state.server_type)),
            "ServerUUID" => Ok(json!(self.state.uuid.to_string())),
            "ServerVersion" => Ok(json!(self.state.version)),
            "ServerDescription" => Ok(json!(self.state.description)),
            "ServerVendorURL" => Ok(json!(self.state.vendor_url)),
            "ImplementedFeatures" => {
                let features = self.state.features.read().unwrap_or_else(|e| e.into_inner());
                let identifiers: Vec<String> = features
                    .values()
                    .map(|f| f.fully_qualified_identifier().to_string())
                    .collect();
                Ok(json!(identifiers))
            }
            other => Err(CallError::UndefinedExecution(format!(
                "unexpected SiLAService property '{other}'"
            ))),
        }
    }
}
