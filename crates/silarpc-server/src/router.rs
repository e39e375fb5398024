//! Call routing.
//!
//! The router owns the registered servicers and turns JSON-RPC requests
//! into dispatches. Built-in methods (`_info`, `_metrics`) are handled
//! directly; everything else is parsed as a `"Feature/Call"` path,
//! checked against the metadata interceptors in registration order, and
//! forwarded to the matching servicer.

use crate::errors::CallError;
use crate::interceptor::{InterceptResult, MetadataInterceptor};
use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::metrics::CallMetrics;
use crate::server::ServerState;
use crate::servicer::{CallContext, FeatureServicer, SubCall};
use serde_json::{json, Map, Value};
use silarpc_framework::{FeatureNode, FullyQualifiedIdentifier};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

pub struct ServerRouter {
    state: Arc<ServerState>,
    servicers: RwLock<HashMap<String, Arc<FeatureServicer>>>,
    interceptors: RwLock<Vec<Arc<dyn MetadataInterceptor>>>,
    metrics: CallMetrics,
}

impl ServerRouter {
    pub(crate) fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            servicers: RwLock::new(HashMap::new()),
            interceptors: RwLock::new(Vec::new()),
            metrics: CallMetrics::new(),
        }
    }

    pub(crate) fn insert_servicer(&self, identifier: String, servicer: Arc<FeatureServicer>) {
        self.servicers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identifier, servicer);
    }

    pub(crate) fn remove_servicer(&self, identifier: &str) -> Option<Arc<FeatureServicer>> {
        self.servicers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identifier)
    }

    pub(crate) fn servicer(&self, identifier: &str) -> Option<Arc<FeatureServicer>> {
        self.servicers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
            .cloned()
    }

    pub(crate) fn servicers(&self) -> Vec<Arc<FeatureServicer>> {
        self.servicers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn add_interceptor(&self, interceptor: Arc<dyn MetadataInterceptor>) {
        self.interceptors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(interceptor);
    }

    pub fn metrics(&self) -> &CallMetrics {
        &self.metrics
    }

    /// Handles one JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let start = Instant::now();
        let method = request.method.clone();
        let response = self.route(request);
        if !method.starts_with('_') {
            self.metrics
                .record_call(&method, start, response.error.is_none());
        }
        response
    }

    fn route(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "_info" => return JsonRpcResponse::success(id, self.server_info()),
            "_metrics" => {
                return match serde_json::to_value(self.metrics.snapshot()) {
                    Ok(snapshot) => JsonRpcResponse::success(id, snapshot),
                    Err(e) => JsonRpcResponse::error(
                        id,
                        JsonRpcError::internal_error(&e.to_string()),
                    ),
                }
            }
            _ => {}
        }

        // "{Feature}/{Call}" with an optional execution sub-call suffix.
        let segments: Vec<&str> = request.method.split('/').collect();
        let (feature_identifier, call, sub) = match segments.as_slice() {
            [feature, call] => (*feature, *call, None),
            [feature, call, sub] => match SubCall::parse(sub) {
                Some(sub) => (*feature, *call, Some(sub)),
                None => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::method_not_found(&request.method),
                    )
                }
            },
            _ => {
                return JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method))
            }
        };

        let Some(servicer) = self.servicer(feature_identifier) else {
            return JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method));
        };

        let (parameters, metadata) = split_envelope(&request.params);

        let feature_fqi = servicer.feature().fully_qualified_identifier().clone();
        let call_fqi = match servicer.feature().get(call) {
            Ok(FeatureNode::Property(_)) => feature_fqi.property(call),
            Ok(FeatureNode::Command(_)) => feature_fqi.command(call),
            Ok(FeatureNode::Metadata(_)) => feature_fqi.metadata(call),
            _ => {
                return JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method))
            }
        };
        let context = CallContext {
            feature: feature_fqi,
            call: call_fqi,
            metadata,
        };

        // Interceptors run in registration order; the first denial wins.
        let interceptors = self
            .interceptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for interceptor in interceptors {
            if let InterceptResult::Deny(reason) = interceptor.intercept(&context) {
                tracing::debug!(call = %context.call, %reason, "call denied by interceptor");
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::server_error(&format!("call denied: {reason}")),
                );
            }
        }

        match servicer.dispatch(call, sub, parameters, &context) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, call_error_to_jsonrpc(&error)),
        }
    }

    fn server_info(&self) -> Value {
        let features = self.state.features.read().unwrap_or_else(|e| e.into_inner());
        let identifiers: Vec<String> = features.keys().cloned().collect();
        json!({
            "server_type": "sila",
            "server_name": *self.state.name.read().unwrap_or_else(|e| e.into_inner()),
            "server_uuid": self.state.uuid.to_string(),
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_ms": self.metrics.uptime_ms(),
            "features": identifiers,
        })
    }
}

/// Splits the params envelope into call parameters and metadata.
///
/// Accepts `null` (no parameters), or an object with optional
/// `parameters` and `metadata` members; metadata keys are fully qualified
/// metadata identifiers.
fn split_envelope(params: &Value) -> (Value, HashMap<FullyQualifiedIdentifier, Value>) {
    let Some(envelope) = params.as_object() else {
        return (json!({}), HashMap::new());
    };
    let parameters = envelope.get("parameters").cloned().unwrap_or_else(|| json!({}));
    let metadata = envelope
        .get("metadata")
        .and_then(Value::as_object)
        .map(Map::iter)
        .into_iter()
        .flatten()
        .map(|(key, value)| (FullyQualifiedIdentifier::from(key.as_str()), value.clone()))
        .collect();
    (parameters, metadata)
}

fn call_error_to_jsonrpc(error: &CallError) -> JsonRpcError {
    match error {
        CallError::Validation(msg) => JsonRpcError::invalid_params(msg),
        CallError::NotFound(msg) => JsonRpcError::method_not_found(msg),
        CallError::DefinedExecution { identifier, message } => JsonRpcError {
            code: crate::jsonrpc::SERVER_ERROR,
            message: format!("Defined execution error '{identifier}': {message}"),
            data: Some(json!({
                "errorType": "DefinedExecutionError",
                "errorIdentifier": identifier,
            })),
        },
        other => JsonRpcError::server_error(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child_tasks::ChildTaskExecutor;
    use crate::errors::CallError;
    use crate::servicer::{FeatureImplementation, FeatureServicer};
    use silarpc_framework::{Feature, Property};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    const VALVE: &str = r#"<Feature SiLA2Version="1.0" FeatureVersion="1.0" Originator="org.example">
        <Identifier>Valve</Identifier>
        <DisplayName>Valve</DisplayName>
        <Description>Test valve.</Description>
        <Property>
            <Identifier>IsOpen</Identifier>
            <DisplayName>Is Open</DisplayName>
            <Description>Whether the valve is open.</Description>
            <Observable>No</Observable>
            <DataType><Basic>Boolean</Basic></DataType>
        </Property>
    </Feature>"#;

    struct ValveImpl;

    impl FeatureImplementation for ValveImpl {
        fn read_property(
            &self,
            _property: &Property,
            _context: &CallContext,
        ) -> Result<Value, CallError> {
            Ok(json!(true))
        }
    }

    struct OrderedInterceptor {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
        deny: bool,
    }

    impl MetadataInterceptor for OrderedInterceptor {
        fn intercept(&self, _context: &CallContext) -> InterceptResult {
            self.order.lock().unwrap().push(self.name);
            if self.deny {
                InterceptResult::Deny(format!("denied by {}", self.name))
            } else {
                InterceptResult::Allow
            }
        }
    }

    fn make_router() -> ServerRouter {
        let state = Arc::new(ServerState {
            uuid: Uuid::new_v4(),
            name: std::sync::RwLock::new("Test".to_string()),
            server_type: "org.example.test".to_string(),
            version: "1.0".to_string(),
            vendor_url: "https://example.org".to_string(),
            description: "Router tests".to_string(),
            features: std::sync::RwLock::new(BTreeMap::new()),
        });
        let router = ServerRouter::new(state);
        let feature = Arc::new(Feature::new(VALVE).unwrap());
        let servicer = Arc::new(FeatureServicer::new(
            feature,
            Arc::new(ValveImpl),
            Arc::new(ChildTaskExecutor::new(2)),
        ));
        router.insert_servicer("Valve".to_string(), servicer);
        router
    }

    #[tokio::test]
    async fn test_interceptors_run_in_registration_order() {
        let router = make_router();
        let order = Arc::new(Mutex::new(Vec::new()));
        router.add_interceptor(Arc::new(OrderedInterceptor {
            name: "first",
            order: order.clone(),
            deny: false,
        }));
        router.add_interceptor(Arc::new(OrderedInterceptor {
            name: "second",
            order: order.clone(),
            deny: false,
        }));

        let request = JsonRpcRequest::new("Valve/IsOpen", json!(null), json!(1));
        let response = router.handle_request(request).await;
        assert!(response.error.is_none());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_first_denial_short_circuits() {
        let router = make_router();
        let order = Arc::new(Mutex::new(Vec::new()));
        router.add_interceptor(Arc::new(OrderedInterceptor {
            name: "denier",
            order: order.clone(),
            deny: true,
        }));
        router.add_interceptor(Arc::new(OrderedInterceptor {
            name: "never",
            order: order.clone(),
            deny: false,
        }));

        let request = JsonRpcRequest::new("Valve/IsOpen", json!(null), json!(1));
        let response = router.handle_request(request).await;
        let error = response.error.unwrap();
        assert!(error.message.contains("denied by denier"));
        assert_eq!(*order.lock().unwrap(), vec!["denier"]);
    }

    #[tokio::test]
    async fn test_builtin_info_lists_features() {
        let router = make_router();
        let request = JsonRpcRequest::new("_info", json!(null), json!(1));
        let response = router.handle_request(request).await;
        let info = response.result.unwrap();
        assert_eq!(info["server_name"], json!("Test"));
    }

    #[tokio::test]
    async fn test_metrics_are_recorded_per_method() {
        let router = make_router();
        for _ in 0..3 {
            let request = JsonRpcRequest::new("Valve/IsOpen", json!(null), json!(1));
            router.handle_request(request).await;
        }
        let request = JsonRpcRequest::new("Valve/Missing", json!(null), json!(1));
        router.handle_request(request).await;

        let snapshot = router.metrics().snapshot();
        assert_eq!(snapshot.methods["Valve/IsOpen"].call_count, 3);
        assert_eq!(snapshot.methods["Valve/IsOpen"].failure_count, 0);
        assert_eq!(snapshot.methods["Valve/Missing"].failure_count, 1);
    }
}
