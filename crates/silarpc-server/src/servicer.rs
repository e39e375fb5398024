//! Generic dispatch binding a feature to its implementation.
//!
//! The source of truth for what is callable is the resolved [`Feature`]
//! graph; the implementation supplies behavior through the
//! [`FeatureImplementation`] trait. One [`FeatureServicer`] composes the
//! two: it resolves call identifiers through the feature's priority-order
//! lookup, routes unobservable calls synchronously, runs observable
//! command executions on the child-task pool, and tracks property
//! subscriptions so they can be cancelled at shutdown.

use crate::child_tasks::ChildTaskExecutor;
use crate::errors::CallError;
use serde::Serialize;
use serde_json::{json, Value};
use silarpc_framework::{Command, Feature, FeatureNode, FullyQualifiedIdentifier, Property};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Per-call context passed to interceptors and implementations.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// The feature the call targets.
    pub feature: FullyQualifiedIdentifier,
    /// The targeted command, property, or metadata node.
    pub call: FullyQualifiedIdentifier,
    /// Call metadata keyed by fully qualified metadata identifier.
    pub metadata: HashMap<FullyQualifiedIdentifier, Value>,
}

/// Sink for intermediate responses of a running observable command.
///
/// Only the most recent value is retained; slow readers observe the
/// latest state, not a backlog.
pub struct IntermediateSink {
    tx: watch::Sender<Value>,
}

impl IntermediateSink {
    pub fn send(&self, value: Value) {
        let _ = self.tx.send(value);
    }
}

/// Behavior of one feature, supplied by the user.
///
/// Implementations are synchronous; long-running observable command work
/// runs on the server's child-task pool. The lifecycle hooks `start` and
/// `stop` bracket the implementation's registration on a server.
pub trait FeatureImplementation: Send + Sync + 'static {
    /// Called when the hosting server starts serving (or immediately, if
    /// the feature is registered on an already-serving server).
    fn start(&self) {}

    /// Called exactly once when the implementation is replaced or the
    /// server stops.
    fn stop(&self) {}

    fn call_command(
        &self,
        command: &Command,
        parameters: Value,
        context: &CallContext,
    ) -> Result<Value, CallError> {
        let _ = (parameters, context);
        Err(CallError::UndefinedExecution(format!(
            "command '{}' is not implemented",
            command.identifier()
        )))
    }

    fn call_observable_command(
        &self,
        command: &Command,
        parameters: Value,
        context: &CallContext,
        intermediates: IntermediateSink,
    ) -> Result<Value, CallError> {
        let _ = (parameters, context, intermediates);
        Err(CallError::UndefinedExecution(format!(
            "observable command '{}' is not implemented",
            command.identifier()
        )))
    }

    fn read_property(
        &self,
        property: &Property,
        context: &CallContext,
    ) -> Result<Value, CallError> {
        let _ = context;
        Err(CallError::UndefinedExecution(format!(
            "property '{}' is not implemented",
            property.identifier()
        )))
    }

    fn subscribe_property(
        &self,
        property: &Property,
        context: &CallContext,
    ) -> Result<mpsc::Receiver<Value>, CallError> {
        let _ = context;
        Err(CallError::UndefinedExecution(format!(
            "property '{}' does not support subscription",
            property.identifier()
        )))
    }
}

/// State of one observable command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStatus {
    Running,
    FinishedSuccessfully,
    FinishedWithError,
}

struct Execution {
    status: Mutex<ExecutionStatus>,
    result: Mutex<Option<Result<Value, CallError>>>,
    intermediate: watch::Receiver<Value>,
}

/// Sub-call of an observable command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubCall {
    Status,
    Intermediate,
    Result,
}

impl SubCall {
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "Status" => Some(SubCall::Status),
            "Intermediate" => Some(SubCall::Intermediate),
            "Result" => Some(SubCall::Result),
            _ => None,
        }
    }
}

/// One registered feature bound to its implementation.
pub struct FeatureServicer {
    feature: Arc<Feature>,
    implementation: Arc<dyn FeatureImplementation>,
    child_tasks: Arc<ChildTaskExecutor>,
    executions: Arc<Mutex<HashMap<Uuid, Arc<Execution>>>>,
    subscriptions: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl FeatureServicer {
    pub fn new(
        feature: Arc<Feature>,
        implementation: Arc<dyn FeatureImplementation>,
        child_tasks: Arc<ChildTaskExecutor>,
    ) -> Self {
        Self {
            feature,
            implementation,
            child_tasks,
            executions: Arc::new(Mutex::new(HashMap::new())),
            subscriptions: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn feature(&self) -> &Arc<Feature> {
        &self.feature
    }

    /// Starts the implementation's lifecycle hook once.
    pub fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.implementation.start();
        }
    }

    /// Cancels subscriptions and stops the implementation. The stop hook
    /// runs at most once, also across replacement and server shutdown.
    pub fn stop(&self) {
        self.cancel_subscriptions();
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.implementation.stop();
        }
    }

    /// Aborts every tracked property subscription. In-flight observable
    /// command executions are not aborted here; they drain with the
    /// child-task pool.
    pub fn cancel_subscriptions(&self) {
        let handles = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for handle in handles {
            handle.abort();
        }
    }

    /// Routes one call to the implementation.
    ///
    /// The call identifier is resolved through the feature's
    /// priority-order lookup; observable commands return an execution
    /// UUID immediately and are queried via the `Status`, `Intermediate`,
    /// and `Result` sub-calls.
    pub fn dispatch(
        &self,
        call: &str,
        sub: Option<SubCall>,
        parameters: Value,
        context: &CallContext,
    ) -> Result<Value, CallError> {
        let node = self
            .feature
            .get(call)
            .map_err(|e| CallError::NotFound(e.to_string()))?;

        match node {
            FeatureNode::Property(property) => {
                if sub.is_some() {
                    return Err(CallError::Validation(format!(
                        "property '{call}' has no sub-calls"
                    )));
                }
                self.implementation.read_property(&property, context)
            }
            FeatureNode::Command(command) if !command.observable => {
                if sub.is_some() {
                    return Err(CallError::Validation(format!(
                        "unobservable command '{call}' has no sub-calls"
                    )));
                }
                self.implementation.call_command(&command, parameters, context)
            }
            FeatureNode::Command(command) => match sub {
                None => self.start_execution(command, parameters, context.clone()),
                Some(SubCall::Status) => {
                    let execution = self.execution(&parameters)?;
                    let status = *execution.status.lock().unwrap_or_else(|e| e.into_inner());
                    Ok(json!({ "status": status }))
                }
                Some(SubCall::Intermediate) => {
                    let execution = self.execution(&parameters)?;
                    let intermediate = execution.intermediate.borrow().clone();
                    Ok(intermediate)
                }
                Some(SubCall::Result) => {
                    let execution = self.execution(&parameters)?;
                    let result = execution.result.lock().unwrap_or_else(|e| e.into_inner());
                    match result.as_ref() {
                        Some(Ok(value)) => Ok(value.clone()),
                        Some(Err(error)) => Err(error.clone()),
                        None => Err(CallError::ExecutionNotFinished(
                            execution_uuid(&parameters).unwrap_or_default(),
                        )),
                    }
                }
            },
            FeatureNode::Metadata(metadata) => Err(CallError::Validation(format!(
                "metadata '{}' is not callable",
                metadata.identifier()
            ))),
            other => Err(CallError::NotFound(format!(
                "'{call}' is a {}, not a callable node",
                other.kind()
            ))),
        }
    }

    /// Subscribes to an observable property.
    ///
    /// The returned channel closes when the implementation ends the
    /// stream or the subscription is cancelled at shutdown.
    pub fn subscribe(
        &self,
        property_identifier: &str,
        context: &CallContext,
    ) -> Result<mpsc::Receiver<Value>, CallError> {
        let node = self
            .feature
            .get(property_identifier)
            .map_err(|e| CallError::NotFound(e.to_string()))?;
        let FeatureNode::Property(property) = node else {
            return Err(CallError::Validation(format!(
                "'{property_identifier}' is not a property"
            )));
        };
        if !property.observable {
            return Err(CallError::Validation(format!(
                "property '{property_identifier}' is not observable"
            )));
        }

        let mut source = self.implementation.subscribe_property(&property, context)?;
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move {
            while let Some(value) = source.recv().await {
                if tx.send(value).await.is_err() {
                    break;
                }
            }
        });
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        Ok(rx)
    }

    fn start_execution(
        &self,
        command: Arc<Command>,
        parameters: Value,
        context: CallContext,
    ) -> Result<Value, CallError> {
        let uuid = Uuid::new_v4();
        let (tx, rx) = watch::channel(Value::Null);
        let execution = Arc::new(Execution {
            status: Mutex::new(ExecutionStatus::Running),
            result: Mutex::new(None),
            intermediate: rx,
        });
        self.executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uuid, execution.clone());

        let implementation = self.implementation.clone();
        self.child_tasks
            .submit(move || {
                let sink = IntermediateSink { tx };
                let result =
                    implementation.call_observable_command(&command, parameters, &context, sink);
                let status = if result.is_ok() {
                    ExecutionStatus::FinishedSuccessfully
                } else {
                    ExecutionStatus::FinishedWithError
                };
                *execution.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
                *execution.result.lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
            })
            .map_err(|_| {
                CallError::UndefinedExecution("server is shutting down".to_string())
            })?;

        tracing::debug!(execution = %uuid, "started observable command execution");
        Ok(json!({ "commandExecutionUuid": uuid.to_string() }))
    }

    fn execution(&self, parameters: &Value) -> Result<Arc<Execution>, CallError> {
        let raw = execution_uuid(parameters)
            .ok_or_else(|| CallError::Validation("missing commandExecutionUuid".to_string()))?;
        let uuid = Uuid::parse_str(&raw).map_err(|_| CallError::UnknownExecution(raw.clone()))?;
        self.executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&uuid)
            .cloned()
            .ok_or(CallError::UnknownExecution(raw))
    }
}

fn execution_uuid(parameters: &Value) -> Option<String> {
    parameters
        .get("commandExecutionUuid")
        .and_then(Value::as_str)
        .map(str::to_string)
}
