//! SiLA RPC Server
//!
//! This crate hosts resolved features (from `silarpc-framework`) as a
//! running, discoverable RPC service.
//!
//! # Architecture
//!
//! - [`SilaServer`] - lifecycle: construct, register features, serve, stop
//! - [`FeatureImplementation`] / [`FeatureServicer`] - behavior contract
//!   and the generic dispatch that binds it to a feature graph
//! - [`ServerRouter`] - JSON-RPC method routing, metadata interception,
//!   built-in `_info`/`_metrics` methods
//! - [`ChildTaskExecutor`] - bounded pool for implementation-spawned
//!   work, sized independently from the RPC workers
//! - [`Broadcaster`] - opaque discovery collaborator
//!
//! # Example
//!
//! ```no_run
//! use silarpc_server::{ServerConfig, ServerIdentity, SilaServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let identity = ServerIdentity {
//!         server_name: "Example Server".into(),
//!         server_type: "org.example.test".into(),
//!         server_description: "A demo server".into(),
//!         server_version: "1.0".into(),
//!         server_vendor_url: "https://example.org".into(),
//!         server_uuid: None,
//!     };
//!     let mut server = SilaServer::new(identity, ServerConfig::default()).unwrap();
//!     server.start_insecure("127.0.0.1", 50052, true).await.unwrap();
//!     // ...
//!     server.stop(None).await.unwrap();
//! }
//! ```

pub mod binary_store;
pub mod broadcaster;
pub mod child_tasks;
pub mod errors;
pub mod identity;
pub mod interceptor;
pub mod jsonrpc;
pub mod metrics;
pub mod router;
pub mod rpc;
pub mod server;
pub mod servicer;

mod sila_service;

pub use binary_store::InMemoryBinaryStore;
pub use broadcaster::{Broadcaster, RegistrationHandle, ServiceInfo};
pub use child_tasks::ChildTaskExecutor;
pub use errors::{CallError, Result, ServerError};
pub use identity::{ServerConfig, ServerIdentity};
pub use interceptor::{InterceptResult, MetadataInterceptor};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use metrics::{CallMetrics, MethodMetrics, MetricsSnapshot};
pub use router::ServerRouter;
pub use server::SilaServer;
pub use servicer::{
    CallContext, ExecutionStatus, FeatureImplementation, FeatureServicer, IntermediateSink,
    SubCall,
};
