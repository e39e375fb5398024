//! SiLA RPC Framework
//!
//! This crate turns feature-definition documents into resolved,
//! addressable object graphs. A *feature* is a schema-described bundle of
//! commands, properties, metadata, type definitions, and error kinds
//! forming one RPC service unit; every node in the parsed graph is
//! reachable in O(1) through its fully qualified identifier.
//!
//! # Overview
//!
//! - [`Feature`] - parses one definition document and owns the resolved graph
//! - [`FullyQualifiedIdentifier`] - the global string key of every node
//! - [`DataType`] / [`DataTypeDefinition`] - the type algebra, with
//!   fixed-point resolution of forward-referencing named definitions
//! - [`Command`] / [`Property`] / [`Metadata`] / [`DefinedExecutionError`] -
//!   the schema-derived endpoint and side-channel nodes
//! - [`BinaryTransferHandler`] - narrow interface to the out-of-band
//!   binary payload store injected by the hosting server
//!
//! # Example
//!
//! ```no_run
//! use silarpc_framework::Feature;
//!
//! let definition = std::fs::read_to_string("Pump.sila.xml").unwrap();
//! let feature = Feature::new(&definition).unwrap();
//! println!("{}", feature.fully_qualified_identifier());
//! ```
//!
//! Construction either fully succeeds or fails with a
//! [`FrameworkError`]; no partially resolved feature is ever exposed.

pub mod binary;
pub mod command;
pub mod data_type;
pub mod defined_error;
pub mod errors;
pub mod feature;
pub mod identifier;
pub mod metadata;
pub mod node;
pub mod property;

mod xml;

pub use binary::BinaryTransferHandler;
pub use command::{Command, CommandField};
pub use data_type::{BasicType, Constraint, DataType, DataTypeDefinition, StructureElement};
pub use defined_error::DefinedExecutionError;
pub use errors::{FrameworkError, Result, UnresolvedDefinition};
pub use feature::{Feature, FeatureNode};
pub use identifier::FullyQualifiedIdentifier;
pub use metadata::Metadata;
pub use node::NodeInfo;
pub use property::Property;
