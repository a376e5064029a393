//! Common types module for the bakery order service.
//!
//! This module defines the domain types shared by every crate in the
//! workspace: orders and products, HTTP payloads, storage keys, and the
//! schema used to validate backend configuration tables.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order types: products, the insert schema, and stored orders.
pub mod order;
/// Registry trait for named, self-registering implementations.
pub mod registry;
/// Redacting string wrapper for credentials and tokens.
pub mod secret_string;
/// Storage types for managing persistent data.
pub mod storage;
/// Configuration validation types for pluggable backends.
pub mod validation;

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use validation::*;
