//! Resource operations built on [`Client`](crate::Client).
//!
//! Each operation resolves a path under a named service endpoint, describes
//! the call with a [`JsonRequest`](crate::JsonRequest) or
//! [`BinaryRequest`](crate::BinaryRequest) and lets the client do the rest.
//! Failures are annotated with the operation that failed.

pub mod compute;
pub mod object_store;

pub use compute::{Compute, Network};
pub use object_store::{ContainerContents, ListOptions, ObjectStore};

/// Endpoint name of the compute service.
pub const COMPUTE: &str = "compute";

/// Endpoint name of the object-storage service.
pub const OBJECT_STORE: &str = "object-store";
