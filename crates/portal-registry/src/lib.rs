//! Backend server registry for Portal.
//!
//! The registry maps a logical server name to the address players are
//! sent to and to the control-plane connection that registered it. The
//! routing layer reads it on every connect or transfer; registration and
//! disconnect events mutate it.
//!
//! # Key types
//!
//! - [`ServerRegistry`]: the shared, lock-guarded map
//! - [`ServerEntry`]: one registered server

mod registry;

pub use registry::{ServerEntry, ServerRegistry};
