//! Configuration module.
//!
//! Connection descriptors, backend tags, and the config provider the
//! pool and facade consult.

pub mod connection;
pub mod settings;

pub use connection::{BackendType, ConnectionDescriptor};
pub use settings::{expand_env_vars, JrmConfig, PoolBackend};
