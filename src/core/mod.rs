// src/core/mod.rs

//! The central module containing the core logic of SpinelScope: the session
//! registry and the three operations that run against a session.

pub mod errors;
pub mod inspector;
pub mod metrics;
pub mod mutation;
pub mod profile;
pub mod registry;
pub mod scanner;

pub use errors::SpinelScopeError;
