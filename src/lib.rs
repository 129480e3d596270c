//! Richiesta library crate
//!
//! Adaptive suggestion and clarification engine for free-text marketplace
//! requests. Exposes the engine modules so the CLI binary and external
//! tooling can drive sessions without going through interactive startup.

pub mod assist;
pub mod cache;
pub mod clarify;
pub mod config;
pub mod patterns;
pub mod score;
pub mod session;
pub mod store;
pub mod synth;
pub mod util;
