//! Concrete stacks.
//!
//! Each module exposes `build(provider, config)`, which receives the shared
//! provider binding and configuration and returns a finished `Stack`.

pub mod container_registry;
pub mod session_service;
pub mod state_storage;
