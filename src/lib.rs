//! goban-infra: declarative Google Cloud infrastructure for the Go session platform.
//!
//! Stacks are assembled in memory from one shared configuration, validated as
//! a graph and synthesized to Terraform JSON. Provisioning is left to Terraform.

pub mod cli;
pub mod compose;
pub mod core;
pub mod resources;
