//! Core synthesis logic: configuration, deferred references, stacks, ordering and output.

pub mod error;
pub mod expr;
pub mod host;
pub mod output;
pub mod parser;
pub mod preflight;
pub mod resolver;
pub mod schema;
pub mod stack;
pub mod synth;
pub mod types;
