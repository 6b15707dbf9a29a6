//! GI-010: Declaration-time error taxonomy.
//!
//! Every variant is fatal for the synthesis pass: no stack is written when
//! any of them is returned. Apply-time failures belong to Terraform and are
//! never modelled here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("variable '{0}' is not set (expected TF_VAR_{0})")]
    MissingVariable(String),

    #[error("variable '{name}' is malformed: {reason}")]
    MalformedVariable { name: String, reason: String },

    #[error("no scheme-qualified host found in '{0}'")]
    NoHostMatch(String),

    #[error("ambiguous host in '{input}': {count} candidates")]
    AmbiguousHost { input: String, count: usize },

    #[error("stack '{stack}': duplicate declaration '{address}'")]
    DuplicateDeclaration { stack: String, address: String },

    #[error("duplicate stack id '{0}'")]
    DuplicateStack(String),

    #[error("stack '{stack}': '{from}' depends on unknown '{to}'")]
    UnknownDependency {
        stack: String,
        from: String,
        to: String,
    },

    #[error("stack '{stack}': dependency cycle detected involving: {members}")]
    DependencyCycle { stack: String, members: String },

    #[error("stack '{stack}' declares bucket '{bucket}' which is reserved for the state backend")]
    StateBucketCollision { stack: String, bucket: String },

    #[error("stacks '{first}' and '{second}' share backend prefix '{prefix}'")]
    BackendPrefixCollision {
        first: String,
        second: String,
        prefix: String,
    },

    #[error("output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
