//! GI-004: Host extraction from a service URL.
//!
//! Cloud Run reports only a full URL for a service; the session server needs
//! the bare authority. Two forms exist: `host_expr` defers the extraction to
//! Terraform for URLs only known at apply time, and `extract_host` performs it
//! immediately for URLs pinned in configuration.

use super::error::{Result, SynthError};
use super::expr::Expr;
use regex::Regex;

/// Pattern handed to Terraform's `regex()`; the single capture is the host.
pub const HOST_REGEX: &str = "^https?://([^:/?#]+)";

/// Unanchored form used for local extraction so a second host is detected.
/// Userinfo (`user:pw@`) is skipped.
const HOST_SCAN: &str = r"https?://(?:[^@/?#\s]*@)?([^:/?#@\s]+)";

/// Extract the authority host from a literal URL.
///
/// Exactly one `http://` or `https://` host must be present; port, path and
/// query are stripped.
pub fn extract_host(url: &str) -> Result<String> {
    let scanner = Regex::new(HOST_SCAN)
        .map_err(|e| SynthError::InvalidConfig(format!("host pattern: {}", e)))?;
    let hosts: Vec<&str> = scanner
        .captures_iter(url)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    match hosts.as_slice() {
        [] => Err(SynthError::NoHostMatch(url.to_string())),
        [host] => Ok((*host).to_string()),
        many => Err(SynthError::AmbiguousHost {
            input: url.to_string(),
            count: many.len(),
        }),
    }
}

/// Deferred extraction: `one(regex(HOST_REGEX, tostring(url)))`.
///
/// `one` makes Terraform fail the apply when the match is not unique.
pub fn host_expr(url: Expr) -> Expr {
    Expr::call(
        "one",
        vec![Expr::call(
            "regex",
            vec![Expr::lit(HOST_REGEX), Expr::call("tostring", vec![url])],
        )],
    )
}

/// Host for a URL that may or may not be known yet.
pub fn resolve_host(url: Expr) -> Result<Expr> {
    match url {
        Expr::Lit(s) => extract_host(&s).map(Expr::Lit),
        deferred => Ok(host_expr(deferred)),
    }
}
