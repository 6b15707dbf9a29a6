//! GI-011: Variable pre-flight.
//!
//! Terraform reads variable values from `TF_VAR_<name>` at apply time. This
//! check runs the same lookup before anything is written so a missing or
//! malformed value fails the synthesis instead of a later apply. Values are
//! only inspected, never stored, logged or echoed in errors.

use super::error::{Result, SynthError};
use super::types::{Encoding, VarType, Variable};
use base64::Engine;

/// Check every variable against `lookup`, which maps an environment key to
/// its value. Returns the first failure.
pub fn check_variables<'a, I, F>(variables: I, lookup: F) -> Result<usize>
where
    I: IntoIterator<Item = &'a Variable>,
    F: Fn(&str) -> Option<String>,
{
    let mut checked = 0;
    for var in variables {
        let value = lookup(&var.env_key()).ok_or_else(|| SynthError::MissingVariable(var.name.clone()))?;
        check_value(var, &value)?;
        tracing::debug!(variable = %var.name, sensitive = var.sensitive, "variable present");
        checked += 1;
    }
    Ok(checked)
}

fn check_value(var: &Variable, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(malformed(var, "value is empty"));
    }
    if var.var_type == VarType::Number && value.trim().parse::<f64>().is_err() {
        return Err(malformed(var, "expected a number"));
    }
    if var.encoding == Encoding::Base64 {
        base64::engine::general_purpose::STANDARD
            .decode(value.trim())
            .map_err(|_| malformed(var, "not valid base64"))?;
    }
    Ok(())
}

fn malformed(var: &Variable, reason: &str) -> SynthError {
    SynthError::MalformedVariable {
        name: var.name.clone(),
        reason: reason.to_string(),
    }
}

/// Read from the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
