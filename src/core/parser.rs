//! GI-009: infra.yaml parsing and validation.
//!
//! Parses infra.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - The state bucket must be a valid GCS bucket name
//! - Stack ids must be non-empty and distinct
//! - Scaling bounds, concurrency and ports must be in range

use super::types::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "infra.yaml";

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn invalid(message: String) -> ValidationError {
    ValidationError { message }
}

/// Parse an infra.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<InfraConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse an infra.yaml from a string. An empty document yields the defaults.
pub fn parse_config(yaml: &str) -> Result<InfraConfig, String> {
    if yaml.trim().is_empty() {
        return Ok(InfraConfig::default());
    }
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Parse `path` if it exists, otherwise fall back to the built-in layout.
pub fn load_config(path: &Path) -> Result<InfraConfig, String> {
    if path.exists() {
        tracing::debug!(path = %path.display(), "loading config");
        parse_config_file(path)
    } else {
        tracing::info!(path = %path.display(), "config not found, using defaults");
        Ok(InfraConfig::default())
    }
}

/// Parse, then validate; all validation errors are joined into one message.
pub fn load_and_validate(path: &Path) -> Result<InfraConfig, String> {
    let config = load_config(path)?;
    let errors = validate_config(&config);
    if errors.is_empty() {
        Ok(config)
    } else {
        let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
        Err(format!(
            "{} has {} validation error(s):\n{}",
            path.display(),
            errors.len(),
            lines.join("\n")
        ))
    }
}

/// Template written by `init`.
pub fn config_template() -> Result<String, String> {
    let body = serde_yaml_ng::to_string(&InfraConfig::default())
        .map_err(|e| format!("serialize error: {}", e))?;
    Ok(format!(
        "# Go platform infrastructure. Every field is optional.\n{}",
        body
    ))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &InfraConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(invalid(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        )));
    }

    if config.name.trim().is_empty() {
        errors.push(invalid("name must not be empty".to_string()));
    }

    if !is_region(&config.provider.default_region) {
        errors.push(invalid(format!(
            "provider.default_region '{}' is not a region name",
            config.provider.default_region
        )));
    }

    if config.provider.google_version.trim().is_empty() {
        errors.push(invalid("provider.google_version must not be empty".to_string()));
    }

    if let Some(reason) = bucket_name_problem(&config.state_backend.bucket) {
        errors.push(invalid(format!(
            "state_backend.bucket '{}' {}",
            config.state_backend.bucket, reason
        )));
    }

    if config.state_backend.prefix_root.trim_matches('/').is_empty() {
        errors.push(invalid("state_backend.prefix_root must not be empty".to_string()));
    }

    validate_stack_ids(config, &mut errors);
    validate_session(&config.session_service, &mut errors);

    if config.registry.repository_id.is_empty() {
        errors.push(invalid("registry.repository_id must not be empty".to_string()));
    }

    errors
}

fn validate_stack_ids(config: &InfraConfig, errors: &mut Vec<ValidationError>) {
    let ids = [
        ("state_backend.stack_id", &config.state_backend.stack_id),
        ("registry.stack_id", &config.registry.stack_id),
        ("session_service.stack_id", &config.session_service.stack_id),
    ];
    let mut seen = HashSet::new();
    for (field, id) in ids {
        if id.trim().is_empty() {
            errors.push(invalid(format!("{} must not be empty", field)));
        } else if id.contains('/') {
            errors.push(invalid(format!("{} '{}' must not contain '/'", field, id)));
        } else if !seen.insert(id.as_str()) {
            errors.push(invalid(format!("{} '{}' is used by another stack", field, id)));
        }
    }
}

fn validate_session(session: &SessionServiceSettings, errors: &mut Vec<ValidationError>) {
    if session.service_id.is_empty() {
        errors.push(invalid("session_service.service_id must not be empty".to_string()));
    }

    let min = parse_scale("min_instances", &session.min_instances, errors);
    let max = parse_scale("max_instances", &session.max_instances, errors);
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            errors.push(invalid(format!(
                "session_service.min_instances ({}) exceeds max_instances ({})",
                min, max
            )));
        }
    }

    if session.container_concurrency == 0 {
        errors.push(invalid(
            "session_service.container_concurrency must be greater than 0".to_string(),
        ));
    }

    if session.container_port == 0 {
        errors.push(invalid("session_service.container_port must be 1-65535".to_string()));
    }

    match session.peer.port.parse::<u16>() {
        Ok(p) if p > 0 => {}
        _ => errors.push(invalid(format!(
            "session_service.peer.port '{}' must be 1-65535",
            session.peer.port
        ))),
    }

    if let Some(url) = &session.peer.url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(invalid(format!(
                "session_service.peer.url '{}' must start with http:// or https://",
                url
            )));
        }
    }

    if let Some(companion) = &session.companion {
        if companion.port == 0 {
            errors.push(invalid("session_service.companion.port must be 1-65535".to_string()));
        }
        if companion.port == session.container_port {
            errors.push(invalid(format!(
                "session_service.companion.port {} collides with container_port",
                companion.port
            )));
        }
        if companion.service_id == session.service_id {
            errors.push(invalid(
                "session_service.companion.service_id must differ from service_id".to_string(),
            ));
        }
    }

    if session.access.members.is_empty() {
        errors.push(invalid("session_service.access.members must not be empty".to_string()));
    }
}

fn parse_scale(field: &str, value: &str, errors: &mut Vec<ValidationError>) -> Option<u32> {
    match value.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            errors.push(invalid(format!(
                "session_service.{} '{}' must be a non-negative integer",
                field, value
            )));
            None
        }
    }
}

fn is_region(s: &str) -> bool {
    Regex::new(r"^[a-z]+-[a-z]+[0-9]+$")
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}

/// GCS naming rules for a non-domain bucket name.
fn bucket_name_problem(name: &str) -> Option<&'static str> {
    if name.len() < 3 || name.len() > 63 {
        return Some("must be 3-63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Some("may only contain lowercase letters, digits, '-', '_' and '.'");
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
        return Some("must start and end with a letter or digit");
    }
    if name.starts_with("goog") {
        return Some("must not start with 'goog'");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gi009_parse_overrides() {
        let yaml = r#"
version: "1.0"
name: staging
provider:
  default_region: us-central1
session_service:
  max_instances: "3"
  peer:
    url: https://socket.a.run.app
  companion: null
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.name, "staging");
        assert_eq!(config.provider.default_region, "us-central1");
        assert_eq!(config.session_service.max_instances, "3");
        assert_eq!(
            config.session_service.peer.url.as_deref(),
            Some("https://socket.a.run.app")
        );
        assert!(config.session_service.companion.is_none());
        // Untouched sections keep their defaults.
        assert_eq!(config.registry.repository_id, "go-services");
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_gi009_empty_is_default() {
        assert_eq!(parse_config("").unwrap(), InfraConfig::default());
        assert!(validate_config(&InfraConfig::default()).is_empty());
    }

    #[test]
    fn test_gi009_parse_error() {
        let err = parse_config("version: [unclosed").unwrap_err();
        assert!(err.contains("YAML parse error"));
    }

    #[test]
    fn test_gi009_bad_version() {
        let config = parse_config("version: \"2.0\"").unwrap();
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("version"));
    }

    #[test]
    fn test_gi009_bucket_names() {
        assert!(bucket_name_problem("go-infrastructure-terraform-state-storage").is_none());
        assert!(bucket_name_problem("ab").is_some());
        assert!(bucket_name_problem("Upper-Case").is_some());
        assert!(bucket_name_problem("-leading").is_some());
        assert!(bucket_name_problem("trailing.").is_some());
        assert!(bucket_name_problem("google-bucket").is_some());
        assert!(bucket_name_problem(&"a".repeat(64)).is_some());
    }

    #[test]
    fn test_gi009_duplicate_stack_ids() {
        let mut config = InfraConfig::default();
        config.registry.stack_id = config.state_backend.stack_id.clone();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("registry.stack_id") && e.message.contains("another stack")));
    }

    #[test]
    fn test_gi009_scaling_bounds() {
        let mut config = InfraConfig::default();
        config.session_service.min_instances = "5".to_string();
        config.session_service.max_instances = "2".to_string();
        assert!(validate_config(&config)[0].message.contains("exceeds"));

        config.session_service.min_instances = "-1".to_string();
        assert!(validate_config(&config)[0].message.contains("non-negative"));
    }

    #[test]
    fn test_gi009_concurrency_and_ports() {
        let mut config = InfraConfig::default();
        config.session_service.container_concurrency = 0;
        config.session_service.peer.port = "0".to_string();
        config.session_service.companion = Some(CompanionSettings {
            service_id: "bot".to_string(),
            port: 8080,
        });
        let messages: Vec<String> = validate_config(&config)
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages.len(), 3, "{:?}", messages);
    }

    #[test]
    fn test_gi009_region_shape() {
        assert!(is_region("europe-west1"));
        assert!(is_region("us-central1"));
        assert!(!is_region("eur3"));
        assert!(!is_region("Europe-West1"));
    }

    #[test]
    fn test_gi009_peer_url_scheme() {
        let mut config = InfraConfig::default();
        config.session_service.peer.url = Some("socket.a.run.app".to_string());
        assert_eq!(validate_config(&config).len(), 1);
    }

    #[test]
    fn test_gi009_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("infra.yaml")).unwrap();
        assert_eq!(config, InfraConfig::default());
    }

    #[test]
    fn test_gi009_load_and_validate_reports_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infra.yaml");
        std::fs::write(&path, "version: \"0.9\"\nname: \"\"\n").unwrap();
        let err = load_and_validate(&path).unwrap_err();
        assert!(err.contains("2 validation error(s)"));
    }

    #[test]
    fn test_gi009_template_roundtrips() {
        let template = config_template().unwrap();
        assert!(template.starts_with('#'));
        assert_eq!(parse_config(&template).unwrap(), InfraConfig::default());
    }
}
