//! GI-001: Shared configuration and variable types.
//!
//! `InfraConfig` is the one place every shared name lives: the state bucket,
//! the registry repository id, the default region and the per-stack settings.
//! All fields carry serde defaults so an empty `infra.yaml` (or no file at all)
//! yields the production layout.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level infra.yaml
// ============================================================================

/// Root configuration handed to the composition root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InfraConfig {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable composition name
    #[serde(default = "default_name")]
    pub name: String,

    /// Provider-wide settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Remote state backend shared by every backed stack
    #[serde(default)]
    pub state_backend: StateBackendSettings,

    /// Container image registry
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Session service stack
    #[serde(default)]
    pub session_service: SessionServiceSettings,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            provider: ProviderSettings::default(),
            state_backend: StateBackendSettings::default(),
            registry: RegistrySettings::default(),
            session_service: SessionServiceSettings::default(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_name() -> String {
    "go-infrastructure".to_string()
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderSettings {
    /// Region used by every resource that does not override it
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Version constraint for the `google` provider
    #[serde(default = "default_google_version")]
    pub google_version: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            google_version: default_google_version(),
        }
    }
}

fn default_region() -> String {
    "europe-west1".to_string()
}

fn default_google_version() -> String {
    "5.17.0".to_string()
}

// ============================================================================
// State backend
// ============================================================================

/// The bucket holding every backed stack's Terraform state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StateBackendSettings {
    /// Stack that declares the bucket itself (local state, bootstrap)
    #[serde(default = "default_state_stack_id")]
    pub stack_id: String,

    /// Bucket name; reserved, no other stack may declare a bucket with it
    #[serde(default = "default_state_bucket")]
    pub bucket: String,

    /// Prefix root; each stack stores its state under `<root>/<stack id>`
    #[serde(default = "default_prefix_root")]
    pub prefix_root: String,

    /// Storage class of the state bucket
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
}

impl Default for StateBackendSettings {
    fn default() -> Self {
        Self {
            stack_id: default_state_stack_id(),
            bucket: default_state_bucket(),
            prefix_root: default_prefix_root(),
            storage_class: default_storage_class(),
        }
    }
}

fn default_state_stack_id() -> String {
    "terraform-state-storage".to_string()
}

fn default_state_bucket() -> String {
    "go-infrastructure-terraform-state-storage".to_string()
}

fn default_prefix_root() -> String {
    "terraform/state".to_string()
}

fn default_storage_class() -> String {
    "STANDARD".to_string()
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegistrySettings {
    #[serde(default = "default_registry_stack_id")]
    pub stack_id: String,

    /// Artifact Registry repository id, also the third path segment of image refs
    #[serde(default = "default_repository_id")]
    pub repository_id: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            stack_id: default_registry_stack_id(),
            repository_id: default_repository_id(),
        }
    }
}

fn default_registry_stack_id() -> String {
    "container-registry".to_string()
}

fn default_repository_id() -> String {
    "go-services".to_string()
}

// ============================================================================
// Session service
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionServiceSettings {
    #[serde(default = "default_session_id")]
    pub stack_id: String,

    /// Cloud Run service name and image name
    #[serde(default = "default_session_id")]
    pub service_id: String,

    #[serde(default = "default_container_port")]
    pub container_port: u16,

    #[serde(default = "default_concurrency")]
    pub container_concurrency: u32,

    /// Kept as a string: it lands verbatim in a knative annotation
    #[serde(default = "default_max_instances")]
    pub max_instances: String,

    /// "0" permits scale-to-zero
    #[serde(default = "default_min_instances")]
    pub min_instances: String,

    #[serde(default)]
    pub data_store: DataStoreSettings,

    #[serde(default)]
    pub peer: PeerServiceSettings,

    /// Companion container sharing the pod network; `null` disables it
    #[serde(default = "default_companion")]
    pub companion: Option<CompanionSettings>,

    #[serde(default)]
    pub access: AccessSettings,
}

impl Default for SessionServiceSettings {
    fn default() -> Self {
        Self {
            stack_id: default_session_id(),
            service_id: default_session_id(),
            container_port: default_container_port(),
            container_concurrency: default_concurrency(),
            max_instances: default_max_instances(),
            min_instances: default_min_instances(),
            data_store: DataStoreSettings::default(),
            peer: PeerServiceSettings::default(),
            companion: default_companion(),
            access: AccessSettings::default(),
        }
    }
}

fn default_session_id() -> String {
    "go-session-server".to_string()
}

fn default_container_port() -> u16 {
    8080
}

fn default_concurrency() -> u32 {
    80
}

fn default_max_instances() -> String {
    "1".to_string()
}

fn default_min_instances() -> String {
    "0".to_string()
}

fn default_companion() -> Option<CompanionSettings> {
    Some(CompanionSettings::default())
}

/// Firestore database backing the session service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataStoreSettings {
    #[serde(default = "default_store_resource")]
    pub resource_name: String,

    /// Database id; "(default)" is the project's default database
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Firestore is only offered in some locations, so this is independent
    /// of the provider's default region
    #[serde(default = "default_store_location")]
    pub location: String,

    #[serde(default = "default_store_type")]
    pub database_type: String,

    /// Point the service at an emulator instead of the managed database
    #[serde(default)]
    pub emulator_host: Option<String>,
}

impl Default for DataStoreSettings {
    fn default() -> Self {
        Self {
            resource_name: default_store_resource(),
            database_name: default_database_name(),
            location: default_store_location(),
            database_type: default_store_type(),
            emulator_host: None,
        }
    }
}

fn default_store_resource() -> String {
    "session-store".to_string()
}

fn default_database_name() -> String {
    "(default)".to_string()
}

fn default_store_location() -> String {
    "eur3".to_string()
}

fn default_store_type() -> String {
    "FIRESTORE_NATIVE".to_string()
}

/// Independently deployed socket service the session server talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeerServiceSettings {
    /// Cloud Run service looked up at apply time
    #[serde(default = "default_peer_service")]
    pub service_name: String,

    /// Data source name for the lookup
    #[serde(default = "default_peer_lookup")]
    pub lookup_name: String,

    /// Pin the peer URL instead of looking it up; the host is then
    /// extracted during synthesis
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_peer_port")]
    pub port: String,
}

impl Default for PeerServiceSettings {
    fn default() -> Self {
        Self {
            service_name: default_peer_service(),
            lookup_name: default_peer_lookup(),
            url: None,
            port: default_peer_port(),
        }
    }
}

fn default_peer_service() -> String {
    "go-game-socket-server".to_string()
}

fn default_peer_lookup() -> String {
    "game-client-socket-host".to_string()
}

fn default_peer_port() -> String {
    "80".to_string()
}

/// Bot engine container deployed next to the session server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompanionSettings {
    #[serde(default = "default_companion_id")]
    pub service_id: String,

    #[serde(default = "default_companion_port")]
    pub port: u16,
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            service_id: default_companion_id(),
            port: default_companion_port(),
        }
    }
}

fn default_companion_id() -> String {
    "go-gnugo-bot".to_string()
}

fn default_companion_port() -> u16 {
    8001
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccessSettings {
    #[serde(default = "default_binding_name")]
    pub binding_name: String,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_members")]
    pub members: Vec<String>,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            binding_name: default_binding_name(),
            role: default_role(),
            members: default_members(),
        }
    }
}

fn default_binding_name() -> String {
    "allow-public-access".to_string()
}

fn default_role() -> String {
    "roles/run.invoker".to_string()
}

fn default_members() -> Vec<String> {
    vec!["allUsers".to_string()]
}

// ============================================================================
// Variables
// ============================================================================

/// Terraform variable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    String,
    Number,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
        }
    }
}

/// How a string variable's value is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Base64,
}

/// An externally supplied input. Carries no value and no default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub var_type: VarType,
    pub sensitive: bool,
    pub description: String,
    pub encoding: Encoding,
}

impl Variable {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            var_type: VarType::String,
            sensitive: false,
            description: description.to_string(),
            encoding: Encoding::Plain,
        }
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self {
            var_type: VarType::Number,
            ..Self::string(name, description)
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn base64(mut self) -> Self {
        self.encoding = Encoding::Base64;
        self
    }

    /// Environment key Terraform reads the value from.
    pub fn env_key(&self) -> String {
        format!("TF_VAR_{}", self.name)
    }
}

/// The `variable` block body as Terraform expects it.
#[derive(Debug, Serialize)]
pub(crate) struct VariableBlock<'a> {
    #[serde(rename = "type")]
    pub var_type: VarType,
    pub description: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl<'a> From<&'a Variable> for VariableBlock<'a> {
    fn from(v: &'a Variable) -> Self {
        Self {
            var_type: v.var_type,
            description: &v.description,
            sensitive: v.sensitive,
        }
    }
}
