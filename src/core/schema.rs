//! GI-002: Google provider schema subset.
//!
//! Typed bodies for the resource and data-source kinds this crate declares,
//! serialized with the attribute names of `hashicorp/google` so the emitted
//! JSON is accepted by Terraform as-is.

use super::expr::Expr;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Resource or data-source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    StorageBucket,
    ArtifactRegistryRepository,
    FirestoreDatabase,
    CloudRunService,
    CloudRunServiceIamBinding,
    /// `data "google_cloud_run_service"`
    CloudRunServiceData,
}

impl ResourceKind {
    /// Terraform type name.
    pub fn terraform_type(&self) -> &'static str {
        match self {
            Self::StorageBucket => "google_storage_bucket",
            Self::ArtifactRegistryRepository => "google_artifact_registry_repository",
            Self::FirestoreDatabase => "google_firestore_database",
            Self::CloudRunService | Self::CloudRunServiceData => "google_cloud_run_service",
            Self::CloudRunServiceIamBinding => "google_cloud_run_service_iam_binding",
        }
    }

    pub fn is_data_source(&self) -> bool {
        matches!(self, Self::CloudRunServiceData)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_data_source() {
            write!(f, "data.{}", self.terraform_type())
        } else {
            write!(f, "{}", self.terraform_type())
        }
    }
}

/// Fully qualified declaration address within a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub kind: ResourceKind,
    pub name: String,
}

impl Address {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

// ============================================================================
// Bodies
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StorageBucket {
    pub name: String,
    pub location: String,
    pub storage_class: String,
    pub force_destroy: bool,
    pub public_access_prevention: String,
    pub versioning: Versioning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Versioning {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRegistryRepository {
    pub format: String,
    pub repository_id: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FirestoreDatabase {
    pub project: Expr,
    pub name: String,
    pub location_id: String,
    #[serde(rename = "type")]
    pub database_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloudRunService {
    pub name: String,
    pub location: String,
    pub template: ServiceTemplate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceTemplate {
    pub metadata: TemplateMetadata,
    pub spec: TemplateSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateMetadata {
    pub annotations: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSpec {
    pub container_concurrency: u32,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Container {
    pub name: String,
    pub image: Expr,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerPort {
    pub container_port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: Expr,
}

impl EnvVar {
    pub fn new(name: &str, value: impl Into<Expr>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CloudRunServiceIamBinding {
    pub location: String,
    pub service: Expr,
    pub role: String,
    pub members: Vec<String>,
}

/// Lookup of an independently managed Cloud Run service.
#[derive(Debug, Clone, Serialize)]
pub struct CloudRunServiceLookup {
    pub location: String,
    pub name: String,
}

/// Any declarable body.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Body {
    StorageBucket(StorageBucket),
    ArtifactRegistryRepository(ArtifactRegistryRepository),
    FirestoreDatabase(FirestoreDatabase),
    CloudRunService(CloudRunService),
    CloudRunServiceIamBinding(CloudRunServiceIamBinding),
    CloudRunServiceData(CloudRunServiceLookup),
}

impl Body {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::StorageBucket(_) => ResourceKind::StorageBucket,
            Self::ArtifactRegistryRepository(_) => ResourceKind::ArtifactRegistryRepository,
            Self::FirestoreDatabase(_) => ResourceKind::FirestoreDatabase,
            Self::CloudRunService(_) => ResourceKind::CloudRunService,
            Self::CloudRunServiceIamBinding(_) => ResourceKind::CloudRunServiceIamBinding,
            Self::CloudRunServiceData(_) => ResourceKind::CloudRunServiceData,
        }
    }

    /// Every deferred value in the body.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Self::FirestoreDatabase(db) => vec![&db.project],
            Self::CloudRunService(svc) => svc
                .template
                .spec
                .containers
                .iter()
                .flat_map(|c| std::iter::once(&c.image).chain(c.env.iter().map(|e| &e.value)))
                .collect(),
            Self::CloudRunServiceIamBinding(b) => vec![&b.service],
            Self::StorageBucket(_)
            | Self::ArtifactRegistryRepository(_)
            | Self::CloudRunServiceData(_) => Vec::new(),
        }
    }

    /// Declarations this body reads values from.
    pub fn references(&self) -> Vec<Address> {
        let mut out: Vec<Address> = Vec::new();
        for expr in self.exprs() {
            for addr in expr.references() {
                if !out.contains(&addr) {
                    out.push(addr);
                }
            }
        }
        out
    }

    /// Variables this body reads.
    pub fn variables(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for expr in self.exprs() {
            for name in expr.variables() {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }

    /// Bucket name, for collision checks.
    pub fn bucket_name(&self) -> Option<&str> {
        match self {
            Self::StorageBucket(b) => Some(&b.name),
            _ => None,
        }
    }
}
