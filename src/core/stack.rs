//! GI-005: Stack contexts and stacks.
//!
//! A stack context is built in layers by plain functions instead of a class
//! hierarchy: `base_context` carries the provider binding and default region,
//! `backend_context` adds the remote state backend. Concrete stacks receive a
//! finished context and add their declarations to a `Stack`.

use super::error::{Result, SynthError};
use super::expr::Expr;
use super::schema::{Address, Body};
use super::types::{InfraConfig, ProviderSettings, StateBackendSettings, Variable, VariableBlock};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::rc::Rc;

pub const PROJECT_VAR: &str = "google-project";
pub const CREDENTIALS_VAR: &str = "base64-encoded-google-credentials";

/// Registry host suffix: `<region>-docker.pkg.dev`.
const REGISTRY_HOST_SUFFIX: &str = "-docker.pkg.dev";

// ============================================================================
// Provider and backend
// ============================================================================

/// Provider authentication, shared read-only by every stack of a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub project: Variable,
    pub credentials: Variable,
    pub version: String,
}

impl ProviderConfig {
    pub fn google(settings: &ProviderSettings) -> Self {
        Self {
            project: Variable::string(PROJECT_VAR, "Google Cloud Console project"),
            credentials: Variable::string(
                CREDENTIALS_VAR,
                "Base64 encoded Google Cloud credentials",
            )
            .sensitive()
            .base64(),
            version: settings.google_version.clone(),
        }
    }

    pub fn project_ref(&self) -> Expr {
        Expr::var(&self.project.name)
    }

    /// Decoded by Terraform; a bad encoding surfaces at apply time.
    pub fn credentials_ref(&self) -> Expr {
        Expr::call("base64decode", vec![Expr::var(&self.credentials.name)])
    }
}

/// Where a stack's own Terraform state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRef {
    pub bucket: String,
    pub prefix: String,
}

impl BackendRef {
    pub fn for_stack(settings: &StateBackendSettings, stack_id: &str) -> Self {
        Self {
            bucket: settings.bucket.clone(),
            prefix: format!("{}/{}", settings.prefix_root.trim_end_matches('/'), stack_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackIdentity {
    pub id: String,
    pub region: String,
}

/// Everything a concrete stack inherits.
#[derive(Debug, Clone)]
pub struct StackContext {
    pub identity: StackIdentity,
    pub provider: Rc<ProviderConfig>,
    pub backend: Option<BackendRef>,
    pub registry_repository_id: String,
}

/// Provider binding and default region; state stays local.
pub fn base_context(provider: &Rc<ProviderConfig>, config: &InfraConfig, id: &str) -> StackContext {
    StackContext {
        identity: StackIdentity {
            id: id.to_string(),
            region: config.provider.default_region.clone(),
        },
        provider: Rc::clone(provider),
        backend: None,
        registry_repository_id: config.registry.repository_id.clone(),
    }
}

/// `base_context` plus a GCS backend under `<prefix root>/<id>`.
pub fn backend_context(
    provider: &Rc<ProviderConfig>,
    config: &InfraConfig,
    id: &str,
) -> StackContext {
    StackContext {
        backend: Some(BackendRef::for_stack(&config.state_backend, id)),
        ..base_context(provider, config, id)
    }
}

impl StackContext {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn region(&self) -> &str {
        &self.identity.region
    }

    pub fn project(&self) -> Expr {
        self.provider.project_ref()
    }

    /// `<region>-docker.pkg.dev/<project>/<repository>/<service_id>`
    pub fn container_image_repository_path(&self, service_id: &str) -> Expr {
        Expr::concat([
            Expr::lit(format!("{}{}/", self.region(), REGISTRY_HOST_SUFFIX)),
            self.project(),
            Expr::lit(format!("/{}/{}", self.registry_repository_id, service_id)),
        ])
    }

    /// Repository path tagged with `tag`.
    pub fn image_reference(&self, service_id: &str, tag: Expr) -> Expr {
        Expr::concat([
            self.container_image_repository_path(service_id),
            Expr::lit(":"),
            tag,
        ])
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// One resource or data source with its ordering edges.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub address: Address,
    pub body: Body,
    /// Emitted as Terraform `depends_on`.
    pub depends_on: Vec<Address>,
    /// Read through deferred references in `body`.
    pub value_deps: Vec<Address>,
}

impl Declaration {
    pub fn new(name: &str, body: Body) -> Self {
        Self {
            address: Address::new(body.kind(), name),
            value_deps: body.references(),
            body,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, address: &Address) -> Self {
        if !self.depends_on.contains(address) {
            self.depends_on.push(address.clone());
        }
        self
    }

    fn to_json(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&self.body)?;
        if !self.depends_on.is_empty() {
            if let Value::Object(map) = &mut value {
                map.insert(
                    "depends_on".to_string(),
                    Value::Array(
                        self.depends_on
                            .iter()
                            .map(|a| Value::String(a.to_string()))
                            .collect(),
                    ),
                );
            }
        }
        Ok(value)
    }
}

// ============================================================================
// Stack
// ============================================================================

/// A named unit of declarations sharing one state namespace.
#[derive(Debug, Clone)]
pub struct Stack {
    context: StackContext,
    variables: IndexMap<String, Variable>,
    declarations: IndexMap<Address, Declaration>,
}

impl Stack {
    /// New stack with the provider variables already declared.
    pub fn new(context: StackContext) -> Result<Self> {
        let mut stack = Self {
            context,
            variables: IndexMap::new(),
            declarations: IndexMap::new(),
        };
        let provider = Rc::clone(&stack.context.provider);
        stack.variable(provider.project.clone())?;
        stack.variable(provider.credentials.clone())?;
        Ok(stack)
    }

    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn context(&self) -> &StackContext {
        &self.context
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    pub fn get(&self, address: &Address) -> Option<&Declaration> {
        self.declarations.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.declarations.contains_key(address)
    }

    /// Declare an input variable and return a reference to it.
    pub fn variable(&mut self, var: Variable) -> Result<Expr> {
        validate_variable_name(&var.name)?;
        if var.description.trim().is_empty() {
            return Err(SynthError::InvalidVariable {
                name: var.name,
                reason: "description must not be empty".to_string(),
            });
        }
        if let Some(existing) = self.variables.get(&var.name) {
            if *existing != var {
                return Err(SynthError::InvalidVariable {
                    name: var.name,
                    reason: "declared twice with different definitions".to_string(),
                });
            }
        }
        let reference = Expr::var(&var.name);
        tracing::debug!(stack = self.id(), variable = %var.name, sensitive = var.sensitive, "variable declared");
        self.variables.insert(var.name.clone(), var);
        Ok(reference)
    }

    /// Add a declaration. Every variable it reads must already be declared.
    pub fn declare(&mut self, declaration: Declaration) -> Result<Address> {
        let address = declaration.address.clone();
        if self.declarations.contains_key(&address) {
            return Err(SynthError::DuplicateDeclaration {
                stack: self.id().to_string(),
                address: address.to_string(),
            });
        }
        for name in declaration.body.variables() {
            if !self.variables.contains_key(&name) {
                return Err(SynthError::InvalidVariable {
                    name,
                    reason: format!("read by '{}' but not declared in stack '{}'", address, self.id()),
                });
            }
        }
        tracing::debug!(stack = self.id(), address = %address, "declared");
        self.declarations.insert(address.clone(), declaration);
        Ok(address)
    }

    /// Terraform JSON document for this stack.
    pub fn to_json(&self) -> Result<Value> {
        let provider = &self.context.provider;

        let mut terraform = Map::new();
        terraform.insert(
            "required_providers".to_string(),
            json!({ "google": { "source": "google", "version": provider.version } }),
        );
        if let Some(backend) = &self.context.backend {
            terraform.insert(
                "backend".to_string(),
                json!({ "gcs": { "bucket": backend.bucket, "prefix": backend.prefix } }),
            );
        }

        let mut variables = Map::new();
        for var in self.variables.values() {
            variables.insert(var.name.clone(), serde_json::to_value(VariableBlock::from(var))?);
        }

        let mut resources: Map<String, Value> = Map::new();
        let mut data: Map<String, Value> = Map::new();
        for decl in self.declarations.values() {
            let section = if decl.address.kind.is_data_source() {
                &mut data
            } else {
                &mut resources
            };
            let by_type = section
                .entry(decl.address.kind.terraform_type())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(by_name) = by_type {
                by_name.insert(decl.address.name.clone(), decl.to_json()?);
            }
        }

        let backend_kind = if self.context.backend.is_some() {
            "gcs"
        } else {
            "local"
        };
        let mut doc = Map::new();
        doc.insert(
            "//".to_string(),
            json!({
                "metadata": {
                    "backend": backend_kind,
                    "stackName": self.id(),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        );
        doc.insert("terraform".to_string(), Value::Object(terraform));
        doc.insert(
            "provider".to_string(),
            json!({ "google": [{
                "project": provider.project_ref(),
                "credentials": provider.credentials_ref(),
            }] }),
        );
        doc.insert("variable".to_string(), Value::Object(variables));
        if !data.is_empty() {
            doc.insert("data".to_string(), Value::Object(data));
        }
        if !resources.is_empty() {
            doc.insert("resource".to_string(), Value::Object(resources));
        }
        Ok(Value::Object(doc))
    }
}

/// Terraform identifiers: a letter or underscore, then letters, digits, `_` or `-`.
fn validate_variable_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(SynthError::InvalidVariable {
            name: name.to_string(),
            reason: "not a valid Terraform identifier".to_string(),
        })
    }
}
