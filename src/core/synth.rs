//! GI-007: Composition container and synthesis.
//!
//! `App` owns the stacks of one composition. `synth` validates the whole
//! graph and renders every stack in memory; it performs no I/O, so a failure
//! at any point leaves nothing behind.

use super::error::{Result, SynthError};
use super::resolver;
use super::schema::Address;
use super::stack::{BackendRef, Stack};
use super::types::{InfraConfig, VarType};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Stacks of one composition, in insertion order.
#[derive(Debug)]
pub struct App {
    name: String,
    state_bucket: String,
    state_stack_id: String,
    stacks: IndexMap<String, Stack>,
}

impl App {
    pub fn new(config: &InfraConfig) -> Self {
        Self {
            name: config.name.clone(),
            state_bucket: config.state_backend.bucket.clone(),
            state_stack_id: config.state_backend.stack_id.clone(),
            stacks: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_stack(&mut self, stack: Stack) -> Result<()> {
        let id = stack.id().to_string();
        if self.stacks.contains_key(&id) {
            return Err(SynthError::DuplicateStack(id));
        }
        tracing::info!(stack = %id, declarations = stack.declarations().count(), "stack added");
        self.stacks.insert(id, stack);
        Ok(())
    }

    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.values()
    }

    pub fn stack(&self, id: &str) -> Option<&Stack> {
        self.stacks.get(id)
    }

    /// Whole-graph checks that no single stack can make on its own.
    pub fn validate(&self) -> Result<()> {
        let mut prefixes: HashMap<(&str, &str), &str> = HashMap::new();
        for stack in self.stacks.values() {
            resolver::build_declaration_order(stack)?;

            if stack.id() != self.state_stack_id {
                if let Some(bucket) = stack
                    .declarations()
                    .filter_map(|d| d.body.bucket_name())
                    .find(|name| *name == self.state_bucket)
                {
                    return Err(SynthError::StateBucketCollision {
                        stack: stack.id().to_string(),
                        bucket: bucket.to_string(),
                    });
                }
            }

            if let Some(backend) = &stack.context().backend {
                let key = (backend.bucket.as_str(), backend.prefix.as_str());
                if let Some(first) = prefixes.insert(key, stack.id()) {
                    return Err(SynthError::BackendPrefixCollision {
                        first: first.to_string(),
                        second: stack.id().to_string(),
                        prefix: backend.prefix.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate and render every stack.
    pub fn synth(&self) -> Result<SynthOutput> {
        self.validate()?;
        let mut stacks = Vec::with_capacity(self.stacks.len());
        for stack in self.stacks.values() {
            let rendered = SynthesizedStack::render(stack)?;
            tracing::info!(
                stack = %rendered.id,
                resources = rendered.resources,
                data_sources = rendered.data_sources,
                hash = %rendered.hash,
                "stack synthesized"
            );
            stacks.push(rendered);
        }
        Ok(SynthOutput {
            name: self.name.clone(),
            stacks,
        })
    }
}

/// Name and flags of a declared variable. Never holds a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSummary {
    pub name: String,
    pub var_type: VarType,
    pub sensitive: bool,
}

/// One rendered stack.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub id: String,
    /// Pretty-printed `cdk.tf.json`
    pub document: String,
    /// `blake3:<hex>` of `document`
    pub hash: String,
    pub backend: Option<BackendRef>,
    pub order: Vec<Address>,
    pub variables: Vec<VariableSummary>,
    pub resources: usize,
    pub data_sources: usize,
}

impl SynthesizedStack {
    fn render(stack: &Stack) -> Result<Self> {
        let order = resolver::build_declaration_order(stack)?;
        let mut document = serde_json::to_string_pretty(&stack.to_json()?)?;
        document.push('\n');
        let data_sources = stack
            .declarations()
            .filter(|d| d.address.kind.is_data_source())
            .count();
        Ok(Self {
            id: stack.id().to_string(),
            hash: hash_string(&document),
            document,
            backend: stack.context().backend.clone(),
            resources: order.len() - data_sources,
            data_sources,
            order,
            variables: stack
                .variables()
                .map(|v| VariableSummary {
                    name: v.name.clone(),
                    var_type: v.var_type,
                    sensitive: v.sensitive,
                })
                .collect(),
        })
    }

    /// Path of the document relative to the output directory.
    pub fn relative_path(&self) -> String {
        format!("stacks/{}/cdk.tf.json", self.id)
    }
}

/// Result of a synthesis pass, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct SynthOutput {
    pub name: String,
    pub stacks: Vec<SynthesizedStack>,
}

impl SynthOutput {
    pub fn manifest(&self) -> Value {
        let mut stacks = Map::new();
        for s in &self.stacks {
            stacks.insert(
                s.id.clone(),
                json!({
                    "name": s.id,
                    "synthesizedStackPath": s.relative_path(),
                    "workingDirectory": format!("stacks/{}", s.id),
                    "hash": s.hash,
                    "backend": s.backend.as_ref().map(|b| json!({
                        "type": "gcs",
                        "bucket": b.bucket,
                        "prefix": b.prefix,
                    })),
                }),
            );
        }
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "name": self.name,
            "stacks": Value::Object(stacks),
        })
    }

    /// Human-readable summary. Lists variable names, never values.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Synthesized {} ({} stacks)", self.name, self.stacks.len());
        for s in &self.stacks {
            let backend = match &s.backend {
                Some(b) => format!("gcs://{}/{}", b.bucket, b.prefix),
                None => "local".to_string(),
            };
            let _ = writeln!(
                out,
                "  {} [{}]: {} resource(s), {} data source(s)",
                s.id, backend, s.resources, s.data_sources
            );
            let vars: Vec<String> = s
                .variables
                .iter()
                .map(|v| {
                    if v.sensitive {
                        format!("{} (sensitive)", v.name)
                    } else {
                        v.name.clone()
                    }
                })
                .collect();
            let _ = writeln!(out, "    variables: {}", vars.join(", "));
            let _ = writeln!(out, "    {}", s.hash);
        }
        out
    }
}

/// `blake3:<hex>` of a string.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}
