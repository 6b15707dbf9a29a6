//! GI-006: Dependency DAG over a stack's declarations.
//!
//! Two edge kinds feed the graph: explicit `depends_on` edges and value edges
//! implied by deferred references. Both constrain the order; only explicit
//! edges are emitted to Terraform. The topological order uses Kahn's algorithm
//! with alphabetical tie-breaking so output is deterministic.

use super::error::{Result, SynthError};
use super::schema::Address;
use super::stack::Stack;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Explicit,
    Value,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Value => write!(f, "value"),
        }
    }
}

/// `from` must be provisioned after `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: Address,
    pub to: Address,
    pub kind: EdgeKind,
}

/// Every edge of a stack, explicit edges first per declaration.
pub fn edges(stack: &Stack) -> Vec<Edge> {
    let mut out = Vec::new();
    for decl in stack.declarations() {
        for dep in &decl.depends_on {
            out.push(Edge {
                from: decl.address.clone(),
                to: dep.clone(),
                kind: EdgeKind::Explicit,
            });
        }
        for dep in &decl.value_deps {
            out.push(Edge {
                from: decl.address.clone(),
                to: dep.clone(),
                kind: EdgeKind::Value,
            });
        }
    }
    out
}

/// True when `from` has an explicit edge to `to`.
pub fn has_explicit_edge(stack: &Stack, from: &Address, to: &Address) -> bool {
    stack
        .get(from)
        .is_some_and(|d| d.depends_on.contains(to))
}

/// Topological order of a stack's declarations.
pub fn build_declaration_order(stack: &Stack) -> Result<Vec<Address>> {
    let ids: Vec<Address> = stack.declarations().map(|d| d.address.clone()).collect();
    let mut in_degree: HashMap<Address, usize> = ids.iter().map(|a| (a.clone(), 0)).collect();
    let mut adjacency: HashMap<Address, Vec<Address>> =
        ids.iter().map(|a| (a.clone(), Vec::new())).collect();

    for decl in stack.declarations() {
        let mut seen: HashSet<&Address> = HashSet::new();
        for dep in decl.depends_on.iter().chain(decl.value_deps.iter()) {
            if !seen.insert(dep) {
                continue;
            }
            if dep == &decl.address {
                return Err(SynthError::DependencyCycle {
                    stack: stack.id().to_string(),
                    members: dep.to_string(),
                });
            }
            let dependents = adjacency
                .get_mut(dep)
                .ok_or_else(|| SynthError::UnknownDependency {
                    stack: stack.id().to_string(),
                    from: decl.address.to_string(),
                    to: dep.to_string(),
                })?;
            dependents.push(decl.address.clone());
            if let Some(degree) = in_degree.get_mut(&decl.address) {
                *degree += 1;
            }
        }
    }

    let mut zero_degree: Vec<Address> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(a, _)| a.clone())
        .collect();
    zero_degree.sort_by_key(|a| a.to_string());
    let mut queue: VecDeque<Address> = zero_degree.into();

    let mut order = Vec::new();
    while let Some(current) = queue.pop_front() {
        let mut next_ready: Vec<Address> = Vec::new();
        if let Some(dependents) = adjacency.get(&current) {
            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(dependent.clone());
                    }
                }
            }
        }
        next_ready.sort_by_key(|a| a.to_string());
        queue.extend(next_ready);
        order.push(current);
    }

    if order.len() != ids.len() {
        let ordered: HashSet<&Address> = order.iter().collect();
        let mut members: Vec<String> = ids
            .iter()
            .filter(|a| !ordered.contains(a))
            .map(|a| a.to_string())
            .collect();
        members.sort();
        return Err(SynthError::DependencyCycle {
            stack: stack.id().to_string(),
            members: members.join(", "),
        });
    }

    Ok(order)
}
