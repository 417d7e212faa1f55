//! Materializes a want graph from declarative `using` label-selectors.

use std::collections::HashMap;

use crate::error::{Result, WantError};
use crate::registry::TypeRegistry;
use crate::want::Want;

/// For each want id, its resolved input topics (= the producing wants'
/// ids), in the order their selectors matched over a stable iteration of
/// the graph. A want's single output topic is always its own id.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub inputs: HashMap<String, Vec<String>>,
}

impl ResolvedGraph {
    pub fn inputs_for(&self, want_id: &str) -> &[String] {
        self.inputs.get(want_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every want whose inputs include `want_id` — i.e. its consumers.
    pub fn consumers_of(&self, want_id: &str) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|(_, ins)| ins.iter().any(|id| id == want_id))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Resolve `wants` against `registry`, validating connectivity bounds.
///
/// Within a want's inputs, selectors are matched in the order declared in
/// `using`, and for each selector, against wants in their declared order
/// in `wants` — giving the step function a deterministic input ordering.
pub fn resolve(wants: &[Want], registry: &TypeRegistry) -> Result<ResolvedGraph> {
    let mut graph = ResolvedGraph::default();

    for want in wants {
        if !registry.contains(&want.metadata.type_name) {
            return Err(WantError::Validation(format!(
                "want '{}' declares unknown type '{}'",
                want.metadata.name, want.metadata.type_name
            )));
        }

        let mut inputs = Vec::new();
        for selector in &want.spec.using {
            for candidate in wants {
                if candidate.id() == want.id() {
                    continue;
                }
                if candidate.matches(selector) {
                    inputs.push(candidate.id().to_string());
                }
            }
        }
        graph.inputs.insert(want.id().to_string(), inputs);
    }

    for want in wants {
        let entry = registry.get(&want.metadata.type_name)?;
        let in_count = graph.inputs_for(want.id()).len();
        let out_count = graph.consumers_of(want.id()).len();

        if !entry.connectivity.in_bounds(in_count) {
            return Err(WantError::Validation(format!(
                "want '{}' (type '{}') has {} input(s); requires {}..{}",
                want.metadata.name,
                want.metadata.type_name,
                in_count,
                entry.connectivity.required_in,
                describe_bound(entry.connectivity.max_in),
            )));
        }
        if !entry.connectivity.out_bounds(out_count) {
            return Err(WantError::Validation(format!(
                "want '{}' (type '{}') has {} output consumer(s); requires {}..{}",
                want.metadata.name,
                want.metadata.type_name,
                out_count,
                entry.connectivity.required_out,
                describe_bound(entry.connectivity.max_out),
            )));
        }
    }

    Ok(graph)
}

fn describe_bound(max: i32) -> String {
    if max < 0 {
        "unbounded".to_string()
    } else {
        max.to_string()
    }
}
