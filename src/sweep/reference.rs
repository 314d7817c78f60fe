//! Resolution of `%(name)s` cross references between parameters.
//!
//! A parameter whose raw value mentions `%(other)s` is not ranged on its own:
//! it takes one value per value of `other`, in the same order, and therefore
//! moves in lock-step with it during the product (see [`super::product`]).
//! Chains (`C` refers to `B` which refers to `A`) resolve in dependency
//! order. `%%` stands for a literal `%`.
//!
//! The reference graph is checked for cycles before any value is expanded.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use super::range::{ParamValue, expand_range, is_ranged};
use crate::core::TeazerError;

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%|%\(([A-Za-z0-9_.\-]+)\)s").expect("valid reference regex"));

/// A parameter after references have been substituted and ranges expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    /// Value as written in the configuration
    pub raw: String,
    /// Expanded values, at least one
    pub values: Vec<ParamValue>,
    /// Ranged parameters this one must move in lock-step with.
    ///
    /// Empty for parameters that are independent (or scalar).
    pub anchors: BTreeSet<String>,
}

impl ResolvedParameter {
    /// Whether this parameter contributes more than one value.
    #[must_use]
    pub fn is_ranged(&self) -> bool {
        self.values.len() > 1
    }
}

/// Names referenced by a raw value, in order of appearance.
#[must_use]
pub fn references(raw: &str) -> Vec<String> {
    REFERENCE
        .captures_iter(raw)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Reference graph: an edge `a → b` means `a` mentions `%(b)s`.
struct ReferenceGraph {
    graph: DiGraph<String, ()>,
    nodes: BTreeMap<String, NodeIndex>,
    raw: BTreeMap<String, String>,
}

impl ReferenceGraph {
    fn build(raw: &BTreeMap<String, String>) -> Result<Self, TeazerError> {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for name in raw.keys() {
            nodes.insert(name.clone(), graph.add_node(name.clone()));
        }

        for (name, value) in raw {
            for reference in references(value) {
                let Some(&to) = nodes.get(&reference) else {
                    return Err(TeazerError::UnknownReference {
                        key: name.clone(),
                        reference,
                        raw: value.clone(),
                    });
                };
                let from = nodes[name];
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Ok(Self {
            graph,
            nodes,
            raw: raw.clone(),
        })
    }

    fn detect_cycles(&self) -> Result<(), TeazerError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path = Vec::new();

        for node in self.nodes.values().copied() {
            if colors[&node] == Color::White
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(TeazerError::CyclicReference {
                    raw: self.raw_values(&cycle),
                    chain: cycle.join(" → "),
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors[&neighbor] {
                Color::Gray => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| self.graph[*n].clone()).collect();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// `name = 'raw'` for each distinct name, in order.
    fn raw_values(&self, names: &[String]) -> String {
        let mut seen = BTreeSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| format!("{name} = '{}'", self.raw.get(name).map_or("", String::as_str)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Names ordered so that every parameter comes after the ones it references.
    fn resolution_order(&self) -> Result<Vec<String>, TeazerError> {
        self.detect_cycles()?;
        let order = toposort(&self.graph, None).map_err(|cycle| {
            let name = self.graph[cycle.node_id()].clone();
            TeazerError::CyclicReference {
                raw: self.raw_values(std::slice::from_ref(&name)),
                chain: name,
            }
        })?;
        Ok(order.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
    }
}

/// Resolve references and expand every parameter.
///
/// # Errors
///
/// - [`TeazerError::UnknownReference`] when `%(x)s` names a missing parameter
/// - [`TeazerError::CyclicReference`] when references form a cycle
/// - [`TeazerError::MalformedRange`] from expanding a value
/// - [`TeazerError::InvalidValue`] when a template mixes ranged referents of
///   different lengths, or produces a range itself while following one
pub fn resolve_parameters(
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, ResolvedParameter>, TeazerError> {
    let order = ReferenceGraph::build(raw)?.resolution_order()?;
    tracing::debug!("Resolving {} parameters in order: {}", order.len(), order.join(", "));

    let mut resolved: BTreeMap<String, ResolvedParameter> = BTreeMap::new();
    for name in order {
        let template = &raw[&name];
        let refs = references(template);

        let parameter = if refs.is_empty() {
            ResolvedParameter {
                raw: template.clone(),
                values: expand_range(&name, &substitute(template, &resolved, 0))?,
                anchors: BTreeSet::new(),
            }
        } else {
            resolve_template(&name, template, &refs, &resolved)?
        };
        resolved.insert(name, parameter);
    }

    Ok(resolved)
}

fn resolve_template(
    name: &str,
    template: &str,
    refs: &[String],
    resolved: &BTreeMap<String, ResolvedParameter>,
) -> Result<ResolvedParameter, TeazerError> {
    let invalid = |reason: String| TeazerError::InvalidValue {
        key: name.to_string(),
        raw: template.to_string(),
        reason,
    };

    let mut length = 1;
    let mut anchors = BTreeSet::new();
    for reference in refs {
        let referent = &resolved[reference];
        if !referent.is_ranged() {
            continue;
        }
        if length > 1 && referent.values.len() != length {
            return Err(invalid(format!(
                "referenced ranged parameters have different lengths ({length} and {} for '{reference}')",
                referent.values.len()
            )));
        }
        length = referent.values.len();
        if referent.anchors.is_empty() {
            anchors.insert(reference.clone());
        } else {
            anchors.extend(referent.anchors.iter().cloned());
        }
    }

    if length == 1 {
        // All referents are scalar: plain textual substitution, which may
        // itself describe a range.
        let text = substitute(template, resolved, 0);
        return Ok(ResolvedParameter {
            raw: template.to_string(),
            values: expand_range(name, &text)?,
            anchors,
        });
    }

    let mut values = Vec::with_capacity(length);
    for index in 0..length {
        let text = substitute(template, resolved, index);
        if is_ranged(&text) {
            return Err(invalid(format!(
                "entry {index} expands to '{text}', but a parameter following a range must produce one value per entry"
            )));
        }
        values.push(ParamValue::parse(&text));
    }

    Ok(ResolvedParameter {
        raw: template.to_string(),
        values,
        anchors,
    })
}

/// Substitute entry `index` of every referent (scalars broadcast).
fn substitute(template: &str, resolved: &BTreeMap<String, ResolvedParameter>, index: usize) -> String {
    REFERENCE
        .replace_all(template, |caps: &regex::Captures<'_>| match caps.get(1) {
            None => "%".to_string(),
            Some(name) => {
                let values = &resolved[name.as_str()].values;
                let value = if values.len() == 1 {
                    &values[0]
                } else {
                    &values[index]
                };
                value.to_string()
            }
        })
        .into_owned()
}
