//! Combination of expanded parameters into concrete parameter sets.
//!
//! Parameters are arranged on *axes*:
//! - every group is one axis whose members are zipped element-wise,
//! - every ranged parameter outside a group is an axis of its own,
//! - parameters following a range through `%(name)s` join the axis of the
//!   parameter they follow,
//! - scalars are not axes; they are copied into every set.
//!
//! With `combine` the sets are the Cartesian product of all axes (first axis
//! outermost). Without it the axes are walked in lock-step and truncated to
//! the shortest ranged axis.
//!
//! Axis order is: groups in the order given, which for a configuration file
//! is name order since `[groups]` is read as a sorted table, then independent
//! ranged parameters by name. Enumeration order is fully determined by the
//! input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::range::ParamValue;
use super::reference::ResolvedParameter;
use crate::core::TeazerError;

/// A named set of parameters iterated in lock-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterGroup {
    /// Group name, used in error messages
    pub name: String,
    /// Member parameter names, in declaration order
    pub members: Vec<String>,
}

/// One dimension of the parameter space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    /// Group name or, for an independent parameter, the parameter name
    pub name: String,
    /// Parameters sharing this axis
    pub members: Vec<String>,
    /// Number of entries along the axis
    pub len: usize,
}

/// One fully resolved parameter assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Position in the unfiltered enumeration, starting at 0
    pub index: usize,
    /// Value of every parameter
    pub values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    /// Restrict the assignment to the given parameter names.
    #[must_use]
    pub fn project(&self, names: &BTreeSet<String>) -> BTreeMap<String, ParamValue> {
        self.values
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Result of combining all parameters.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    /// Axes in enumeration order
    pub axes: Vec<Axis>,
    /// Parameters on axes longer than one
    pub varying: BTreeSet<String>,
    /// All values of every varying parameter
    pub variable_values: BTreeMap<String, Vec<ParamValue>>,
    /// Every parameter set, in enumeration order
    pub sets: Vec<ParameterSet>,
}

/// Builds the ordered list of parameter sets from resolved parameters.
pub struct GroupedProductBuilder<'a> {
    parameters: &'a BTreeMap<String, ResolvedParameter>,
    groups: &'a [ParameterGroup],
    combine: bool,
}

impl<'a> GroupedProductBuilder<'a> {
    /// Create a builder over resolved parameters and their groups.
    #[must_use]
    pub const fn new(
        parameters: &'a BTreeMap<String, ResolvedParameter>,
        groups: &'a [ParameterGroup],
        combine: bool,
    ) -> Self {
        Self {
            parameters,
            groups,
            combine,
        }
    }

    /// Arrange parameters on axes and enumerate all parameter sets.
    ///
    /// # Errors
    ///
    /// - [`TeazerError::GroupLengthMismatch`] when group members differ in length
    /// - [`TeazerError::InvalidValue`] for unknown group members, a parameter
    ///   in two groups, or a reference that ties two different axes together
    pub fn build(&self) -> Result<ParameterSpace, TeazerError> {
        let axes = self.axes()?;

        let varying: BTreeSet<String> =
            axes.iter().filter(|a| a.len > 1).flat_map(|a| a.members.iter().cloned()).collect();
        let variable_values = varying
            .iter()
            .map(|name| (name.clone(), self.parameters[name].values.clone()))
            .collect();

        let indices = if self.combine {
            cartesian_indices(&axes)
        } else {
            zipped_indices(&axes)
        };

        let sets = indices
            .into_iter()
            .enumerate()
            .map(|(index, position)| ParameterSet {
                index,
                values: self.assignment(&axes, &position),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "Built {} parameter sets over {} axes (combine={})",
            sets.len(),
            axes.len(),
            self.combine
        );

        Ok(ParameterSpace {
            axes,
            varying,
            variable_values,
            sets,
        })
    }

    fn axes(&self) -> Result<Vec<Axis>, TeazerError> {
        let mut axes: Vec<Axis> = Vec::new();
        // parameter name -> index into `axes`
        let mut axis_of: BTreeMap<String, usize> = BTreeMap::new();

        for group in self.groups {
            for member in &group.members {
                if !self.parameters.contains_key(member) {
                    return Err(TeazerError::InvalidValue {
                        key: format!("groups.{}", group.name),
                        raw: group.members.join(", "),
                        reason: format!("unknown parameter '{member}'"),
                    });
                }
                if axis_of.insert(member.clone(), axes.len()).is_some() {
                    return Err(TeazerError::InvalidValue {
                        key: format!("groups.{}", group.name),
                        raw: group.members.join(", "),
                        reason: format!("parameter '{member}' belongs to more than one group"),
                    });
                }
            }

            let lengths: Vec<usize> =
                group.members.iter().map(|m| self.parameters[m].values.len()).collect();
            if lengths.windows(2).any(|w| w[0] != w[1]) {
                return Err(TeazerError::GroupLengthMismatch {
                    group: group.name.clone(),
                    lengths: group
                        .members
                        .iter()
                        .zip(&lengths)
                        .map(|(m, l)| format!("{m}={l}"))
                        .collect::<Vec<_>>()
                        .join(", "),
                    raw: group
                        .members
                        .iter()
                        .map(|m| format!("{m} = '{}'", self.parameters[m].raw))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }

            axes.push(Axis {
                name: group.name.clone(),
                members: group.members.clone(),
                len: lengths.first().copied().unwrap_or(1),
            });
        }

        for (name, param) in self.parameters {
            if param.is_ranged() && param.anchors.is_empty() && !axis_of.contains_key(name) {
                axis_of.insert(name.clone(), axes.len());
                axes.push(Axis {
                    name: name.clone(),
                    members: vec![name.clone()],
                    len: param.values.len(),
                });
            }
        }

        for (name, param) in self.parameters.iter().filter(|(_, p)| !p.anchors.is_empty()) {
            let targets: BTreeSet<usize> =
                param.anchors.iter().filter_map(|a| axis_of.get(a).copied()).collect();
            let joined = param.anchors.iter().cloned().collect::<Vec<_>>().join(", ");
            if targets.len() != 1 {
                return Err(TeazerError::InvalidValue {
                    key: name.clone(),
                    raw: joined,
                    reason: "references ranged parameters that are not iterated together; put them in one group".to_string(),
                });
            }
            let target = targets.into_iter().next().unwrap_or_default();
            match axis_of.get(name) {
                Some(&own) if own != target => {
                    return Err(TeazerError::InvalidValue {
                        key: name.clone(),
                        raw: joined,
                        reason: format!(
                            "is grouped in '{}' but follows a parameter on axis '{}'",
                            axes[own].name, axes[target].name
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    axis_of.insert(name.clone(), target);
                    axes[target].members.push(name.clone());
                }
            }
        }

        Ok(axes)
    }

    fn assignment(&self, axes: &[Axis], position: &[usize]) -> BTreeMap<String, ParamValue> {
        let mut values: BTreeMap<String, ParamValue> = self
            .parameters
            .iter()
            .filter(|(_, p)| p.values.len() == 1)
            .map(|(name, p)| (name.clone(), p.values[0].clone()))
            .collect();

        for (axis, &at) in axes.iter().zip(position) {
            for member in &axis.members {
                let member_values = &self.parameters[member].values;
                let value = if member_values.len() == 1 {
                    &member_values[0]
                } else {
                    &member_values[at]
                };
                values.insert(member.clone(), value.clone());
            }
        }
        values
    }
}

/// Every combination of axis positions, first axis outermost.
fn cartesian_indices(axes: &[Axis]) -> Vec<Vec<usize>> {
    let mut result: Vec<Vec<usize>> = vec![Vec::with_capacity(axes.len())];
    for axis in axes {
        result = result
            .into_iter()
            .flat_map(|prefix| {
                (0..axis.len).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    result
}

/// Positions `0..n` on every axis, where `n` is the shortest ranged axis.
fn zipped_indices(axes: &[Axis]) -> Vec<Vec<usize>> {
    let ranged: Vec<&Axis> = axes.iter().filter(|a| a.len > 1).collect();
    let count = ranged.iter().map(|a| a.len).min().unwrap_or(1);

    if ranged.iter().any(|a| a.len != count) {
        let lengths =
            ranged.iter().map(|a| format!("{}={}", a.name, a.len)).collect::<Vec<_>>().join(", ");
        tracing::warn!(
            "combine is off and ranged axes differ in length ({lengths}); truncating to {count}"
        );
    }

    (0..count).map(|i| axes.iter().map(|a| if a.len > 1 { i } else { 0 }).collect()).collect()
}
