//! Subset selection over the enumerated parameter sets.
//!
//! Syntax: `kappa=0.1,0.2;eta=1 | kappa=0.5`. Alternatives are separated by
//! `|`; within an alternative every listed parameter must take one of the
//! listed values. Values may be slices (`n=1:3`). An empty expression
//! selects everything.

use std::collections::{BTreeMap, BTreeSet};

use super::product::ParameterSet;
use super::range::{ParamValue, expand_range};
use crate::core::TeazerError;

/// A parsed subset expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subset {
    alternatives: Vec<BTreeMap<String, BTreeSet<ParamValue>>>,
}

impl Subset {
    /// A subset that selects every parameter set.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a subset expression.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::InvalidSubset`] when a clause is not `name=values`
    /// or a value list cannot be expanded.
    pub fn parse(raw: &str) -> Result<Self, TeazerError> {
        let invalid = |reason: String| TeazerError::InvalidSubset {
            raw: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Ok(Self::all());
        }

        let mut alternatives = Vec::new();
        for alternative in raw.split('|') {
            let mut constraints: BTreeMap<String, BTreeSet<ParamValue>> = BTreeMap::new();
            for clause in alternative.split(';').map(str::trim).filter(|c| !c.is_empty()) {
                let Some((name, values)) = clause.split_once('=') else {
                    return Err(invalid(format!("'{clause}' is not of the form name=values")));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(invalid(format!("'{clause}' has no parameter name")));
                }
                let expanded = expand_range(name, &values.replace(',', ";"))
                    .map_err(|e| invalid(e.to_string()))?;
                constraints.entry(name.to_string()).or_default().extend(expanded);
            }
            if constraints.is_empty() {
                return Err(invalid("empty alternative".to_string()));
            }
            alternatives.push(constraints);
        }

        Ok(Self {
            alternatives,
        })
    }

    /// Whether the expression constrains nothing.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Parameter names mentioned anywhere in the expression.
    #[must_use]
    pub fn names(&self) -> BTreeSet<&str> {
        self.alternatives.iter().flat_map(|a| a.keys().map(String::as_str)).collect()
    }

    /// Reject expressions naming parameters that do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::InvalidSubset`] naming the first unknown parameter.
    pub fn validate<'a>(
        &self,
        raw: &str,
        known: impl IntoIterator<Item = &'a String>,
    ) -> Result<(), TeazerError> {
        let known: BTreeSet<&str> = known.into_iter().map(String::as_str).collect();
        if let Some(unknown) = self.names().into_iter().find(|n| !known.contains(n)) {
            return Err(TeazerError::InvalidSubset {
                raw: raw.to_string(),
                reason: format!("unknown parameter '{unknown}'"),
            });
        }
        Ok(())
    }

    /// Whether a parameter set is selected.
    #[must_use]
    pub fn matches(&self, set: &ParameterSet) -> bool {
        self.is_all()
            || self.alternatives.iter().any(|constraints| {
                constraints
                    .iter()
                    .all(|(name, allowed)| set.values.get(name).is_some_and(|v| allowed.contains(v)))
            })
    }
}
