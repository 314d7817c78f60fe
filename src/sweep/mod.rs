//! Expansion of a sweep description into parameter sets.
//!
//! The pipeline is:
//! 1. [`reference::resolve_parameters`] checks `%(name)s` references for
//!    cycles and expands every parameter with [`range::expand_range`],
//! 2. [`product::GroupedProductBuilder`] arranges the results on axes and
//!    enumerates the parameter sets,
//! 3. [`subset::Subset`] optionally narrows the enumeration.
//!
//! Every step is pure; nothing here touches the filesystem.

pub mod product;
pub mod range;
pub mod reference;
pub mod subset;

use std::collections::BTreeMap;

use crate::core::TeazerError;

pub use product::{Axis, GroupedProductBuilder, ParameterGroup, ParameterSet, ParameterSpace};
pub use range::{ParamValue, expand_range, is_ranged};
pub use reference::{ResolvedParameter, resolve_parameters};
pub use subset::Subset;

/// Resolve, expand and combine raw parameters in one step.
///
/// # Errors
///
/// Any configuration error raised by reference resolution, range expansion
/// or the product builder.
pub fn expand_sweep(
    raw: &BTreeMap<String, String>,
    groups: &[ParameterGroup],
    combine: bool,
) -> Result<ParameterSpace, TeazerError> {
    let resolved = resolve_parameters(raw)?;
    GroupedProductBuilder::new(&resolved, groups, combine).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_produces_no_sets() {
        let raw = BTreeMap::from([
            ("A".to_string(), "%(B)s".to_string()),
            ("B".to_string(), "%(A)s".to_string()),
            ("C".to_string(), "1;2".to_string()),
        ]);
        let err = expand_sweep(&raw, &[], true).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(err, TeazerError::CyclicReference { .. }));
    }

    #[test]
    fn test_group_replaces_product_of_members() {
        let raw = BTreeMap::from([
            ("x".to_string(), "1;2;3".to_string()),
            ("y".to_string(), "4;5;6".to_string()),
            ("z".to_string(), "7;8;9".to_string()),
        ]);
        let groups = vec![ParameterGroup {
            name: "xyz".to_string(),
            members: vec!["x".to_string(), "y".to_string(), "z".to_string()],
        }];
        assert_eq!(expand_sweep(&raw, &groups, true).unwrap().sets.len(), 3);
        assert_eq!(expand_sweep(&raw, &[], true).unwrap().sets.len(), 27);
    }
}
