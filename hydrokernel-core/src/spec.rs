//! Component attribute contracts.
//!
//! A [`ComponentSpec`] is the immutable record of a component's variable
//! contract: the ordered input, output, state, parameter and network-slot
//! name lists. Insertion order is the binding order used when indexing into
//! flat arrays, so order is part of the contract.
//!
//! The set-algebra helpers treat the name lists as order-preserving sets.
//! [`merge_contracts`] folds a sequence of specs into the free-variable
//! contract of their composition: an output of an earlier component
//! satisfies an input of a later one, and anything never satisfied (and not
//! a state) is an external input of the composite.

use crate::errors::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five name categories of a component contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarCategory {
    Inputs,
    Outputs,
    States,
    Params,
    Networks,
}

impl fmt::Display for VarCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarCategory::Inputs => write!(f, "inputs"),
            VarCategory::Outputs => write!(f, "outputs"),
            VarCategory::States => write!(f, "states"),
            VarCategory::Params => write!(f, "params"),
            VarCategory::Networks => write!(f, "networks"),
        }
    }
}

/// Immutable variable contract of a single component.
///
/// Constructed once when a component is defined and shared read-only between
/// the compiler and the validator afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Component name, used in diagnostics (chain errors, cache keys).
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub states: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
}

fn to_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl ComponentSpec {
    /// Create a new contract, validating name uniqueness.
    ///
    /// Returns a `StructuralBuild` error if a name appears twice within one
    /// category, or in more than one of inputs/outputs/states.
    pub fn new(
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        states: &[&str],
        params: &[&str],
        networks: &[&str],
    ) -> KernelResult<Self> {
        let spec = Self {
            name: name.to_string(),
            inputs: to_names(inputs),
            outputs: to_names(outputs),
            states: to_names(states),
            params: to_names(params),
            networks: to_names(networks),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Shorthand for a stateless component without network slots.
    pub fn flux(name: &str, inputs: &[&str], outputs: &[&str], params: &[&str]) -> KernelResult<Self> {
        Self::new(name, inputs, outputs, &[], params, &[])
    }

    /// Check the contract invariants.
    ///
    /// Deserialized specs bypass [`ComponentSpec::new`], so catalog loading
    /// calls this explicitly.
    pub fn validate(&self) -> KernelResult<()> {
        for category in [
            VarCategory::Inputs,
            VarCategory::Outputs,
            VarCategory::States,
            VarCategory::Params,
            VarCategory::Networks,
        ] {
            let names = self.names(category);
            for (i, name) in names.iter().enumerate() {
                if names[..i].contains(name) {
                    return Err(KernelError::StructuralBuild {
                        details: format!(
                            "component '{}': duplicate name '{}' in {}",
                            self.name, name, category
                        ),
                    });
                }
            }
        }

        // Inputs, outputs and states must be disjoint within one spec.
        for name in &self.inputs {
            if self.outputs.contains(name) || self.states.contains(name) {
                return Err(KernelError::StructuralBuild {
                    details: format!(
                        "component '{}': '{}' appears in more than one of inputs/outputs/states",
                        self.name, name
                    ),
                });
            }
        }
        for name in &self.outputs {
            if self.states.contains(name) {
                return Err(KernelError::StructuralBuild {
                    details: format!(
                        "component '{}': '{}' appears in both outputs and states",
                        self.name, name
                    ),
                });
            }
        }
        Ok(())
    }

    /// The ordered name list for a category.
    pub fn names(&self, category: VarCategory) -> &[String] {
        match category {
            VarCategory::Inputs => &self.inputs,
            VarCategory::Outputs => &self.outputs,
            VarCategory::States => &self.states,
            VarCategory::Params => &self.params,
            VarCategory::Networks => &self.networks,
        }
    }

    pub fn has(&self, category: VarCategory, name: &str) -> bool {
        self.names(category).iter().any(|n| n == name)
    }

    pub fn count_of(&self, category: VarCategory) -> usize {
        self.names(category).len()
    }

    /// Whether the component carries state (and therefore a derivative kernel).
    pub fn is_stateful(&self) -> bool {
        !self.states.is_empty()
    }

    /// Order-preserving union of a category's names across two specs.
    pub fn union(&self, other: &Self, category: VarCategory) -> Vec<String> {
        let mut result = self.names(category).to_vec();
        for name in other.names(category) {
            if !result.contains(name) {
                result.push(name.clone());
            }
        }
        result
    }

    /// Order-preserving intersection of a category's names.
    pub fn intersect(&self, other: &Self, category: VarCategory) -> Vec<String> {
        self.names(category)
            .iter()
            .filter(|n| other.has(category, n))
            .cloned()
            .collect()
    }

    /// Order-preserving difference (names in `self` but not in `other`).
    pub fn difference(&self, other: &Self, category: VarCategory) -> Vec<String> {
        self.names(category)
            .iter()
            .filter(|n| !other.has(category, n))
            .cloned()
            .collect()
    }

    /// Summarize this spec's contract for composition.
    ///
    /// A name that is both a state and a would-be input is excluded from the
    /// inputs: states are supplied externally as state vectors, never derived
    /// from upstream outputs.
    pub fn summary(&self) -> ContractSummary {
        ContractSummary {
            inputs: self
                .inputs
                .iter()
                .filter(|n| !self.states.contains(n))
                .cloned()
                .collect(),
            outputs: self.outputs.clone(),
            states: self.states.clone(),
        }
    }
}

impl fmt::Display for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(inputs={:?}, outputs={:?}, states={:?}, params={:?}, networks={:?})",
            self.name, self.inputs, self.outputs, self.states, self.params, self.networks
        )
    }
}

/// Free-variable contract of a composition of components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub states: Vec<String>,
}

fn push_unique(target: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !target.contains(name) {
            target.push(name.clone());
        }
    }
}

impl ContractSummary {
    pub fn empty() -> Self {
        Self {
            inputs: vec![],
            outputs: vec![],
            states: vec![],
        }
    }

    /// Merge a later contract into this one.
    ///
    /// The later contract's inputs are satisfied by this contract's outputs;
    /// names matching any state on either side are excluded from the
    /// composite inputs. The merge is associative, so a chain may be split
    /// and merged in any grouping with the same result.
    pub fn merge(&self, later: &Self) -> Self {
        let mut outputs = self.outputs.clone();
        push_unique(&mut outputs, &later.outputs);

        let mut states = self.states.clone();
        push_unique(&mut states, &later.states);

        let mut inputs = self.inputs.clone();
        let unsatisfied: Vec<String> = later
            .inputs
            .iter()
            .filter(|n| !self.outputs.contains(n))
            .cloned()
            .collect();
        push_unique(&mut inputs, &unsatisfied);
        inputs.retain(|n| !states.contains(n));

        Self {
            inputs,
            outputs,
            states,
        }
    }
}

/// Fold a sequence of specs into the contract of their composition.
///
/// An output of component *i* satisfies an input of component *j > i*; a
/// name never satisfied by a prior output and not a state is an external
/// input of the composite.
pub fn merge_contracts(specs: &[ComponentSpec]) -> ContractSummary {
    specs
        .iter()
        .fold(ContractSummary::empty(), |acc, spec| acc.merge(&spec.summary()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> ComponentSpec {
        ComponentSpec::new(
            "snowpack",
            &["temp", "prcp"],
            &["snowfall", "melt"],
            &["snowpack"],
            &["Tmin", "Tmax", "Df"],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let spec = bucket();
        assert_eq!(spec.count_of(VarCategory::Inputs), 2);
        assert_eq!(spec.count_of(VarCategory::Params), 3);
        assert!(spec.has(VarCategory::Outputs, "melt"));
        assert!(!spec.has(VarCategory::Outputs, "temp"));
        assert_eq!(spec.names(VarCategory::States), &["snowpack".to_string()]);
        assert!(spec.is_stateful());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = ComponentSpec::new("bad", &["a", "a"], &["b"], &[], &[], &[]);
        assert!(matches!(
            result,
            Err(KernelError::StructuralBuild { .. })
        ));
    }

    #[test]
    fn test_cross_category_overlap_rejected() {
        let result = ComponentSpec::new("bad", &["a"], &["a"], &[], &[], &[]);
        assert!(result.is_err());

        let result = ComponentSpec::new("bad", &["a"], &["b"], &["b"], &[], &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_set_algebra() {
        let a = ComponentSpec::new("a", &["x", "y"], &["p"], &[], &[], &[]).unwrap();
        let b = ComponentSpec::new("b", &["y", "z"], &["q"], &[], &[], &[]).unwrap();

        assert_eq!(a.union(&b, VarCategory::Inputs), vec!["x", "y", "z"]);
        assert_eq!(a.intersect(&b, VarCategory::Inputs), vec!["y"]);
        assert_eq!(a.difference(&b, VarCategory::Inputs), vec!["x"]);
    }

    #[test]
    fn test_merge_contracts_chain() {
        let a = ComponentSpec::new("a", &["x"], &["y"], &[], &[], &[]).unwrap();
        let b = ComponentSpec::new("b", &["y"], &["z"], &[], &[], &[]).unwrap();

        let summary = merge_contracts(&[a, b]);
        assert_eq!(summary.inputs, vec!["x"]);
        assert_eq!(summary.outputs, vec!["y", "z"]);
        assert!(summary.states.is_empty());
    }

    #[test]
    fn test_merge_contracts_state_excluded_from_inputs() {
        // "soilwater" is consumed by the flux but supplied as a state vector,
        // so it must not surface as an external input.
        let bucket = ComponentSpec::new(
            "soil",
            &["rainfall"],
            &["flow"],
            &["soilwater"],
            &[],
            &[],
        )
        .unwrap();
        let flux =
            ComponentSpec::new("toflow", &["soilwater", "flow"], &["q"], &[], &[], &[]).unwrap();

        let summary = merge_contracts(&[bucket, flux]);
        assert_eq!(summary.inputs, vec!["rainfall"]);
        assert_eq!(summary.states, vec!["soilwater"]);
    }

    #[test]
    fn test_merge_contracts_associative() {
        let specs = vec![
            ComponentSpec::new("a", &["x"], &["y"], &["s1"], &[], &[]).unwrap(),
            ComponentSpec::new("b", &["y", "w"], &["z"], &[], &[], &[]).unwrap(),
            ComponentSpec::new("c", &["z", "s1"], &["out"], &["s2"], &[], &[]).unwrap(),
        ];

        let whole = merge_contracts(&specs);
        for split in 0..=specs.len() {
            let left = merge_contracts(&specs[..split]);
            let right = merge_contracts(&specs[split..]);
            assert_eq!(left.merge(&right), whole, "split at {}", split);
        }
    }

    #[test]
    fn test_serialization_round_trip() {
        let spec = bucket();
        let json = serde_json::to_string(&spec).unwrap();
        let deserialized: ComponentSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, spec);
    }
}
