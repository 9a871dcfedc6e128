//! TOML catalogs of component contracts.
//!
//! A catalog is the on-disk form of a set of [`ComponentSpec`]s:
//!
//! ```toml
//! [[components]]
//! name = "snowpack"
//! inputs = ["temp", "prcp"]
//! outputs = ["snowfall", "melt"]
//! states = ["snowpack"]
//! params = ["Tmin", "Tmax", "Df"]
//! ```
//!
//! Loading re-validates every contract, since deserialization bypasses the
//! constructor's invariant checks.

use crate::errors::{KernelError, KernelResult};
use crate::spec::ComponentSpec;
use serde::{Deserialize, Serialize};

/// An ordered set of component contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub components: Vec<ComponentSpec>,
}

impl Catalog {
    pub fn new(components: Vec<ComponentSpec>) -> KernelResult<Self> {
        let catalog = Self { components };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a catalog from TOML text.
    pub fn from_toml_str(text: &str) -> KernelResult<Self> {
        let catalog: Catalog = toml::from_str(text)
            .map_err(|e| KernelError::Error(format!("invalid catalog TOML: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_toml_string(&self) -> KernelResult<String> {
        toml::to_string(self)
            .map_err(|e| KernelError::Error(format!("cannot serialize catalog: {}", e)))
    }

    fn validate(&self) -> KernelResult<()> {
        for (i, spec) in self.components.iter().enumerate() {
            spec.validate()?;
            if self.components[..i].iter().any(|s| s.name == spec.name) {
                return Err(KernelError::StructuralBuild {
                    details: format!("catalog defines component '{}' more than once", spec.name),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[components]]
        name = "snowpack"
        inputs = ["temp", "prcp"]
        outputs = ["snowfall", "melt"]
        states = ["snowpack"]
        params = ["Tmin", "Tmax", "Df"]

        [[components]]
        name = "flow"
        inputs = ["melt", "rainfall"]
        outputs = ["q"]
        states = []
        params = ["k"]
    "#;

    #[test]
    fn test_catalog_from_toml() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let snowpack = catalog.get("snowpack").unwrap();
        assert_eq!(snowpack.inputs, vec!["temp", "prcp"]);
        assert_eq!(snowpack.states, vec!["snowpack"]);
        // Networks default to empty when omitted.
        assert!(snowpack.networks.is_empty());

        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_catalog_round_trip() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        let rendered = catalog.to_toml_string().unwrap();
        let reparsed = Catalog::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed, catalog);
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let text = r#"
            [[components]]
            name = "a"
            inputs = ["x"]
            outputs = ["y"]
            states = []

            [[components]]
            name = "a"
            inputs = ["y"]
            outputs = ["z"]
            states = []
        "#;
        assert!(matches!(
            Catalog::from_toml_str(text),
            Err(KernelError::StructuralBuild { .. })
        ));
    }

    #[test]
    fn test_invalid_contract_rejected_on_load() {
        let text = r#"
            [[components]]
            name = "bad"
            inputs = ["x", "x"]
            outputs = ["y"]
            states = []
        "#;
        assert!(Catalog::from_toml_str(text).is_err());
    }
}
