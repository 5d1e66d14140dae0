//! HUD picklist code sets
//!
//! A picklist is a HUD-defined closed set of valid integer codes for a
//! field. The full catalog lives in the HMIS Data Standards; this registry
//! carries the sets the export validator checks against. Codes follow the
//! FY2024 standards.

use std::collections::{BTreeMap, BTreeSet};

/// Registry of picklist code sets keyed by HUD picklist identifier
#[derive(Debug, Clone)]
pub struct PicklistRegistry {
    sets: BTreeMap<String, BTreeSet<i32>>,
}

impl PicklistRegistry {
    /// Empty registry; used by tests that supply their own sets
    pub fn empty() -> Self {
        Self {
            sets: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the FY2024 code sets used by the validator
    pub fn fy2024() -> Self {
        let mut registry = Self::empty();

        // 1.4/1.5/1.6 name, SSN and DOB data quality
        registry.register("1.4 Name Data Quality", [1, 2, 8, 9, 99]);
        registry.register("1.5 SSN Data Quality", [1, 2, 8, 9, 99]);
        registry.register("1.6 DOB Data Quality", [1, 2, 8, 9, 99]);
        // 1.7 No/Yes/Missing variants
        registry.register("1.7 NoYesMissing", [0, 1, 8, 9, 99]);
        // 1.8 No/Yes/Reasons for Missing Data
        registry.register("1.8 NoYesReasons", [0, 1, 8, 9, 99]);
        // 1.3 Disability Type
        registry.register("1.3 Disability Type", [5, 6, 7, 8, 9, 10]);
        // 1.27 Relationship to Head of Household
        registry.register("1.27 Relationship to HoH", [1, 2, 3, 4, 5]);
        // 3.6 Gender
        registry.register("3.6 Gender", [0, 1, 2, 3, 4, 5, 6, 8, 9, 99]);
        // 3.12 Destination
        registry.register(
            "3.12 Destination",
            [
                101, 116, 118, 204, 205, 206, 207, 215, 225, 302, 312, 313, 314, 327, 329, 332,
                410, 411, 421, 422, 423, 426, 435, 436, 437, 8, 9, 17, 24, 30, 99,
            ],
        );
        // 3.15 Relationship of living situation
        registry.register(
            "3.917 Prior Living Situation",
            [
                101, 116, 118, 204, 205, 206, 207, 215, 225, 302, 312, 313, 314, 327, 329, 332,
                335, 336, 410, 411, 421, 435, 436, 437, 8, 9, 99,
            ],
        );
        // 4.1 Housing Status
        registry.register("4.1 Housing Status", [1, 2, 3, 4, 5, 6, 8, 9, 99]);
        // 4.4 Covered by Health Insurance
        registry.register("4.4 Health Insurance", [0, 1, 8, 9, 99]);
        // 4.10 Disability Response
        registry.register("4.10 Disability Response", [0, 1, 2, 3, 8, 9, 99]);
        // 4.12 Current Living Situation
        registry.register(
            "4.12 Current Living Situation",
            [
                101, 116, 118, 204, 205, 206, 207, 215, 225, 302, 312, 313, 314, 327, 329, 332,
                335, 336, 17, 37, 8, 9, 99,
            ],
        );

        registry
    }

    pub fn register(&mut self, name: impl Into<String>, codes: impl IntoIterator<Item = i32>) {
        self.sets.insert(name.into(), codes.into_iter().collect());
    }

    pub fn get(&self, name: &str) -> Option<&BTreeSet<i32>> {
        self.sets.get(name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1.4 Name Data Quality", 1, true; "full name reported")]
    #[test_case("1.4 Name Data Quality", 3, false; "three is not a name dq code")]
    #[test_case("1.27 Relationship to HoH", 5, true; "unrelated household member")]
    #[test_case("1.27 Relationship to HoH", 6, false; "six is out of range")]
    #[test_case("3.12 Destination", 116, true; "place not meant for habitation")]
    #[test_case("3.12 Destination", 335, false; "prior situation code rejected")]
    fn test_code_membership(set: &str, code: i32, valid: bool) {
        let registry = PicklistRegistry::fy2024();
        assert_eq!(registry.get(set).unwrap().contains(&code), valid);
    }

    #[test]
    fn test_fy2024_registry_has_core_sets() {
        let registry = PicklistRegistry::fy2024();
        assert!(registry.get("1.27 Relationship to HoH").is_some());
        assert!(registry.get("3.12 Destination").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_relationship_codes() {
        let registry = PicklistRegistry::fy2024();
        let codes = registry.get("1.27 Relationship to HoH").unwrap();
        assert_eq!(codes.len(), 5);
        assert!(codes.contains(&1));
        assert!(!codes.contains(&999));
    }

    #[test]
    fn test_register_overrides() {
        let mut registry = PicklistRegistry::empty();
        registry.register("custom", [1, 2]);
        registry.register("custom", [3]);
        assert_eq!(registry.get("custom").unwrap().len(), 1);
    }
}
