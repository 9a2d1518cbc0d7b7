//! Structured outputs emitted by the guardrail and the three specialists.
//!
//! Every type derives `JsonSchema` so its strict response format is generated
//! from the Rust definition, and `deny_unknown_fields` so extra keys (an
//! `explanation` next to the damage fields, say) are rejected instead of
//! dropped.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A structured output with a semantic check beyond its JSON shape.
pub trait StructuredOutput: serde::de::DeserializeOwned + Serialize + JsonSchema {
    /// Schema name used in response formats and error messages.
    const SCHEMA: &'static str;

    /// Check constraints the JSON schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] naming [`Self::SCHEMA`].
    fn validate(&self) -> Result<()>;
}

fn violation(schema: &str, message: impl Into<String>) -> Error {
    Error::schema_violation(schema, message)
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// The guardrail's classification of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GuardrailVerdict {
    /// Whether the request is about processing an insurance claim.
    pub is_in_domain: bool,
    /// Short justification of the verdict.
    pub reasoning: String,
}

impl StructuredOutput for GuardrailVerdict {
    const SCHEMA: &'static str = "GuardrailVerdict";

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Damage found on the vehicle, visible or inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DamageAssessment {
    /// Narrative description of the damage.
    pub description: String,
    /// Parts that need repair or replacement.
    #[serde(rename = "damaged_parts_list")]
    pub affected_parts: Vec<String>,
}

impl StructuredOutput for DamageAssessment {
    const SCHEMA: &'static str = "DamageAssessment";

    fn validate(&self) -> Result<()> {
        if is_blank(&self.description) {
            return Err(violation(Self::SCHEMA, "description is empty"));
        }
        if self.affected_parts.iter().any(|p| is_blank(p)) {
            return Err(violation(Self::SCHEMA, "damaged_parts_list contains a blank entry"));
        }
        Ok(())
    }
}

static RANGE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:-|\x{2013}|\x{2014}|to)\s*\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)",
    )
    .ok()
});

/// Estimated repair cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CostEstimate {
    /// Cost range such as `$1,200 – $2,400`.
    pub estimated_range: String,
}

impl CostEstimate {
    /// Parse the lower and upper bound in dollars.
    ///
    /// Accepts a hyphen, en dash, em dash or `to` between the bounds and
    /// thousands separators inside them. Returns `None` when the text holds
    /// no `$X – $Y` range.
    #[must_use]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let caps = RANGE_RE.as_ref()?.captures(&self.estimated_range)?;
        let parse = |i: usize| -> Option<f64> { caps.get(i)?.as_str().replace(',', "").parse().ok() };
        Some((parse(1)?, parse(2)?))
    }
}

impl StructuredOutput for CostEstimate {
    const SCHEMA: &'static str = "CostEstimate";

    fn validate(&self) -> Result<()> {
        if is_blank(&self.estimated_range) {
            return Err(violation(Self::SCHEMA, "estimated_range is empty"));
        }
        if let Some((low, high)) = self.bounds()
            && low > high
        {
            return Err(violation(
                Self::SCHEMA,
                format!("estimated_range lower bound {low} exceeds upper bound {high}"),
            ));
        }
        Ok(())
    }
}

/// One repair shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ShopRecord {
    /// Business name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Phone number.
    pub phone: String,
}

impl ShopRecord {
    fn is_complete(&self) -> bool {
        !is_blank(&self.name) && !is_blank(&self.address) && !is_blank(&self.phone)
    }
}

/// Up to three nearby repair shops.
///
/// The set always has exactly three slots; each is empty when the search
/// turned up fewer shops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RepairShopSet {
    /// First shop.
    pub slot_1: Option<ShopRecord>,
    /// Second shop.
    pub slot_2: Option<ShopRecord>,
    /// Third shop.
    pub slot_3: Option<ShopRecord>,
}

impl RepairShopSet {
    /// Filled slots in slot order.
    pub fn shops(&self) -> impl Iterator<Item = &ShopRecord> {
        [&self.slot_1, &self.slot_2, &self.slot_3]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Number of filled slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shops().count()
    }

    /// Returns `true` if no slot is filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StructuredOutput for RepairShopSet {
    const SCHEMA: &'static str = "RepairShopSet";

    fn validate(&self) -> Result<()> {
        for (slot, shop) in [&self.slot_1, &self.slot_2, &self.slot_3].into_iter().enumerate() {
            if let Some(shop) = shop
                && !shop.is_complete()
            {
                return Err(violation(
                    Self::SCHEMA,
                    format!("slot_{} is missing a name, address or phone", slot + 1),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shop(name: &str) -> ShopRecord {
        ShopRecord {
            name: name.into(),
            address: "1 Repair Rd, Springfield, IL".into(),
            phone: "(217) 555-0100".into(),
        }
    }

    mod damage_assessment {
        use super::*;

        #[test]
        fn wire_name_is_damaged_parts_list() {
            let value = serde_json::to_value(DamageAssessment {
                description: "dent".into(),
                affected_parts: vec!["front bumper".into()],
            })
            .unwrap();
            assert_eq!(value["damaged_parts_list"][0], "front bumper");
            assert!(value.get("affected_parts").is_none());
        }

        #[test]
        fn missing_parts_list_is_rejected() {
            let result: std::result::Result<DamageAssessment, _> =
                serde_json::from_value(json!({"description": "dent"}));
            assert!(result.is_err());
        }

        #[test]
        fn explanation_field_is_rejected() {
            let result: std::result::Result<DamageAssessment, _> = serde_json::from_value(json!({
                "description": "dent",
                "damaged_parts_list": [],
                "explanation": "because"
            }));
            assert!(result.is_err());
        }

        #[test]
        fn blank_description_fails_validation() {
            let damage = DamageAssessment {
                description: "  ".into(),
                affected_parts: vec!["hood".into()],
            };
            assert!(matches!(damage.validate(), Err(Error::SchemaViolation { .. })));
        }

        #[test]
        fn generated_schema_uses_wire_name() {
            let schema = schemars::schema_for!(DamageAssessment);
            let value = serde_json::to_value(&schema).unwrap();
            assert!(value["properties"].get("damaged_parts_list").is_some());
        }
    }

    mod cost_estimate {
        use super::*;

        fn estimate(range: &str) -> CostEstimate {
            CostEstimate {
                estimated_range: range.into(),
            }
        }

        #[test]
        fn bounds_with_en_dash_and_separators() {
            assert_eq!(
                estimate("$1,200 \u{2013} $2,400").bounds(),
                Some((1200.0, 2400.0))
            );
        }

        #[test]
        fn bounds_with_hyphen_and_to() {
            assert_eq!(estimate("$800-$950.50").bounds(), Some((800.0, 950.5)));
            assert_eq!(estimate("$3000 to $4500").bounds(), Some((3000.0, 4500.0)));
        }

        #[test]
        fn bounds_absent_for_free_text() {
            assert_eq!(estimate("about two grand").bounds(), None);
            assert!(estimate("about two grand").validate().is_ok());
        }

        #[test]
        fn inverted_range_fails_validation() {
            assert!(estimate("$5,000 - $1,000").validate().is_err());
            assert!(estimate("").validate().is_err());
        }
    }

    mod repair_shop_set {
        use super::*;

        #[test]
        fn counts_filled_slots() {
            let set = RepairShopSet {
                slot_1: Some(shop("A")),
                slot_2: None,
                slot_3: Some(shop("C")),
            };
            assert_eq!(set.len(), 2);
            let names: Vec<_> = set.shops().map(|s| s.name.as_str()).collect();
            assert_eq!(names, ["A", "C"]);
            assert!(RepairShopSet::default().is_empty());
        }

        #[test]
        fn null_slots_deserialize() {
            let set: RepairShopSet = serde_json::from_value(json!({
                "slot_1": {"name": "A", "address": "x", "phone": "y"},
                "slot_2": null,
                "slot_3": null
            }))
            .unwrap();
            assert_eq!(set.len(), 1);
        }

        #[test]
        fn incomplete_shop_fails_validation() {
            let mut incomplete = shop("A");
            incomplete.phone = String::new();
            let set = RepairShopSet {
                slot_2: Some(incomplete),
                ..RepairShopSet::default()
            };
            match set.validate() {
                Err(Error::SchemaViolation { message, .. }) => assert!(message.contains("slot_2")),
                other => panic!("expected SchemaViolation, got {other:?}"),
            }
        }

        #[test]
        fn empty_set_is_valid() {
            assert!(RepairShopSet::default().validate().is_ok());
        }
    }
}
