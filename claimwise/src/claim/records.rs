//! Externally supplied inputs: the customer record and the raw claim.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Policy holder and vehicle details, loaded whole from storage.
///
/// The pipeline only reads this record; it is copied into the report as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerRecord {
    /// Full name of the policy holder.
    pub customer_name: String,
    /// Contact email.
    #[serde(default)]
    pub customer_email: String,
    /// Contact phone.
    #[serde(default)]
    pub customer_phone: String,
    /// Street address, used to locate nearby repair shops.
    pub customer_address: String,
    /// Insurance policy number.
    pub customer_policy_number: String,
    /// Vehicle model year.
    #[serde(deserialize_with = "year_from_number_or_string")]
    pub customer_vehicle_year: u16,
    /// Vehicle make.
    pub customer_vehicle_make: String,
    /// Vehicle model.
    pub customer_vehicle_model: String,
    /// Vehicle identification number.
    #[serde(default)]
    pub customer_vehicle_vin: String,
    /// License plate.
    #[serde(default)]
    pub customer_license_plate: String,
}

impl CustomerRecord {
    /// `"<year> <make> <model>"`, e.g. `2023 Honda Civic`.
    #[must_use]
    pub fn vehicle_identity(&self) -> String {
        format!(
            "{} {} {}",
            self.customer_vehicle_year, self.customer_vehicle_make, self.customer_vehicle_model
        )
    }
}

fn year_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Number(u16),
        Text(String),
    }

    match Year::deserialize(deserializer)? {
        Year::Number(year) => Ok(year),
        Year::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// The raw claim dict as supplied by the claims system.
///
/// Kept as an open JSON object so every field reaches the specialists'
/// prompts; only `claim_number` is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClaim {
    claim_number: String,
    fields: Map<String, Value>,
}

impl RawClaim {
    /// Schema name used in error messages.
    pub const SCHEMA: &'static str = "RawClaim";

    /// Build from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if the value is not an object or
    /// lacks a non-blank `claim_number`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(Error::schema_violation(Self::SCHEMA, "claim must be a JSON object"));
        };
        let claim_number = match fields.get("claim_number") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::schema_violation(
                    Self::SCHEMA,
                    "claim_number is missing or blank",
                ));
            }
        };
        Ok(Self {
            claim_number,
            fields,
        })
    }

    /// The claim identifier, exactly as supplied.
    #[must_use]
    pub fn claim_number(&self) -> &str {
        &self.claim_number
    }

    /// All fields, including `claim_number`.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The claim as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Extract the adjuster-report fields this claim supplies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if a known field has the wrong type.
    pub fn claim_fields(&self) -> Result<ClaimFields> {
        serde_json::from_value(self.to_value())
            .map_err(|e| Error::schema_violation(Self::SCHEMA, e.to_string()))
    }
}

impl Serialize for RawClaim {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawClaim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Decode a field, reading JSON `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Adjuster-report metadata.
///
/// The first group is supplied by the raw claim; the last three are filled
/// by the merge from the specialists' outputs. A `null` field reads as
/// blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimFields {
    /// Date the report was written (ISO 8601). Blank means "today".
    #[serde(deserialize_with = "null_as_default")]
    pub report_date: String,
    /// Adjuster handling the claim.
    #[serde(deserialize_with = "null_as_default")]
    pub adjuster_name: String,
    /// Date of the incident.
    #[serde(deserialize_with = "null_as_default")]
    pub date_of_loss: String,
    /// Time of the incident.
    #[serde(deserialize_with = "null_as_default")]
    pub time_of_loss: String,
    /// Where the incident happened.
    #[serde(deserialize_with = "null_as_default")]
    pub location_of_loss: String,
    /// Police report reference, if any.
    #[serde(deserialize_with = "null_as_default")]
    pub police_report_number: String,
    /// Number of vehicles involved.
    #[serde(deserialize_with = "null_as_default")]
    pub vehicles_involved: u32,
    /// Number of people injured.
    #[serde(deserialize_with = "null_as_default")]
    pub injuries_reported: u32,
    /// Witness names and contacts.
    #[serde(deserialize_with = "null_as_default")]
    pub witnesses: String,
    /// Narrative of the incident.
    #[serde(deserialize_with = "null_as_default")]
    pub incident_description: String,
    /// Damage narrative from the image analysis.
    #[serde(deserialize_with = "null_as_default")]
    pub damage_description: String,
    /// Damaged parts from the image analysis.
    #[serde(deserialize_with = "null_as_default")]
    pub affected_parts: Vec<String>,
    /// Repair cost range from the cost estimation.
    #[serde(deserialize_with = "null_as_default")]
    pub estimated_repair_cost: String,
}
