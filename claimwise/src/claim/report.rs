//! The merged insurance report and the typed merge that builds it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::records::{ClaimFields, CustomerRecord, RawClaim};
use super::schemas::{CostEstimate, DamageAssessment, RepairShopSet};

/// The terminal artifact of a claim run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsuranceReport {
    /// Claim identifier, copied unchanged from the raw claim.
    pub claim_number: String,
    /// Adjuster-report fields, including the merged specialist outputs.
    pub claim: ClaimFields,
    /// The customer record, copied unchanged.
    pub customer: CustomerRecord,
    /// Nearby repair shops.
    pub repair_shops: RepairShopSet,
}

impl InsuranceReport {
    /// Check the end-to-end contract of a finished report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContractViolation`] if the claim number differs from
    /// the one supplied, or a merged field is blank.
    pub fn validate(&self, expected_claim_number: &str) -> Result<()> {
        if self.claim_number != expected_claim_number {
            return Err(Error::ContractViolation(format!(
                "claim_number changed from '{expected_claim_number}' to '{}'",
                self.claim_number
            )));
        }
        if self.claim.report_date.trim().is_empty() {
            return Err(Error::ContractViolation("report_date is blank".into()));
        }
        if self.claim.damage_description.trim().is_empty() {
            return Err(Error::ContractViolation("damage_description is blank".into()));
        }
        if self.claim.estimated_repair_cost.trim().is_empty() {
            return Err(Error::ContractViolation(
                "estimated_repair_cost is blank".into(),
            ));
        }
        Ok(())
    }
}

/// Replace a blank or whitespace-only report date with `today` in ISO form.
#[must_use]
pub fn default_report_date(report_date: &str, today: NaiveDate) -> String {
    if report_date.trim().is_empty() {
        today.format("%Y-%m-%d").to_string()
    } else {
        report_date.to_owned()
    }
}

/// Typed construction of an [`InsuranceReport`].
///
/// `merge` takes every specialist output by signature, so a report cannot
/// be built while any of them is missing. Inputs are borrowed and copied;
/// nothing upstream is mutated.
#[derive(Debug, Clone)]
pub struct ReportMerge {
    claim_number: String,
    fields: ClaimFields,
    customer: CustomerRecord,
}

impl ReportMerge {
    /// Start a merge from the raw claim and the customer record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if the raw claim carries a known
    /// field with the wrong type.
    pub fn new(raw_claim: &RawClaim, customer: &CustomerRecord) -> Result<Self> {
        Ok(Self {
            claim_number: raw_claim.claim_number().to_owned(),
            fields: raw_claim.claim_fields()?,
            customer: customer.clone(),
        })
    }

    /// Combine the specialist outputs into the final report and apply the
    /// report-date default fill.
    #[must_use]
    pub fn merge(
        self,
        damage: &DamageAssessment,
        cost: &CostEstimate,
        shops: &RepairShopSet,
        today: NaiveDate,
    ) -> InsuranceReport {
        let mut claim = self.fields;
        claim.damage_description.clone_from(&damage.description);
        claim.affected_parts.clone_from(&damage.affected_parts);
        claim.estimated_repair_cost.clone_from(&cost.estimated_range);
        claim.report_date = default_report_date(&claim.report_date, today);

        InsuranceReport {
            claim_number: self.claim_number,
            claim,
            customer: self.customer,
            repair_shops: shops.clone(),
        }
    }
}
