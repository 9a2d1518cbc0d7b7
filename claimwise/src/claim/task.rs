//! The natural-language task handed to the orchestrator.

use std::fmt::{self, Write as _};

use super::records::{CustomerRecord, RawClaim};

/// One claim photo: where it came from and where a model can fetch it.
///
/// Only the reference appears in prompt text. The URL, which may be a whole
/// `data:` payload, goes to the vision model as an image part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    /// File id or path the caller supplied.
    pub reference: String,
    /// Resolved download or `data:` URL.
    pub url: String,
}

impl Photo {
    /// Pair a reference with its resolved URL.
    #[must_use]
    pub fn new(reference: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            url: url.into(),
        }
    }

    /// How the photo is named in prompt text. A reference that is itself a
    /// `data:` URL is not repeated.
    #[must_use]
    pub fn source(&self) -> &str {
        if self.reference.starts_with("data:") {
            "inline image"
        } else {
            &self.reference
        }
    }

    /// Label the photo at `index` (0-based) goes by in prompts: `photo_1`, ...
    #[must_use]
    pub fn label(index: usize) -> String {
        format!("photo_{}", index + 1)
    }
}

/// Everything one claim run needs: who, which vehicle, which photos and the
/// raw claim data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimTask {
    customer: CustomerRecord,
    raw_claim: RawClaim,
    photos: Vec<Photo>,
}

impl ClaimTask {
    /// Assemble a task.
    #[must_use]
    pub const fn new(customer: CustomerRecord, raw_claim: RawClaim, photos: Vec<Photo>) -> Self {
        Self {
            customer,
            raw_claim,
            photos,
        }
    }

    /// The customer record.
    #[must_use]
    pub const fn customer(&self) -> &CustomerRecord {
        &self.customer
    }

    /// The raw claim.
    #[must_use]
    pub const fn raw_claim(&self) -> &RawClaim {
        &self.raw_claim
    }

    /// Claim photos, in the order they were supplied.
    #[must_use]
    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    /// The claim identifier.
    #[must_use]
    pub fn claim_number(&self) -> &str {
        self.raw_claim.claim_number()
    }

    /// Render the request text screened by the guardrail and given to every
    /// specialist as shared context. Photos are listed by label and
    /// reference, never by URL.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = String::with_capacity(512);
        // Writing into a String cannot fail.
        let _ = self.write_description(&mut text);
        text
    }

    fn write_description(&self, text: &mut String) -> fmt::Result {
        let customer = &self.customer;
        writeln!(
            text,
            "Process insurance claim {} for {}.",
            self.claim_number(),
            customer.customer_name
        )?;
        writeln!(text, "Vehicle: {}", customer.vehicle_identity())?;
        writeln!(text, "Vehicle year: {}", customer.customer_vehicle_year)?;
        writeln!(text, "Vehicle make: {}", customer.customer_vehicle_make)?;
        writeln!(text, "Vehicle model: {}", customer.customer_vehicle_model)?;
        writeln!(text, "Customer address: {}", customer.customer_address)?;
        writeln!(text, "Damage photos:")?;
        for (index, photo) in self.photos.iter().enumerate() {
            writeln!(text, "- {} ({})", Photo::label(index), photo.source())?;
        }
        let raw = serde_json::to_string_pretty(&self.raw_claim).unwrap_or_default();
        write!(text, "Raw claim data:\n{raw}")
    }
}
