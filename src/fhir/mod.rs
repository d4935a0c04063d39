//! FHIR-specific types and operations
//!
//! This module contains the FHIR datatypes and resources the service emits,
//! and the transformations from store rows into them:
//! - `resources`: Patient / Observation / Bundle and the patient mapper
//! - `bundle`: the searchset assembler for sleep observations
//! - `coding`: the measurement labels and their LOINC table
//! - `conversion`: row <-> resource conversion

pub mod bundle;
pub mod coding;
pub mod conversion;
pub mod resources;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bundle::{BundleAssembler, BundleVariant};
pub use coding::{ComponentCodes, Measurement};
pub use conversion::FhirConverter;
pub use resources::{Bundle, BundleEntry, Observation, ObservationComponent, Patient, ResourceMapper};

#[derive(Debug, Error)]
pub enum FhirError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conversion error: {0}")]
    Conversion(String),
}

pub type FhirResult<T> = Result<T, FhirError>;

pub const LOINC_SYSTEM: &str = "http://loinc.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierUse {
    Usual,
    Official,
    Temp,
    Secondary,
    Old,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameUse {
    Usual,
    Official,
    Temp,
    Nickname,
    Anonymous,
    Old,
    Maiden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPointSystem {
    Phone,
    Fax,
    Email,
    Pager,
    Url,
    Sms,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressUse {
    Home,
    Work,
    Temp,
    Old,
    Billing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "use", default)]
    pub use_: Option<IdentifierUse>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", default)]
    pub use_: Option<NameUse>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    #[serde(default)]
    pub system: Option<ContactPointSystem>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "use", default)]
    pub use_: Option<AddressUse>,
    #[serde(default)]
    pub line: Vec<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

impl Coding {
    pub fn loinc(code: &str, display: &str) -> Self {
        Coding {
            system: Some(LOINC_SYSTEM.to_string()),
            code: Some(code.to_string()),
            display: Some(display.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    pub coding: Option<Vec<Coding>>,
    pub text: Option<String>,
}

impl CodeableConcept {
    /// A concept carrying only a human-readable label.
    pub fn text(text: &str) -> Self {
        CodeableConcept {
            coding: None,
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Option<f64>,
    pub unit: Option<String>,
}
