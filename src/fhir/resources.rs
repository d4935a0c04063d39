use serde::{Deserialize, Serialize};

use super::conversion::FhirConverter;
use super::{Address, CodeableConcept, ContactPoint, FhirError, FhirResult, HumanName, Identifier, Quantity, Reference};
use crate::storage::PatientRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub resource_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier: Vec<Identifier>,
    #[serde(default)]
    pub name: Vec<HumanName>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub telecom: Vec<ContactPoint>,
    #[serde(default)]
    pub address: Vec<Address>,
}

impl Patient {
    pub const RESOURCE_TYPE: &'static str = "Patient";
}

/// One named sub-measurement. Exactly one of the two values is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationComponent {
    pub code: CodeableConcept,
    pub value_quantity: Option<Quantity>,
    pub value_string: Option<String>,
}

impl ObservationComponent {
    pub fn quantity(code: CodeableConcept, value: f64, unit: Option<&str>) -> Self {
        ObservationComponent {
            code,
            value_quantity: Some(Quantity {
                value: Some(value),
                unit: unit.map(str::to_string),
            }),
            value_string: None,
        }
    }

    pub fn string(code: CodeableConcept, value: String) -> Self {
        ObservationComponent {
            code,
            value_quantity: None,
            value_string: Some(value),
        }
    }

    /// The component's label (its code text).
    pub fn label(&self) -> Option<&str> {
        self.code.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub resource_type: String,
    pub status: String,
    pub code: CodeableConcept,
    pub subject: Reference,
    pub component: Vec<ObservationComponent>,
}

impl Observation {
    pub const RESOURCE_TYPE: &'static str = "Observation";

    pub fn component(&self, label: &str) -> Option<&ObservationComponent> {
        self.component.iter().find(|c| c.label() == Some(label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub resource: Observation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub total: Option<usize>,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub const RESOURCE_TYPE: &'static str = "Bundle";

    pub fn searchset(entry: Vec<BundleEntry>) -> Self {
        Bundle {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            type_: "searchset".to_string(),
            total: Some(entry.len()),
            entry,
        }
    }
}

/// Builds Patient resources from patient rows.
pub struct ResourceMapper;

impl ResourceMapper {
    /// Map a looked-up patient row; an absent row is `NotFound`.
    pub fn map_patient(record: Option<&PatientRecord>) -> FhirResult<Patient> {
        match record {
            Some(record) => Ok(Patient::from_row(record)),
            None => Err(FhirError::NotFound("Patient".to_string())),
        }
    }
}
