//! Searchset assembly for sleep observations.
//!
//! Each observation row becomes one `Observation` with a component per
//! measurement. Two renderings exist:
//! - `Plain`: every measurement as a quantity (missing values read as 0),
//!   followed by stress level and observation date as strings.
//! - `Coded`: measurements annotated from a [`ComponentCodes`] table; a value
//!   that is not numeric drops only its own component.

use super::coding::{ComponentCodes, Measurement};
use super::resources::{Bundle, BundleEntry, Observation, ObservationComponent};
use super::{CodeableConcept, Coding, FhirError, FhirResult, Reference};
use crate::storage::{CellValue, ObservationRecord};

pub const PANEL_CODE: &str = "LOINC_CODE";
pub const PANEL_DISPLAY: &str = "Sleep Observation";
pub const OBSERVATION_DATE_LABEL: &str = "Observation Date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleVariant {
    Plain,
    Coded,
}

impl From<bool> for BundleVariant {
    fn from(coded: bool) -> Self {
        if coded {
            BundleVariant::Coded
        } else {
            BundleVariant::Plain
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BundleAssembler {
    codes: ComponentCodes,
}

impl BundleAssembler {
    pub fn new(codes: ComponentCodes) -> Self {
        BundleAssembler { codes }
    }

    pub fn codes(&self) -> &ComponentCodes {
        &self.codes
    }

    /// Builds one entry per record, in the order given.
    ///
    /// Callers hand over records already sorted; no reordering happens here.
    pub fn assemble(&self, records: &[ObservationRecord], variant: BundleVariant) -> FhirResult<Bundle> {
        if records.is_empty() {
            return Err(FhirError::NotFound("Patient observations".to_string()));
        }

        let entry: Vec<BundleEntry> = records
            .iter()
            .map(|record| BundleEntry {
                resource: self.observation(record, variant),
            })
            .collect();

        tracing::debug!("Assembled {:?} bundle with {} entries", variant, entry.len());
        Ok(Bundle::searchset(entry))
    }

    fn observation(&self, record: &ObservationRecord, variant: BundleVariant) -> Observation {
        let component = match variant {
            BundleVariant::Plain => plain_components(record),
            BundleVariant::Coded => self.coded_components(record),
        };

        Observation {
            resource_type: Observation::RESOURCE_TYPE.to_string(),
            status: "final".to_string(),
            code: panel_code(),
            subject: Reference {
                reference: Some(format!("Patient/{}", record.patient_id)),
            },
            component,
        }
    }

    fn coded_components(&self, record: &ObservationRecord) -> Vec<ObservationComponent> {
        Measurement::ALL
            .iter()
            .filter_map(|&measurement| {
                let label = measurement.label();
                let Some(coding) = self.codes.coding_for(measurement) else {
                    tracing::warn!("No code configured for {}; skipping component", label);
                    return None;
                };

                let cell = measurement.cell(record);
                // Null cells are skipped along with non-numeric ones.
                match cell.and_then(CellValue::as_f64) {
                    Some(value) => Some(ObservationComponent::quantity(
                        CodeableConcept {
                            coding: Some(vec![coding]),
                            text: Some(label.to_string()),
                        },
                        value,
                        None,
                    )),
                    None => {
                        tracing::warn!(
                            "Skipped invalid data {}, {:?} for patient {}",
                            label,
                            cell,
                            record.patient_id
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

fn panel_code() -> CodeableConcept {
    CodeableConcept {
        coding: Some(vec![Coding::loinc(PANEL_CODE, PANEL_DISPLAY)]),
        text: Some(PANEL_DISPLAY.to_string()),
    }
}

fn plain_components(record: &ObservationRecord) -> Vec<ObservationComponent> {
    let mut components: Vec<ObservationComponent> = Measurement::ALL
        .iter()
        .map(|&measurement| {
            let value = match measurement.cell(record) {
                None => 0.0,
                Some(cell) => cell.as_f64().unwrap_or_else(|| {
                    tracing::warn!(
                        "Non-numeric {} {:?} for patient {}; reporting 0",
                        measurement.label(),
                        cell,
                        record.patient_id
                    );
                    0.0
                }),
            };
            ObservationComponent::quantity(
                CodeableConcept::text(measurement.label()),
                value,
                measurement.unit(),
            )
        })
        .collect();

    components.push(ObservationComponent::string(
        CodeableConcept::text(Measurement::StressLevel.label()),
        text_or_zero(record.stress_level.as_ref().map(CellValue::to_string)),
    ));
    components.push(ObservationComponent::string(
        CodeableConcept::text(OBSERVATION_DATE_LABEL),
        text_or_zero(record.observation_date.clone()),
    ));
    components
}

fn text_or_zero(value: Option<String>) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::Quantity;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn record(patient_id: i64, date: &str) -> ObservationRecord {
        ObservationRecord {
            patient_id,
            snoring_rate: Some(CellValue::Real(5.5)),
            respiratory_rate: Some(CellValue::Real(18.0)),
            body_temperature: Some(CellValue::Real(98.0)),
            limb_movement: Some(CellValue::Real(10.0)),
            blood_oxygen: Some(CellValue::Real(90.0)),
            eye_movement: Some(CellValue::Real(0.0)),
            sleeping_hours: Some(CellValue::Real(7.5)),
            heart_rate: Some(CellValue::Integer(70)),
            stress_level: Some(CellValue::Integer(1)),
            observation_date: Some(date.to_string()),
            row_rank: 1,
        }
    }

    fn labels(observation: &Observation) -> Vec<&str> {
        observation
            .component
            .iter()
            .map(|c| c.label().unwrap_or_default())
            .collect()
    }

    fn quantity_value(observation: &Observation, label: &str) -> Option<f64> {
        observation
            .component(label)
            .and_then(|c| c.value_quantity.as_ref())
            .and_then(|q| q.value)
    }

    #[test]
    fn test_empty_records_not_found() {
        let assembler = BundleAssembler::default();
        for variant in [BundleVariant::Plain, BundleVariant::Coded] {
            let err = assembler.assemble(&[], variant).unwrap_err();
            assert!(matches!(err, FhirError::NotFound(_)));
        }
    }

    #[test]
    fn test_one_entry_per_record_in_order() {
        let records = vec![
            record(1, "2023-02-03"),
            record(1, "2023-02-01"),
            record(1, "2023-02-02"),
        ];
        let bundle = BundleAssembler::default()
            .assemble(&records, BundleVariant::Plain)
            .unwrap();

        assert_eq!(bundle.type_, "searchset");
        assert_eq!(bundle.total, Some(3));
        let dates: Vec<_> = bundle
            .entry
            .iter()
            .map(|e| {
                e.resource
                    .component(OBSERVATION_DATE_LABEL)
                    .and_then(|c| c.value_string.clone())
                    .unwrap()
            })
            .collect();
        assert_eq!(dates, vec!["2023-02-03", "2023-02-01", "2023-02-02"]);
    }

    #[test]
    fn test_observation_header() {
        let bundle = BundleAssembler::default()
            .assemble(&[record(4, "2023-02-01")], BundleVariant::Coded)
            .unwrap();
        let observation = &bundle.entry[0].resource;

        assert_eq!(observation.resource_type, "Observation");
        assert_eq!(observation.status, "final");
        assert_eq!(observation.code.text.as_deref(), Some("Sleep Observation"));
        assert_eq!(
            observation.code.coding,
            Some(vec![Coding::loinc("LOINC_CODE", "Sleep Observation")])
        );
        assert_eq!(observation.subject.reference.as_deref(), Some("Patient/4"));
    }

    #[test]
    fn test_plain_components() {
        let bundle = BundleAssembler::default()
            .assemble(&[record(1, "2023-02-01")], BundleVariant::Plain)
            .unwrap();
        let observation = &bundle.entry[0].resource;

        assert_eq!(
            labels(observation),
            vec![
                "Snoring Rate",
                "Respiratory Rate",
                "Body Temperature",
                "Limb Movement",
                "Blood Oxygen",
                "Eye Movement",
                "Sleeping Hours",
                "Heart Rate",
                "Stress Level",
                "Stress Level",
                "Observation Date",
            ]
        );
        assert!(observation.component.iter().all(|c| c.code.coding.is_none()));

        let sleeping = observation.component("Sleeping Hours").unwrap();
        assert_eq!(
            sleeping.value_quantity,
            Some(Quantity {
                value: Some(7.5),
                unit: Some("h".to_string()),
            })
        );
        let with_unit = observation
            .component
            .iter()
            .filter(|c| c.value_quantity.as_ref().and_then(|q| q.unit.as_ref()).is_some())
            .count();
        assert_eq!(with_unit, 1);

        assert_eq!(observation.component[9].value_string.as_deref(), Some("1"));
        assert_eq!(observation.component[10].value_string.as_deref(), Some("2023-02-01"));
        assert_eq!(quantity_value(observation, "Heart Rate"), Some(70.0));
    }

    #[test]
    fn test_plain_nulls_read_as_zero() {
        let mut row = record(1, "2023-02-01");
        row.snoring_rate = None;
        row.sleeping_hours = None;
        row.stress_level = None;
        row.eye_movement = Some(CellValue::Text("n/a".to_string()));

        let bundle = BundleAssembler::default()
            .assemble(&[row], BundleVariant::Plain)
            .unwrap();
        let observation = &bundle.entry[0].resource;

        assert_eq!(observation.component.len(), 11);
        assert_eq!(quantity_value(observation, "Snoring Rate"), Some(0.0));
        assert_eq!(quantity_value(observation, "Eye Movement"), Some(0.0));
        let sleeping = observation.component("Sleeping Hours").unwrap();
        assert_eq!(sleeping.value_quantity.as_ref().unwrap().value, Some(0.0));
        assert_eq!(sleeping.value_quantity.as_ref().unwrap().unit.as_deref(), Some("h"));
        assert_eq!(observation.component[9].value_string.as_deref(), Some("0"));
    }

    #[test]
    fn test_coded_example() {
        let bundle = BundleAssembler::default()
            .assemble(&[record(1, "2023-02-01")], BundleVariant::Coded)
            .unwrap();
        assert_eq!(bundle.entry.len(), 1);
        let observation = &bundle.entry[0].resource;

        assert_eq!(observation.component.len(), 9);
        assert!(observation.component(OBSERVATION_DATE_LABEL).is_none());

        let sleeping = observation.component("Sleeping Hours").unwrap();
        assert_eq!(
            sleeping.code.coding,
            Some(vec![Coding::loinc("45550-1", "Sleeping Hours")])
        );
        assert_eq!(
            sleeping.value_quantity,
            Some(Quantity {
                value: Some(7.5),
                unit: None,
            })
        );
    }

    #[test]
    fn test_coded_components_match_table() {
        let assembler = BundleAssembler::default();
        let bundle = assembler
            .assemble(&[record(1, "2023-02-01"), record(1, "2023-02-02")], BundleVariant::Coded)
            .unwrap();

        for entry in &bundle.entry {
            for component in &entry.resource.component {
                let label = component.label().unwrap();
                let coding = &component.code.coding.as_ref().unwrap()[0];
                assert_eq!(coding.code.as_deref(), assembler.codes().code_for(label));
                assert_eq!(coding.system.as_deref(), Some("http://loinc.org"));
                assert!(component.value_string.is_none());
            }
        }
    }

    #[test]
    fn test_coded_skips_uncoercible_value() {
        let mut row = record(1, "2023-02-01");
        row.blood_oxygen = Some(CellValue::Text("unknown".to_string()));
        row.heart_rate = None;

        let bundle = BundleAssembler::default()
            .assemble(&[row, record(1, "2023-02-02")], BundleVariant::Coded)
            .unwrap();

        let damaged = &bundle.entry[0].resource;
        assert_eq!(
            labels(damaged),
            vec![
                "Snoring Rate",
                "Respiratory Rate",
                "Body Temperature",
                "Limb Movement",
                "Eye Movement",
                "Sleeping Hours",
                "Stress Level",
            ]
        );
        assert_eq!(bundle.entry[1].resource.component.len(), 9);
    }

    #[test]
    fn test_coded_accepts_numeric_text() {
        let mut row = record(1, "2023-02-01");
        row.eye_movement = Some(CellValue::Text("0".to_string()));

        let bundle = BundleAssembler::default()
            .assemble(&[row], BundleVariant::Coded)
            .unwrap();
        assert_eq!(quantity_value(&bundle.entry[0].resource, "Eye Movement"), Some(0.0));
    }

    #[test]
    fn test_alternate_code_table() {
        let mut table = BTreeMap::new();
        table.insert("Heart Rate".to_string(), "8867-4".to_string());
        let assembler = BundleAssembler::new(ComponentCodes::new("http://loinc.org", table));

        let bundle = assembler
            .assemble(&[record(1, "2023-02-01")], BundleVariant::Coded)
            .unwrap();
        let observation = &bundle.entry[0].resource;
        assert_eq!(labels(observation), vec!["Heart Rate"]);
        assert_eq!(
            observation.component[0].code.coding,
            Some(vec![Coding::loinc("8867-4", "Heart Rate")])
        );
    }

    #[test]
    fn test_subject_taken_from_row() {
        let bundle = BundleAssembler::default()
            .assemble(&[record(2, "2023-02-01"), record(3, "2023-02-01")], BundleVariant::Plain)
            .unwrap();
        let subjects: Vec<_> = bundle
            .entry
            .iter()
            .map(|e| e.resource.subject.reference.clone().unwrap())
            .collect();
        assert_eq!(subjects, vec!["Patient/2", "Patient/3"]);
    }

    #[test]
    fn test_variant_from_flag() {
        assert_eq!(BundleVariant::from(true), BundleVariant::Coded);
        assert_eq!(BundleVariant::from(false), BundleVariant::Plain);
    }
}
