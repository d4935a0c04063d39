use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::fhir::{Bundle, BundleAssembler, BundleVariant, FhirConverter, Patient, ResourceMapper};
use crate::storage::{NewObservation, NewPatient, RecordStore, Table};

/// `{value, label}` pair used by the patient and date pickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Looks records up in the store and hands them to the FHIR mappers.
pub struct SleepService {
    store: Arc<dyn RecordStore>,
    assembler: BundleAssembler,
}

impl SleepService {
    pub fn new(store: Arc<dyn RecordStore>, assembler: BundleAssembler) -> Self {
        SleepService { store, assembler }
    }

    pub fn patient(&self, patient_id: i64) -> ServiceResult<Patient> {
        let record = self.store.find_patient(patient_id)?;
        Ok(ResourceMapper::map_patient(record.as_ref())?)
    }

    pub fn observations(&self, patient_id: i64, variant: BundleVariant) -> ServiceResult<Bundle> {
        let records = self.store.find_observations(patient_id)?;
        Ok(self.assembler.assemble(&records, variant)?)
    }

    pub fn add_patient(&self, patient: &NewPatient) -> ServiceResult<i64> {
        Ok(self.store.insert_patient(patient)?)
    }

    pub fn add_fhir_patient(&self, patient: &Patient) -> ServiceResult<i64> {
        let row = patient.to_new_row()?;
        self.add_patient(&row)
    }

    pub fn add_observation(&self, observation: &NewObservation) -> ServiceResult<()> {
        validate_date(&observation.observation_date)?;
        Ok(self.store.insert_observation(observation)?)
    }

    pub fn delete_observation(&self, patient_id: i64, observation_date: &str) -> ServiceResult<usize> {
        Ok(self.store.delete_observation(patient_id, observation_date)?)
    }

    pub fn patient_names(&self) -> ServiceResult<Vec<SelectOption>> {
        let names = self.store.patient_names()?;
        Ok(names
            .into_iter()
            .map(|name| {
                let label = [name.first_name, name.last_name]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                SelectOption {
                    value: name.id.to_string(),
                    label,
                }
            })
            .collect())
    }

    pub fn observation_dates(&self, patient_id: i64) -> ServiceResult<Vec<SelectOption>> {
        let dates = self.store.observation_dates(patient_id)?;
        Ok(dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| SelectOption {
                value: (i + 1).to_string(),
                label: date,
            })
            .collect())
    }

    pub fn count(&self, table: Table) -> ServiceResult<i64> {
        Ok(self.store.count(table)?)
    }
}

fn validate_date(date: &str) -> ServiceResult<()> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| ServiceError::InvalidRequest(format!("observation_date '{}': {}", date, e)))
}
