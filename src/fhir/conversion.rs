use super::resources::Patient;
use super::{
    Address, AddressUse, ContactPoint, ContactPointSystem, FhirError, FhirResult, HumanName,
    Identifier, IdentifierUse, NameUse,
};
use crate::storage::{NewPatient, PatientRecord};

/// Converts between FHIR resources and the store's flat rows.
pub trait FhirConverter: Sized {
    /// Row shape read back from the store.
    type Row;
    /// Row shape accepted by the store on insert.
    type NewRow;

    fn from_row(row: &Self::Row) -> Self;

    fn to_new_row(&self) -> FhirResult<Self::NewRow>;
}

impl FhirConverter for Patient {
    type Row = PatientRecord;
    type NewRow = NewPatient;

    fn from_row(row: &PatientRecord) -> Self {
        let id = row.id.to_string();

        Patient {
            resource_type: Patient::RESOURCE_TYPE.to_string(),
            id: Some(id.clone()),
            identifier: vec![Identifier {
                use_: Some(IdentifierUse::Official),
                value: Some(id),
            }],
            name: vec![HumanName {
                use_: Some(NameUse::Official),
                family: row.last_name.clone(),
                given: row.first_name.iter().cloned().collect(),
            }],
            birth_date: row.birth_date.clone(),
            gender: row.gender.clone(),
            telecom: vec![
                ContactPoint {
                    system: Some(ContactPointSystem::Phone),
                    value: row.phone.clone(),
                },
                ContactPoint {
                    system: Some(ContactPointSystem::Email),
                    value: row.email.clone(),
                },
            ],
            address: vec![Address {
                use_: Some(AddressUse::Home),
                line: row.address.iter().cloned().collect(),
                city: row.city.clone(),
                state: row.state.clone(),
                postal_code: row.zip_code.clone(),
            }],
        }
    }

    /// Flattens a Patient for insert. The store assigns the id, so any id on
    /// the resource is ignored.
    fn to_new_row(&self) -> FhirResult<NewPatient> {
        if self.resource_type != Patient::RESOURCE_TYPE {
            return Err(FhirError::Conversion(format!(
                "expected resourceType 'Patient', got '{}'",
                self.resource_type
            )));
        }

        let name = self
            .name
            .iter()
            .find(|n| n.use_ == Some(NameUse::Official))
            .or_else(|| self.name.first());
        let address = self
            .address
            .iter()
            .find(|a| a.use_ == Some(AddressUse::Home))
            .or_else(|| self.address.first());
        let telecom = |system: ContactPointSystem| {
            self.telecom
                .iter()
                .find(|c| c.system == Some(system))
                .and_then(|c| c.value.clone())
        };

        Ok(NewPatient {
            first_name: name.and_then(|n| n.given.first().cloned()),
            last_name: name.and_then(|n| n.family.clone()),
            birth_date: self.birth_date.clone(),
            gender: self.gender.clone(),
            phone: telecom(ContactPointSystem::Phone),
            email: telecom(ContactPointSystem::Email),
            address: address.and_then(|a| a.line.first().cloned()),
            city: address.and_then(|a| a.city.clone()),
            state: address.and_then(|a| a.state.clone()),
            zip_code: address.and_then(|a| a.postal_code.clone()),
        })
    }
}
