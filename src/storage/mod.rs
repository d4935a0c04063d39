//! Record store
//!
//! Holds the flat row types the FHIR layer consumes and the store contract:
//! - Patient and sleep-observation lookups
//! - The small set of writes the HTTP surface exposes
//! - A SQLite-backed implementation

mod sqlite;
pub use sqlite::SqliteStore;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    LockPoisoned,
}

/// A loosely-typed measurement cell.
///
/// SQLite keeps whatever was inserted, so a `REAL` column can still hand back
/// text such as `"n/a"`. The FHIR layer decides how to coerce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    /// Numeric reading of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real(r) if r.is_finite() => Some(*r),
            CellValue::Real(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl FromSql for CellValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(CellValue::Integer(i)),
            ValueRef::Real(r) => Ok(CellValue::Real(r)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| CellValue::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Null | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Integer(i) => ToSqlOutput::from(*i),
            CellValue::Real(r) => ToSqlOutput::from(*r),
            CellValue::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// One row of the `Patients` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

/// One row of `sleep_observations`, keyed by `(patient_id, observation_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub patient_id: i64,
    pub snoring_rate: Option<CellValue>,
    pub respiratory_rate: Option<CellValue>,
    pub body_temperature: Option<CellValue>,
    pub limb_movement: Option<CellValue>,
    pub blood_oxygen: Option<CellValue>,
    pub eye_movement: Option<CellValue>,
    pub sleeping_hours: Option<CellValue>,
    pub heart_rate: Option<CellValue>,
    pub stress_level: Option<CellValue>,
    pub observation_date: Option<String>,
    /// Position of the row by observation date; computed by the store.
    pub row_rank: i64,
}

/// Patient fields accepted on insert; the store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(rename = "First_Name")]
    pub first_name: Option<String>,
    #[serde(rename = "Last_Name")]
    pub last_name: Option<String>,
    #[serde(rename = "Date_of_Birth")]
    pub birth_date: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    #[serde(rename = "Phone_Number")]
    pub phone: Option<String>,
    #[serde(rename = "Email")]
    pub email: Option<String>,
    #[serde(rename = "Address")]
    pub address: Option<String>,
    #[serde(rename = "City")]
    pub city: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Zip_Code")]
    pub zip_code: Option<String>,
}

impl NewPatient {
    pub const REQUIRED_FIELDS: [&'static str; 10] = [
        "First_Name",
        "Last_Name",
        "Date_of_Birth",
        "Gender",
        "Phone_Number",
        "Email",
        "Address",
        "City",
        "State",
        "Zip_Code",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    pub patient_id: i64,
    pub observation_date: String,
    #[serde(default)]
    pub snoring_rate: Option<CellValue>,
    #[serde(default)]
    pub respiratory_rate: Option<CellValue>,
    #[serde(default)]
    pub body_temperature: Option<CellValue>,
    #[serde(default)]
    pub limb_movement: Option<CellValue>,
    #[serde(default)]
    pub blood_oxygen: Option<CellValue>,
    #[serde(default)]
    pub eye_movement: Option<CellValue>,
    #[serde(default)]
    pub sleeping_hours: Option<CellValue>,
    #[serde(default)]
    pub heart_rate: Option<CellValue>,
    #[serde(default)]
    pub stress_level: Option<CellValue>,
}

impl NewObservation {
    pub const REQUIRED_FIELDS: [&'static str; 7] = [
        "patient_id",
        "observation_date",
        "snoring_rate",
        "respiratory_rate",
        "eye_movement",
        "sleeping_hours",
        "heart_rate",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientName {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Patients,
    SleepObservations,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Patients => "Patients",
            Table::SleepObservations => "sleep_observations",
        }
    }
}

/// Source of the rows the FHIR layer maps.
///
/// `find_observations` must exclude rows without a body temperature and return
/// the rest in ascending `observation_date` order.
pub trait RecordStore: Send + Sync {
    fn find_patient(&self, id: i64) -> Result<Option<PatientRecord>, StorageError>;

    fn find_observations(&self, patient_id: i64) -> Result<Vec<ObservationRecord>, StorageError>;

    fn insert_patient(&self, patient: &NewPatient) -> Result<i64, StorageError>;

    fn insert_observation(&self, observation: &NewObservation) -> Result<(), StorageError>;

    fn delete_observation(&self, patient_id: i64, observation_date: &str) -> Result<usize, StorageError>;

    fn patient_names(&self) -> Result<Vec<PatientName>, StorageError>;

    fn observation_dates(&self, patient_id: i64) -> Result<Vec<String>, StorageError>;

    fn count(&self, table: Table) -> Result<i64, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_coercion() {
        assert_eq!(CellValue::Integer(70).as_f64(), Some(70.0));
        assert_eq!(CellValue::Real(7.5).as_f64(), Some(7.5));
        assert_eq!(CellValue::Text(" 18.0 ".to_string()).as_f64(), Some(18.0));
        assert_eq!(CellValue::Text("n/a".to_string()).as_f64(), None);
        assert_eq!(CellValue::Text(String::new()).as_f64(), None);
        assert_eq!(CellValue::Real(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_cell_from_json() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[70, 5.5, "0"]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                CellValue::Integer(70),
                CellValue::Real(5.5),
                CellValue::Text("0".to_string()),
            ]
        );
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Integer(1).to_string(), "1");
        assert_eq!(CellValue::Real(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Text("high".to_string()).to_string(), "high");
    }
}
