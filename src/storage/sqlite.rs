use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    CellValue, NewObservation, NewPatient, ObservationRecord, PatientName, PatientRecord, RecordStore,
    StorageError, Table,
};

const CREATE_PATIENTS: &str = "
    CREATE TABLE IF NOT EXISTS Patients (
        Patient_ID INTEGER PRIMARY KEY,
        First_Name TEXT,
        Last_Name TEXT,
        Date_of_Birth TEXT,
        Gender TEXT,
        Phone_Number TEXT,
        Email TEXT,
        Address TEXT,
        City TEXT,
        State TEXT,
        Zip_Code TEXT
    )";

const CREATE_SLEEP_OBSERVATIONS: &str = "
    CREATE TABLE IF NOT EXISTS sleep_observations (
        patient_id INTEGER,
        snoring_rate REAL,
        respiratory_rate REAL,
        body_temperature REAL,
        limb_movement REAL,
        blood_oxygen REAL,
        eye_movement REAL,
        sleeping_hours REAL,
        heart_rate INTEGER,
        stress_level INTEGER,
        observation_date TEXT,
        PRIMARY KEY (patient_id, observation_date)
    )";

const SELECT_PATIENT: &str = "
    SELECT Patient_ID, First_Name, Last_Name, Date_of_Birth, Gender, Phone_Number,
           Email, Address, City, State, Zip_Code
    FROM Patients
    WHERE Patient_ID = ?1";

// Rows without a body temperature carry no usable measurements.
const SELECT_OBSERVATIONS: &str = "
    SELECT patient_id, snoring_rate, respiratory_rate, body_temperature, limb_movement,
           blood_oxygen, eye_movement, sleeping_hours, heart_rate, stress_level,
           observation_date, obs_rank
    FROM (
        SELECT *, ROW_NUMBER() OVER (ORDER BY observation_date) AS obs_rank
        FROM sleep_observations
        WHERE patient_id = ?1
    )
    WHERE body_temperature IS NOT NULL
    ORDER BY observation_date";

/// SQLite-backed [`RecordStore`] over the `Patients` and `sleep_observations` tables.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and makes sure both tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::info!("Opened record store at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(&format!("{};\n{};", CREATE_PATIENTS, CREATE_SLEEP_OBSERVATIONS))?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    Ok(PatientRecord {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        // Databases created with a DATE column may hold year-only dates as integers.
        birth_date: row.get::<_, Option<CellValue>>(3)?.map(|v| v.to_string()),
        gender: row.get(4)?,
        phone: row.get(5)?,
        email: row.get(6)?,
        address: row.get(7)?,
        city: row.get(8)?,
        state: row.get(9)?,
        zip_code: row.get(10)?,
    })
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<ObservationRecord> {
    Ok(ObservationRecord {
        patient_id: row.get(0)?,
        snoring_rate: row.get(1)?,
        respiratory_rate: row.get(2)?,
        body_temperature: row.get(3)?,
        limb_movement: row.get(4)?,
        blood_oxygen: row.get(5)?,
        eye_movement: row.get(6)?,
        sleeping_hours: row.get(7)?,
        heart_rate: row.get(8)?,
        stress_level: row.get(9)?,
        observation_date: row.get(10)?,
        row_rank: row.get(11)?,
    })
}

impl RecordStore for SqliteStore {
    fn find_patient(&self, id: i64) -> Result<Option<PatientRecord>, StorageError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(SELECT_PATIENT, params![id], patient_from_row)
            .optional()?;
        Ok(record)
    }

    fn find_observations(&self, patient_id: i64) -> Result<Vec<ObservationRecord>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(SELECT_OBSERVATIONS)?;
        let records = stmt
            .query_map(params![patient_id], observation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        tracing::debug!("Fetched {} observations for patient {}", records.len(), patient_id);
        Ok(records)
    }

    fn insert_patient(&self, patient: &NewPatient) -> Result<i64, StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO Patients
                (First_Name, Last_Name, Date_of_Birth, Gender, Phone_Number, Email,
                 Address, City, State, Zip_Code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                patient.first_name,
                patient.last_name,
                patient.birth_date,
                patient.gender,
                patient.phone,
                patient.email,
                patient.address,
                patient.city,
                patient.state,
                patient.zip_code,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!("Inserted patient {}", id);
        Ok(id)
    }

    fn insert_observation(&self, observation: &NewObservation) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sleep_observations
                (patient_id, snoring_rate, respiratory_rate, body_temperature, limb_movement,
                 blood_oxygen, eye_movement, sleeping_hours, heart_rate, stress_level,
                 observation_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                observation.patient_id,
                observation.snoring_rate,
                observation.respiratory_rate,
                observation.body_temperature,
                observation.limb_movement,
                observation.blood_oxygen,
                observation.eye_movement,
                observation.sleeping_hours,
                observation.heart_rate,
                observation.stress_level,
                observation.observation_date,
            ],
        )?;
        tracing::info!(
            "Inserted sleep observation for patient {} on {}",
            observation.patient_id,
            observation.observation_date
        );
        Ok(())
    }

    fn delete_observation(&self, patient_id: i64, observation_date: &str) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sleep_observations WHERE patient_id = ?1 AND observation_date = ?2",
            params![patient_id, observation_date],
        )?;
        tracing::info!(
            "Deleted {} observation(s) for patient {} on {}",
            deleted,
            patient_id,
            observation_date
        );
        Ok(deleted)
    }

    fn patient_names(&self) -> Result<Vec<PatientName>, StorageError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT Patient_ID, First_Name, Last_Name FROM Patients ORDER BY Patient_ID")?;
        let names = stmt
            .query_map([], |row| {
                Ok(PatientName {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn observation_dates(&self, patient_id: i64) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT observation_date FROM sleep_observations
             WHERE patient_id = ?1 AND observation_date IS NOT NULL
             ORDER BY observation_date",
        )?;
        let dates = stmt
            .query_map(params![patient_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(dates)
    }

    fn count(&self, table: Table) -> Result<i64, StorageError> {
        let conn = self.conn()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}
