use std::collections::BTreeMap;

use super::{Coding, LOINC_SYSTEM};
use crate::storage::{CellValue, ObservationRecord};

/// The nine sleep measurements, in row column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    SnoringRate,
    RespiratoryRate,
    BodyTemperature,
    LimbMovement,
    BloodOxygen,
    EyeMovement,
    SleepingHours,
    HeartRate,
    StressLevel,
}

impl Measurement {
    pub const ALL: [Measurement; 9] = [
        Measurement::SnoringRate,
        Measurement::RespiratoryRate,
        Measurement::BodyTemperature,
        Measurement::LimbMovement,
        Measurement::BloodOxygen,
        Measurement::EyeMovement,
        Measurement::SleepingHours,
        Measurement::HeartRate,
        Measurement::StressLevel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Measurement::SnoringRate => "Snoring Rate",
            Measurement::RespiratoryRate => "Respiratory Rate",
            Measurement::BodyTemperature => "Body Temperature",
            Measurement::LimbMovement => "Limb Movement",
            Measurement::BloodOxygen => "Blood Oxygen",
            Measurement::EyeMovement => "Eye Movement",
            Measurement::SleepingHours => "Sleeping Hours",
            Measurement::HeartRate => "Heart Rate",
            Measurement::StressLevel => "Stress Level",
        }
    }

    fn default_code(self) -> &'static str {
        match self {
            Measurement::SnoringRate => "R06.83",
            Measurement::RespiratoryRate => "9279-1",
            Measurement::BodyTemperature => "8310-5",
            Measurement::LimbMovement => "G47.6",
            Measurement::BloodOxygen => "20564-1",
            Measurement::EyeMovement => "H55.89",
            Measurement::SleepingHours => "45550-1",
            Measurement::HeartRate => "8889-8",
            Measurement::StressLevel => "76542-0",
        }
    }

    /// Display unit for the plain bundle; only sleeping hours has one.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Measurement::SleepingHours => Some("h"),
            _ => None,
        }
    }

    pub fn cell(self, record: &ObservationRecord) -> Option<&CellValue> {
        let cell = match self {
            Measurement::SnoringRate => &record.snoring_rate,
            Measurement::RespiratoryRate => &record.respiratory_rate,
            Measurement::BodyTemperature => &record.body_temperature,
            Measurement::LimbMovement => &record.limb_movement,
            Measurement::BloodOxygen => &record.blood_oxygen,
            Measurement::EyeMovement => &record.eye_movement,
            Measurement::SleepingHours => &record.sleeping_hours,
            Measurement::HeartRate => &record.heart_rate,
            Measurement::StressLevel => &record.stress_level,
        };
        cell.as_ref()
    }
}

/// Immutable label -> code table used to annotate coded components.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCodes {
    system: String,
    codes: BTreeMap<String, String>,
}

impl ComponentCodes {
    pub fn new(system: impl Into<String>, codes: BTreeMap<String, String>) -> Self {
        ComponentCodes {
            system: system.into(),
            codes,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn code_for(&self, label: &str) -> Option<&str> {
        self.codes.get(label).map(String::as_str)
    }

    pub fn coding_for(&self, measurement: Measurement) -> Option<Coding> {
        let code = self.code_for(measurement.label())?;
        Some(Coding {
            system: Some(self.system.clone()),
            code: Some(code.to_string()),
            display: Some(measurement.label().to_string()),
        })
    }

    /// The standard table as a plain map, e.g. for seeding configuration.
    pub fn default_codes() -> BTreeMap<String, String> {
        Measurement::ALL
            .iter()
            .map(|m| (m.label().to_string(), m.default_code().to_string()))
            .collect()
    }
}

impl Default for ComponentCodes {
    fn default() -> Self {
        ComponentCodes::new(LOINC_SYSTEM, Self::default_codes())
    }
}
