//! sleepfhir: patient and sleep-observation records as FHIR resources
//!
//! Rows come out of a SQLite store, get mapped into Patient resources and
//! searchset Bundles of Observations, and are served as JSON over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod fhir;
pub mod service;
pub mod storage;

pub use error::{ServiceError, ServiceResult};
pub use service::SleepService;
