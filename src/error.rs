use thiserror::Error;

use crate::fhir::FhirError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fhir(#[from] FhirError),

    /// Message is returned to the client as-is.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Fhir(FhirError::NotFound(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
