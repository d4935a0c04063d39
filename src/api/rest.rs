use std::convert::Infallible;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::{ServiceError, ServiceResult};
use crate::fhir::{BundleVariant, Patient};
use crate::service::SleepService;
use crate::storage::{NewObservation, NewPatient};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessBody {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteObservationRequest {
    pub patient_id: i64,
    pub observation_date: String,
}

impl DeleteObservationRequest {
    const REQUIRED_FIELDS: [&'static str; 2] = ["patient_id", "observation_date"];
}

pub struct RestApi {
    service: Arc<SleepService>,
}

impl RestApi {
    pub fn new(service: Arc<SleepService>) -> Self {
        RestApi { service }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST", "OPTIONS"])
            .allow_header("content-type");

        self.get_patient()
            .or(self.get_observations("sleep-observations", BundleVariant::Plain))
            .or(self.get_observations("sleep-observations-loinc", BundleVariant::Coded))
            .or(self.add_new_patient())
            .or(self.post_patient())
            .or(self.insert_sleep_data())
            .or(self.delete_patient_obs())
            .or(self.get_names())
            .or(self.get_dates())
            .with(cors)
            .with(warp::trace::request())
            .recover(handle_rejection)
    }

    fn with_service(&self) -> impl Filter<Extract = (Arc<SleepService>,), Error = Infallible> + Clone {
        let service = Arc::clone(&self.service);
        warp::any().map(move || Arc::clone(&service))
    }

    fn get_patient(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "patient" / i64)
            .and(warp::get())
            .and(self.with_service())
            .and_then(|patient_id: i64, service: Arc<SleepService>| async move {
                let result = blocking(move || service.patient(patient_id)).await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::OK))
            })
    }

    fn get_observations(
        &self,
        segment: &'static str,
        variant: BundleVariant,
    ) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path("fhir")
            .and(warp::path(segment))
            .and(warp::path::param::<i64>())
            .and(warp::path::end())
            .and(warp::get())
            .and(self.with_service())
            .and_then(move |patient_id: i64, service: Arc<SleepService>| async move {
                tracing::debug!("Fetching {:?} observations for patient {}", variant, patient_id);
                let result = blocking(move || service.observations(patient_id, variant)).await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::OK))
            })
    }

    fn add_new_patient(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "add_new_patient")
            .and(warp::post())
            .and(warp::body::json())
            .and(self.with_service())
            .and_then(|body: serde_json::Value, service: Arc<SleepService>| async move {
                let result = blocking(move || {
                    let patient = parse_body::<NewPatient>(body, &NewPatient::REQUIRED_FIELDS)?;
                    service.add_patient(&patient)?;
                    Ok(SuccessBody { success: true })
                })
                .await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::CREATED))
            })
    }

    fn post_patient(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "Patient")
            .and(warp::post())
            .and(warp::body::json())
            .and(self.with_service())
            .and_then(|patient: Patient, service: Arc<SleepService>| async move {
                let result = blocking(move || {
                    let id = service.add_fhir_patient(&patient)?;
                    service.patient(id)
                })
                .await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::CREATED))
            })
    }

    fn insert_sleep_data(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "insert_sleep_data")
            .and(warp::post())
            .and(warp::body::json())
            .and(self.with_service())
            .and_then(|body: serde_json::Value, service: Arc<SleepService>| async move {
                let result = blocking(move || {
                    let observation =
                        parse_body::<NewObservation>(body, &NewObservation::REQUIRED_FIELDS)?;
                    service.add_observation(&observation)?;
                    Ok(SuccessBody { success: true })
                })
                .await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::CREATED))
            })
    }

    fn delete_patient_obs(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "delete_patient_obs")
            .and(warp::post())
            .and(warp::body::json())
            .and(self.with_service())
            .and_then(|body: serde_json::Value, service: Arc<SleepService>| async move {
                let result = blocking(move || {
                    let req = parse_body::<DeleteObservationRequest>(
                        body,
                        &DeleteObservationRequest::REQUIRED_FIELDS,
                    )?;
                    service.delete_observation(req.patient_id, &req.observation_date)?;
                    Ok(SuccessBody { success: true })
                })
                .await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::OK))
            })
    }

    fn get_names(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "names")
            .and(warp::get())
            .and(self.with_service())
            .and_then(|service: Arc<SleepService>| async move {
                let result = blocking(move || service.patient_names()).await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::OK))
            })
    }

    fn get_dates(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        warp::path!("fhir" / "dates" / i64)
            .and(warp::get())
            .and(self.with_service())
            .and_then(|patient_id: i64, service: Arc<SleepService>| async move {
                let result = blocking(move || service.observation_dates(patient_id)).await;
                Ok::<_, Infallible>(reply_with(result, StatusCode::OK))
            })
    }
}

/// Runs a store call on tokio's blocking pool; rusqlite calls block the thread.
async fn blocking<T, F>(call: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await?
}

/// Checks that every required key is present before deserializing, so a
/// missing field is reported by name rather than as a serde error.
fn parse_body<T: DeserializeOwned>(body: serde_json::Value, required: &[&str]) -> ServiceResult<T> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| body.get(field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::InvalidRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    serde_json::from_value(body).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
}

fn json_response<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn reply_with<T: Serialize>(result: ServiceResult<T>, status: StatusCode) -> Response {
    match result {
        Ok(body) => json_response(&body, status),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &ServiceError) -> Response {
    if err.is_not_found() {
        return warp::reply::with_status(err.to_string(), StatusCode::NOT_FOUND).into_response();
    }

    let status = match err {
        ServiceError::InvalidRequest(_) | ServiceError::Fhir(_) => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!("Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_response(
        &ErrorBody {
            error: err.to_string(),
        },
        status,
    )
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected a JSON body".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, e.to_string())
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(json_response(&ErrorBody { error: message }, status))
}
