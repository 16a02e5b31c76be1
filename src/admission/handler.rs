//! AdmissionReview handling for KongFiles
//!
//! Denials are ordinary responses with `allowed: false` and code 400. Anything
//! that prevents a decision (unknown resource, undecodable object, validator
//! failure) fails the whole HTTP exchange instead.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use tracing::{debug, error, info};

use super::AdmissionState;
use crate::crd::{Resource, ResourceKind};

/// Status code attached to denials
pub const DENIAL_CODE: u16 = 400;

/// Errors that abort an admission exchange
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The request body was missing or not an AdmissionReview
    #[error("{0}")]
    BadRequest(String),

    /// The review names a resource this webhook does not validate
    #[error("unknown resource type to validate: {0}")]
    UnknownResource(String),

    /// Decoding, validation or encoding failed
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdmissionError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdmissionError::UnknownResource(_) | AdmissionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Handle a validating AdmissionReview
pub async fn validate_handler(
    State(state): State<Arc<AdmissionState>>,
    body: Bytes,
) -> Result<Response, AdmissionError> {
    if body.is_empty() {
        info!("received admission request with empty body");
        return Err(AdmissionError::BadRequest(
            "admission review object is missing".to_string(),
        ));
    }

    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "failed to parse AdmissionReview");
        AdmissionError::BadRequest(e.to_string())
    })?;
    let request = TryInto::<AdmissionRequest<DynamicObject>>::try_into(review).map_err(|e| {
        error!(error = %e, "AdmissionReview carries no request");
        AdmissionError::BadRequest(e.to_string())
    })?;

    let response = review_request(&state, &request)
        .await
        .inspect_err(|e| error!(error = %e, uid = %request.uid, "failed to run validation"))?;

    let body = serde_json::to_vec(&response.into_review()).map_err(|e| {
        error!(error = %e, "failed to encode AdmissionReview");
        AdmissionError::Internal(e.to_string())
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Produce a decision for one admission request
async fn review_request(
    state: &AdmissionState,
    request: &AdmissionRequest<DynamicObject>,
) -> Result<AdmissionResponse, AdmissionError> {
    let gvr = &request.resource;
    if ResourceKind::from_gvr(gvr).is_none() {
        return Err(AdmissionError::UnknownResource(format!(
            "{}/{} {}",
            gvr.group, gvr.version, gvr.resource
        )));
    }

    let object = request
        .object
        .as_ref()
        .ok_or_else(|| AdmissionError::Internal("admission request carries no object".to_string()))?;
    let resource = Resource::decode(gvr, object).map_err(|e| AdmissionError::Internal(e.to_string()))?;

    let decision = state
        .validator
        .validate(&resource)
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?;

    debug!(
        uid = %request.uid,
        key = %resource.key(),
        allowed = decision.allowed,
        reason = %decision.reason,
        "admission decision"
    );

    let response = AdmissionResponse::from(request);
    if decision.allowed {
        return Ok(response);
    }

    let mut response = response.deny(decision.reason);
    response.result.code = DENIAL_CODE;
    Ok(response)
}
