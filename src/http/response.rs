//! Response construction.
//!
//! # Responsibilities
//! - Render an [`ErrorRecord`] as an `application/problem+json` body
//! - Attach rate-limit and retry headers
//!
//! # Design Decisions
//! - Problem bodies never carry internal error detail; only the record's
//!   caller-safe detail is exposed

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::mediation::ErrorRecord;
use crate::security::RateLimitDecision;

pub const PROBLEM_JSON: &str = "application/problem+json";

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Problem details body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemResponse {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub code: String,
    pub correlation_id: String,
}

impl ProblemResponse {
    pub fn from_record(record: &ErrorRecord, instance: &str) -> Self {
        let classification = record.classification();
        Self {
            type_uri: classification.type_uri(),
            title: classification.title.to_string(),
            status: classification.status.as_u16(),
            detail: record.detail().to_string(),
            instance: instance.to_string(),
            code: classification.code.to_string(),
            correlation_id: record.correlation_id().to_string(),
        }
    }
}

/// Build the full error response for a record, including `Retry-After` when
/// the record carries a hint.
pub fn problem_response(record: &ErrorRecord, instance: &str) -> Response {
    problem_response_with_status(record, instance, record.http_status())
}

/// Same as [`problem_response`] but answers with `status` instead of the
/// classified one. Used for rejections that already carry a more precise
/// status (413, 405) than the taxonomy assigns.
pub fn problem_response_with_status(record: &ErrorRecord, instance: &str, status: StatusCode) -> Response {
    let mut problem = ProblemResponse::from_record(record, instance);
    problem.status = status.as_u16();
    let mut response = (status, Json(problem)).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    if let Some(seconds) = record.retry_after_seconds() {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }
    response
}

pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(decision.reset_seconds));
}
