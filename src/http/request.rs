//! Request inspection and validation.
//!
//! # Responsibilities
//! - Derive the rate-limit key for a caller
//! - Parse and validate the recommendation request body
//!
//! # Design Decisions
//! - Validation happens before mediation and never consumes a token
//! - The first violation found is reported; callers fix one thing at a time

use std::net::SocketAddr;

use axum::http::HeaderMap;
use thiserror::Error;

use crate::backend::RecommendationRequest;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REQUEST_ID: &str = "x-request-id";

const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "ru"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("request body is not a valid recommendation request: {0}")]
    Malformed(String),

    #[error("{field} {message}")]
    Field {
        field: String,
        message: &'static str,
    },
}

impl RequestValidationError {
    fn field(field: impl Into<String>, message: &'static str) -> Self {
        RequestValidationError::Field {
            field: field.into(),
            message,
        }
    }
}

/// Identity used for rate limiting: the first `X-Forwarded-For` entry, or the
/// peer IP when the header is absent or empty.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Parse a request body and check it against the request contract.
pub fn validate(body: &[u8]) -> Result<RecommendationRequest, RequestValidationError> {
    let request: RecommendationRequest =
        serde_json::from_slice(body).map_err(|e| RequestValidationError::Malformed(e.to_string()))?;

    if request.show_id.trim().is_empty() {
        return Err(RequestValidationError::field("showId", "must not be blank"));
    }
    if request.target_season < 1 {
        return Err(RequestValidationError::field("targetSeason", "must be at least 1"));
    }
    if !(1..=5).contains(&request.immersion) {
        return Err(RequestValidationError::field("immersion", "must be between 1 and 5"));
    }
    if !SUPPORTED_LANGUAGES.contains(&request.language.as_str()) {
        return Err(RequestValidationError::field("language", "must be one of en, ru"));
    }

    for (i, episode) in request.episodes.iter().flatten().enumerate() {
        if episode.id.trim().is_empty() {
            return Err(RequestValidationError::field(format!("episodes[{i}].id"), "must not be blank"));
        }
        if episode.title.trim().is_empty() {
            return Err(RequestValidationError::field(
                format!("episodes[{i}].title"),
                "must not be blank",
            ));
        }
        if episode.summary.trim().is_empty() {
            return Err(RequestValidationError::field(
                format!("episodes[{i}].summary"),
                "must not be blank",
            ));
        }
        if episode.season < 1 {
            return Err(RequestValidationError::field(
                format!("episodes[{i}].season"),
                "must be at least 1",
            ));
        }
        if episode.episode < 1 {
            return Err(RequestValidationError::field(
                format!("episodes[{i}].episode"),
                "must be at least 1",
            ));
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.7:51000".parse().unwrap()
    }

    #[test]
    fn key_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"));
        assert_eq!(client_key(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn key_falls_back_to_peer_ip() {
        assert_eq!(client_key(&HeaderMap::new(), peer()), "192.0.2.7");

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("  "));
        assert_eq!(client_key(&headers, peer()), "192.0.2.7");
    }

    #[test]
    fn accepts_minimal_request() {
        let req = validate(br#"{"showId":"got","targetSeason":1,"immersion":5}"#).unwrap();
        assert_eq!(req.language, "en");
        assert!(req.episodes.is_none());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let cases: [(&[u8], &str); 5] = [
            (br#"{"showId":" ","targetSeason":1,"immersion":3}"#, "showId"),
            (br#"{"showId":"got","targetSeason":0,"immersion":3}"#, "targetSeason"),
            (br#"{"showId":"got","targetSeason":1,"immersion":6}"#, "immersion"),
            (br#"{"showId":"got","targetSeason":1,"immersion":0}"#, "immersion"),
            (br#"{"showId":"got","targetSeason":1,"immersion":3,"language":"de"}"#, "language"),
        ];
        for (body, expected) in cases {
            match validate(body) {
                Err(RequestValidationError::Field { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} violation, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_bad_episode_entries() {
        let body = br#"{"showId":"got","targetSeason":2,"immersion":3,"episodes":[
            {"id":"S1E1","season":1,"episode":1,"title":"Pilot","summary":"Winter comes"},
            {"id":"S1E2","season":1,"episode":0,"title":"Second","summary":"Kingsroad"}
        ]}"#;
        assert_eq!(
            validate(body).unwrap_err(),
            RequestValidationError::field("episodes[1].episode", "must be at least 1")
        );
    }

    #[test]
    fn episode_summary_is_required() {
        let blank = br#"{"showId":"got","targetSeason":2,"immersion":3,"episodes":[
            {"id":"S1E1","season":1,"episode":1,"title":"Pilot","summary":"  "}
        ]}"#;
        let absent = br#"{"showId":"got","targetSeason":2,"immersion":3,"episodes":[
            {"id":"S1E1","season":1,"episode":1,"title":"Pilot","summary":"Winter comes"},
            {"id":"S1E2","season":1,"episode":2,"title":"Kingsroad"}
        ]}"#;
        assert_eq!(
            validate(blank).unwrap_err(),
            RequestValidationError::field("episodes[0].summary", "must not be blank")
        );
        assert_eq!(
            validate(absent).unwrap_err(),
            RequestValidationError::field("episodes[1].summary", "must not be blank")
        );
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(validate(b"{not json"), Err(RequestValidationError::Malformed(_))));
        assert!(matches!(
            validate(br#"{"showId":"got","targetSeason":"two","immersion":3}"#),
            Err(RequestValidationError::Malformed(_))
        ));
    }
}
