//! Wire types exchanged with callers and with the recommendation backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A recommendation request as submitted by the caller and forwarded to the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub show_id: String,
    pub target_season: i64,
    pub immersion: i64,
    #[serde(default = "default_language")]
    pub language: String,
    /// Season → arcs the caller wants covered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_arcs_by_season: Option<BTreeMap<u32, Vec<String>>>,
    /// Precomputed episode context; the backend uses its own catalogue when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<EpisodeContext>>,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeContext {
    pub id: String,
    pub season: i64,
    pub episode: i64,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub arcs: Vec<String>,
}

/// Successful backend payload, returned to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    /// Keyed by season number; JSON object keys are the number as a string.
    pub recommendations: BTreeMap<u32, Vec<RecommendedEpisode>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedEpisode {
    pub id: String,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub arcs: Vec<String>,
}
