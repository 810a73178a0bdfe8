//! Movie record types
//!
//! Field names on the wire follow the `sample_mflix` document schema
//! (lowercase keys, `type` for the record kind).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A movie document. Everything except the title is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Movie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullplot: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated: Option<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<DateTime<Utc>>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub writers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awards: Option<Awards>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastupdated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<Imdb>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tomatoes: Option<Tomatoes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_mflix_comments: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Awards {
    pub wins: i32,
    pub nominations: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imdb {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tomatoes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<Viewer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastupdated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numreviews: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter: Option<i32>,
}

/// One row of the genre aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreCount {
    pub genre: String,
    pub count: i64,
}
