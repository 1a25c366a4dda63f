//! Proximity clauses.

use bson::{Document, doc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityShape;
use crate::error::{SearchError, SearchResult};

use super::config::resolve_path;
use super::score::Score;

/// A longitude/latitude point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Degrees east, -180 to 180.
    pub longitude: f64,
    /// Degrees north, -90 to 90.
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a point.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Renders the point as a GeoJSON `Point`.
    pub fn to_geojson(&self) -> Document {
        doc! { "type": "Point", "coordinates": [self.longitude, self.latitude] }
    }
}

/// A relevance booster that decays with distance from an origin.
///
/// At `pivot` distance from the origin a document scores half of what a
/// document exactly at the origin scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NearField {
    /// Distance in time.
    Date {
        /// Logical field name.
        field: String,
        /// Reference instant.
        origin: DateTime<Utc>,
        /// Half-decay distance in milliseconds.
        pivot_ms: i64,
        /// Optional score modifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<Score>,
    },

    /// Distance on a number line.
    Numeric {
        /// Logical field name.
        field: String,
        /// Reference value.
        origin: f64,
        /// Half-decay distance.
        pivot: f64,
        /// Optional score modifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<Score>,
    },

    /// Distance on the globe.
    Geo {
        /// Logical field name.
        field: String,
        /// Reference point.
        origin: GeoPoint,
        /// Half-decay distance in metres.
        pivot_meters: f64,
        /// Optional score modifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<Score>,
    },
}

impl NearField {
    /// Logical field the clause targets.
    pub fn field(&self) -> &str {
        match self {
            NearField::Date { field, .. }
            | NearField::Numeric { field, .. }
            | NearField::Geo { field, .. } => field,
        }
    }

    /// Score modifier, if any.
    pub fn score(&self) -> Option<&Score> {
        match self {
            NearField::Date { score, .. }
            | NearField::Numeric { score, .. }
            | NearField::Geo { score, .. } => score.as_ref(),
        }
    }

    /// Checks the field reference, pivot and origin.
    pub fn validate(&self, shape: &EntityShape) -> SearchResult<()> {
        resolve_path(shape, self.field())?;

        let pivot_ok = match self {
            NearField::Date { pivot_ms, .. } => *pivot_ms > 0,
            NearField::Numeric { origin, pivot, .. } => {
                origin.is_finite() && pivot.is_finite() && *pivot > 0.0
            }
            NearField::Geo {
                origin,
                pivot_meters,
                ..
            } => {
                if !(-180.0..=180.0).contains(&origin.longitude)
                    || !(-90.0..=90.0).contains(&origin.latitude)
                {
                    return Err(SearchError::InvalidConfiguration {
                        message: format!(
                            "near origin for '{}' is not a valid longitude/latitude",
                            self.field()
                        ),
                    });
                }
                pivot_meters.is_finite() && *pivot_meters > 0.0
            }
        };

        if !pivot_ok {
            return Err(SearchError::InvalidConfiguration {
                message: format!("near pivot for '{}' must be positive", self.field()),
            });
        }

        match self.score() {
            Some(score) => score.validate(shape),
            None => Ok(()),
        }
    }

    /// Renders the `near` clause.
    pub fn to_document(&self, shape: &EntityShape) -> SearchResult<Document> {
        let path = resolve_path(shape, self.field())?;

        let mut near = match self {
            NearField::Date {
                origin, pivot_ms, ..
            } => doc! {
                "path": path,
                "origin": bson::DateTime::from_chrono(*origin),
                "pivot": *pivot_ms,
            },
            NearField::Numeric { origin, pivot, .. } => doc! {
                "path": path,
                "origin": *origin,
                "pivot": *pivot,
            },
            NearField::Geo {
                origin,
                pivot_meters,
                ..
            } => doc! {
                "path": path,
                "origin": origin.to_geojson(),
                "pivot": *pivot_meters,
            },
        };

        if let Some(score) = self.score() {
            near.insert("score", score.to_document(shape)?);
        }

        Ok(doc! { "near": near })
    }
}
