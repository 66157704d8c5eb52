use std::fmt;
use std::str::FromStr;

use geo_types::{Coord, LineString, Point};
use serde::{Deserialize, Serialize};

use crate::error::PipeBurstError;

pub type LineId = u64;

pub const DEFAULT_NOMINAL_PRESSURE: f64 = 4.0;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lng, c.lat)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lng, y: c.lat }
    }
}

/// Converts a route into a `LineString` with x = longitude, y = latitude.
pub fn to_line_string(points: &[Coordinate]) -> LineString<f64> {
    LineString::new(points.iter().map(|&p| p.into()).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipeCategory {
    ProcessFluid,
    Byproduct,
}

impl PipeCategory {
    pub const ALL: [PipeCategory; 2] = [PipeCategory::ProcessFluid, PipeCategory::Byproduct];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessFluid => "process-fluid",
            Self::Byproduct => "byproduct",
        }
    }

    /// Display color used for the line while it carries flow.
    pub fn color(&self) -> &'static str {
        match self {
            Self::ProcessFluid => "#3b82f6",
            Self::Byproduct => "#d946ef",
        }
    }
}

impl fmt::Display for PipeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PipeCategory {
    type Err = PipeBurstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                PipeBurstError::Validation(format!(
                    "unknown pipe category '{}', expected one of: process-fluid, byproduct",
                    s
                ))
            })
    }
}

/// A registered leak, snapped to a vertex of its owning line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstEvent {
    #[serde(alias = "latlng")]
    pub location: Coordinate,
    #[serde(alias = "index")]
    pub vertex_index: usize,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl BurstEvent {
    pub fn new(location: Coordinate, vertex_index: usize) -> Self {
        Self {
            location,
            vertex_index,
            active: true,
        }
    }
}

fn default_pressure() -> f64 {
    DEFAULT_NOMINAL_PRESSURE
}

/// A drawn pipeline route. Only semantic fields live here; map layers are tracked
/// by the render adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineLine {
    pub(crate) id: LineId,
    pub(crate) name: String,
    #[serde(alias = "type")]
    pub(crate) category: PipeCategory,
    #[serde(default = "default_pressure")]
    pub(crate) nominal_pressure: f64,
    pub(crate) points: Vec<Coordinate>,
    #[serde(default)]
    pub(crate) burst: Option<BurstEvent>,
}

impl PipelineLine {
    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> PipeCategory {
        self.category
    }

    pub fn nominal_pressure(&self) -> f64 {
        self.nominal_pressure
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn burst(&self) -> Option<&BurstEvent> {
        self.burst.as_ref()
    }

    /// A stored burst is always active; repairing removes it.
    pub fn is_bursting(&self) -> bool {
        self.burst.is_some()
    }
}

/// Request to create a line. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLine {
    pub name: String,
    pub category: PipeCategory,
    pub nominal_pressure: Option<f64>,
    pub points: Vec<Coordinate>,
}

impl NewLine {
    pub fn new(name: impl Into<String>, category: PipeCategory, points: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            category,
            nominal_pressure: None,
            points,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.nominal_pressure = Some(pressure);
        self
    }
}

/// One dashboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSummary {
    pub id: LineId,
    pub name: String,
    pub category: PipeCategory,
    pub length_meters: f64,
    pub point_count: usize,
    pub nominal_pressure: f64,
    pub bursting: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_to_point() {
        let c = Coordinate::new(-17.64, -40.18);
        let p: Point<f64> = c.into();
        assert_eq!(p.x(), -40.18);
        assert_eq!(p.y(), -17.64);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "Process-Fluid".parse::<PipeCategory>().unwrap(),
            PipeCategory::ProcessFluid
        );
        assert_eq!(
            "byproduct".parse::<PipeCategory>().unwrap(),
            PipeCategory::Byproduct
        );
        assert!("steam".parse::<PipeCategory>().is_err());
    }

    #[test]
    fn test_line_deserializes_legacy_fields() {
        let json = r#"{
            "id": 17,
            "name": "Main",
            "type": "byproduct",
            "points": [{"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 1.0}],
            "burst": null
        }"#;

        let line: PipelineLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.category(), PipeCategory::Byproduct);
        assert_eq!(line.nominal_pressure(), DEFAULT_NOMINAL_PRESSURE);
        assert!(!line.is_bursting());
    }

    #[test]
    fn test_line_serializes_camel_case() {
        let line = PipelineLine {
            id: 1,
            name: "A".into(),
            category: PipeCategory::ProcessFluid,
            nominal_pressure: 4.0,
            points: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)],
            burst: Some(BurstEvent::new(Coordinate::new(0.0, 1.0), 1)),
        };

        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["category"], "process-fluid");
        assert_eq!(value["nominalPressure"], 4.0);
        assert_eq!(value["burst"]["vertexIndex"], 1);
        assert_eq!(value["burst"]["active"], true);
    }
}
