use geo::{BoundingRect, Distance, Haversine};
use geo_types::Point;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry as GeoJsonGeometry, JsonObject, Value as GeoJsonValue};
use serde::Serialize;

use crate::error::PipeBurstError;
use crate::store::{Coordinate, PipelineLine, to_line_string};

// =============================================================================
// Distance and length
// =============================================================================

/// Great-circle distance in meters between two coordinates, using the
/// haversine formula on a spherical earth.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b))
}

/// Sum of consecutive pairwise distances along a route. Returns 0 for fewer
/// than two points.
pub fn total_length(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|pair| distance(pair[0], pair[1])).sum()
}

/// Axis-aligned extent of a route in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Bounding box of a route, `None` when it has no points.
pub fn bounds(points: &[Coordinate]) -> Option<Bounds> {
    let rect = to_line_string(points).bounding_rect()?;
    Some(Bounds {
        south: rect.min().y,
        west: rect.min().x,
        north: rect.max().y,
        east: rect.max().x,
    })
}

// =============================================================================
// ToGeoJson Trait - Export lines as GeoJSON
// =============================================================================

/// Trait for converting pipeline data to GeoJSON.
pub trait ToGeoJson {
    fn to_geojson(&self) -> Feature;
}

impl ToGeoJson for PipelineLine {
    fn to_geojson(&self) -> Feature {
        let coords: Vec<Vec<f64>> = self.points().iter().map(|c| vec![c.lng, c.lat]).collect();

        let mut properties = JsonObject::new();
        properties.insert("id".into(), self.id().into());
        properties.insert("name".into(), self.name().into());
        properties.insert("category".into(), self.category().as_str().into());
        properties.insert("nominalPressure".into(), self.nominal_pressure().into());
        properties.insert("lengthMeters".into(), total_length(self.points()).into());
        properties.insert("bursting".into(), self.is_bursting().into());
        if let Some(burst) = self.burst() {
            properties.insert("burstVertexIndex".into(), burst.vertex_index.into());
        }

        Feature {
            geometry: Some(GeoJsonGeometry::new(GeoJsonValue::LineString(coords))),
            id: Some(Id::Number(self.id().into())),
            properties: Some(properties),
            ..Default::default()
        }
    }
}

/// Collects every line into one exportable FeatureCollection.
pub fn lines_to_feature_collection<'a>(
    lines: impl IntoIterator<Item = &'a PipelineLine>,
) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: lines.into_iter().map(ToGeoJson::to_geojson).collect(),
        foreign_members: None,
    }
}

// =============================================================================
// FromGeoJson Trait - Import routes from GeoJSON
// =============================================================================

/// Trait for parsing GeoJSON geometries into route points.
pub trait FromGeoJson: Sized {
    fn from_geojson(geometry: &GeoJsonGeometry) -> Result<Self, PipeBurstError>;
}

impl FromGeoJson for Vec<Coordinate> {
    fn from_geojson(geometry: &GeoJsonGeometry) -> Result<Self, PipeBurstError> {
        match &geometry.value {
            GeoJsonValue::LineString(coords) => Ok(positions_to_route(coords)),
            GeoJsonValue::MultiLineString(lines) => {
                // Parts are joined end to end into one route
                Ok(lines.iter().flat_map(|line| positions_to_route(line)).collect())
            }
            other => Err(PipeBurstError::Geometry(format!(
                "Expected LineString or MultiLineString, got {:?}",
                other
            ))),
        }
    }
}

/// Converts GeoJSON positions (lng, lat) to coordinates, dropping short positions.
fn positions_to_route(coords: &[Vec<f64>]) -> Vec<Coordinate> {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Coordinate::new(c[1], c[0]))
        .collect()
}

/// Reads the first usable route out of a GeoJSON document: a bare geometry, a
/// feature, or the first feature of a collection that has a line geometry.
pub fn route_from_geojson_str(text: &str) -> Result<Vec<Coordinate>, PipeBurstError> {
    let document: geojson::GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| PipeBurstError::Geometry(e.to_string()))?;

    let geometry = match &document {
        geojson::GeoJson::Geometry(g) => Some(g),
        geojson::GeoJson::Feature(f) => f.geometry.as_ref(),
        geojson::GeoJson::FeatureCollection(fc) => fc
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .find(|g| {
                matches!(
                    g.value,
                    GeoJsonValue::LineString(_) | GeoJsonValue::MultiLineString(_)
                )
            }),
    }
    .ok_or_else(|| PipeBurstError::Geometry("Document has no line geometry".to_string()))?;

    Vec::<Coordinate>::from_geojson(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BurstEvent, PipeCategory};
    use proptest::prelude::*;

    fn sample_line() -> PipelineLine {
        PipelineLine {
            id: 42,
            name: "Vinasse main".into(),
            category: PipeCategory::Byproduct,
            nominal_pressure: 4.0,
            points: vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(0.0, 2.0),
            ],
            burst: Some(BurstEvent::new(Coordinate::new(0.0, 1.0), 1)),
        }
    }

    #[test]
    fn test_distance_one_degree_at_equator() {
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        // One degree of longitude on the equator is ~111.2 km
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_zero_for_same_point() {
        let c = Coordinate::new(-17.6435, -40.1824);
        assert_eq!(distance(c, c), 0.0);
    }

    #[test]
    fn test_total_length_short_routes() {
        assert_eq!(total_length(&[]), 0.0);
        assert_eq!(total_length(&[Coordinate::new(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_bounds() {
        let b = bounds(&[
            Coordinate::new(-17.64, -40.18),
            Coordinate::new(-17.60, -40.20),
            Coordinate::new(-17.62, -40.10),
        ])
        .unwrap();
        assert_eq!(b.south, -17.64);
        assert_eq!(b.north, -17.60);
        assert_eq!(b.west, -40.20);
        assert_eq!(b.east, -40.10);
        assert!(bounds(&[]).is_none());
    }

    #[test]
    fn test_line_to_geojson() {
        let feature = sample_line().to_geojson();

        match feature.geometry.as_ref().map(|g| &g.value) {
            Some(GeoJsonValue::LineString(coords)) => {
                assert_eq!(coords.len(), 3);
                assert_eq!(coords[1], vec![1.0, 0.0]);
            }
            other => panic!("Expected LineString, got {:?}", other),
        }
        let props = feature.properties.unwrap();
        assert_eq!(props["name"], "Vinasse main");
        assert_eq!(props["category"], "byproduct");
        assert_eq!(props["bursting"], true);
        assert_eq!(props["burstVertexIndex"], 1);
    }

    #[test]
    fn test_route_from_linestring() {
        let geom = GeoJsonGeometry::new(GeoJsonValue::LineString(vec![
            vec![-40.18, -17.64],
            vec![-40.19, -17.65],
        ]));

        let route = Vec::<Coordinate>::from_geojson(&geom).unwrap();
        assert_eq!(route, vec![Coordinate::new(-17.64, -40.18), Coordinate::new(-17.65, -40.19)]);
    }

    #[test]
    fn test_route_from_multilinestring() {
        let geom = GeoJsonGeometry::new(GeoJsonValue::MultiLineString(vec![
            vec![vec![0.0, 0.0], vec![1.0, 1.0]],
            vec![vec![2.0, 2.0], vec![3.0, 3.0]],
        ]));

        let route = Vec::<Coordinate>::from_geojson(&geom).unwrap();
        assert_eq!(route.len(), 4);
    }

    #[test]
    fn test_rejects_point_geometry() {
        let geom = GeoJsonGeometry::new(GeoJsonValue::Point(vec![0.0, 0.0]));
        assert!(Vec::<Coordinate>::from_geojson(&geom).is_err());
    }

    #[test]
    fn test_export_then_import_route() {
        let line = sample_line();
        let collection = lines_to_feature_collection([&line]);
        let text = serde_json::to_string(&collection).unwrap();

        let route = route_from_geojson_str(&text).unwrap();
        assert_eq!(route, line.points);
    }

    proptest! {
        #[test]
        fn prop_total_length_is_sum_of_pairs(
            raw in prop::collection::vec((-80.0f64..80.0, -179.0f64..179.0), 0..12)
        ) {
            let points: Vec<Coordinate> =
                raw.iter().map(|&(lat, lng)| Coordinate::new(lat, lng)).collect();

            let mut expected = 0.0;
            for i in 1..points.len() {
                expected += distance(points[i - 1], points[i]);
            }

            let total = total_length(&points);
            prop_assert!((total - expected).abs() <= 1e-6 * expected.max(1.0));
            if points.len() <= 1 {
                prop_assert_eq!(total, 0.0);
            }
        }
    }
}
