//! Snap TMCs to the nearest intersection and road segment.
//!
//! The road network is read from polyline shapefiles in Web Mercator (EPSG:3857), and each
//! segment of each line is put into an R-tree along with the id of the feature it came from.
//! TMC coordinates are projected from WGS84 before the lookup.
use std::f64::consts::PI;
use std::path::Path;

use log::{debug, info, warn};
use rstar::primitives::{GeomWithData, Line};
use rstar::RTree;
use serde::Serialize;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{Point, Shape};

use crate::tables::TmcRecord;
use crate::TmcError;

/// Radius of the sphere used by Web Mercator, in metres.
const EARTH_RADIUS: f64 = 6_378_137.0;
/// Name of the DBF field holding a feature's id.
const ID_FIELD: &str = "id";

/// Something that can find the id of the feature nearest to a point.
pub trait SpatialIndex {
    fn nearest(&self, point: [f64; 2]) -> Option<String>;
}

type Segment = GeomWithData<Line<[f64; 2]>, usize>;

/// R-tree of line segments, each pointing back to the id of its feature.
pub struct SegmentIndex {
    tree: RTree<Segment>,
    ids: Vec<String>,
    radius: f64,
}

impl SegmentIndex {
    /// Build from features, each an id and the lines (as lists of points) making it up.
    ///
    /// Only features within `radius` of a point are considered nearest to it.
    pub fn from_features<I>(features: I, radius: f64) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Vec<[f64; 2]>>)>,
    {
        let mut ids = vec![];
        let mut segments = vec![];
        for (id, lines) in features {
            let feature = ids.len();
            ids.push(id);
            for line in lines {
                match line.as_slice() {
                    [point] => {
                        segments.push(GeomWithData::new(Line::new(*point, *point), feature))
                    }
                    _ => segments.extend(
                        line.windows(2)
                            .map(|pair| GeomWithData::new(Line::new(pair[0], pair[1]), feature)),
                    ),
                }
            }
        }
        Self {
            tree: RTree::bulk_load(segments),
            ids,
            radius,
        }
    }

    /// Build from the polylines (or points) of a shapefile.
    ///
    /// A feature's id is the value of its `id` field, or its position in the file if it has none.
    pub fn from_shapefile(path: &Path, radius: f64) -> Result<Self, TmcError> {
        let mut reader = shapefile::Reader::from_path(path)?;
        let mut features = vec![];
        for (ordinal, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = result?;
            let lines = shape_lines(shape);
            if lines.is_empty() {
                debug!("Skipping feature {ordinal} of {path:?}, not a line or point");
                continue;
            }
            let id = feature_id(&record).unwrap_or_else(|| ordinal.to_string());
            features.push((id, lines));
        }
        info!("Read {} features from {path:?}", features.len());
        Ok(Self::from_features(features, radius))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl SpatialIndex for SegmentIndex {
    fn nearest(&self, point: [f64; 2]) -> Option<String> {
        let (segment, distance_2) = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .next()?;
        if distance_2 > self.radius * self.radius {
            return None;
        }
        self.ids.get(segment.data).cloned()
    }
}

fn xy(points: &[impl HasXy]) -> Vec<[f64; 2]> {
    points.iter().map(HasXy::xy).collect()
}

trait HasXy {
    fn xy(&self) -> [f64; 2];
}

impl HasXy for Point {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl HasXy for shapefile::PointM {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl HasXy for shapefile::PointZ {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// The lines of a shape, ignoring any Z and M values.
fn shape_lines(shape: Shape) -> Vec<Vec<[f64; 2]>> {
    match shape {
        Shape::Polyline(v) => v.parts().iter().map(|part| xy(part)).collect(),
        Shape::PolylineM(v) => v.parts().iter().map(|part| xy(part)).collect(),
        Shape::PolylineZ(v) => v.parts().iter().map(|part| xy(part)).collect(),
        Shape::Point(v) => vec![vec![v.xy()]],
        Shape::PointM(v) => vec![vec![v.xy()]],
        Shape::PointZ(v) => vec![vec![v.xy()]],
        _ => vec![],
    }
}

fn feature_id(record: &Record) -> Option<String> {
    match record.get(ID_FIELD)? {
        FieldValue::Character(v) => v.as_ref().map(|v| v.trim().to_string()),
        FieldValue::Numeric(v) => v.map(format_number),
        FieldValue::Float(v) => v.map(|v| format_number(f64::from(v))),
        FieldValue::Integer(v) => Some(v.to_string()),
        FieldValue::Double(v) => Some(format_number(*v)),
        _ => None,
    }
}

/// Ids are stored as numbers in some files; don't give them a decimal point.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Project WGS84 latitude and longitude to Web Mercator (EPSG:3857) x and y.
pub fn to_web_mercator(latitude: f64, longitude: f64) -> [f64; 2] {
    let x = EARTH_RADIUS * longitude.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + latitude.to_radians() / 2.0).tan().ln();
    [x, y]
}

/// A TMC with the ids of the intersection and road segment nearest to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnappedTmc {
    #[serde(rename = "File")]
    pub file: String,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    pub near_intersection_id: Option<String>,
    pub near_id: Option<String>,
}

/// Snap every TMC to the nearest intersection and the nearest segment.
///
/// TMCs without coordinates, or with nothing in range, get no ids.
pub fn snap(
    records: &[TmcRecord],
    intersections: &dyn SpatialIndex,
    segments: &dyn SpatialIndex,
) -> Vec<SnappedTmc> {
    let snapped = records
        .iter()
        .map(|record| {
            let (near_intersection_id, near_id) = match record.coordinates() {
                Some((lat, lng)) => {
                    let point = to_web_mercator(lat, lng);
                    (intersections.nearest(point), segments.nearest(point))
                }
                None => (None, None),
            };
            SnappedTmc {
                file: record.file.clone(),
                latitude: record.latitude,
                longitude: record.longitude,
                near_intersection_id,
                near_id,
            }
        })
        .collect::<Vec<_>>();

    let unmatched = snapped
        .iter()
        .filter(|v| v.near_intersection_id.is_none() && v.near_id.is_none())
        .count();
    if unmatched > 0 {
        warn!("{unmatched} of {} TMCs not snapped to anything", snapped.len());
    }
    snapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SegmentIndex {
        SegmentIndex::from_features(
            vec![
                ("a".to_string(), vec![vec![[0.0, 0.0], [100.0, 0.0]]]),
                (
                    "b".to_string(),
                    vec![vec![[0.0, 50.0], [50.0, 50.0], [100.0, 50.0]]],
                ),
                ("c".to_string(), vec![vec![[500.0, 500.0]]]),
            ],
            20.0,
        )
    }

    #[test]
    fn nearest_segment_within_radius() {
        let index = index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.nearest([50.0, 5.0]), Some("a".to_string()));
        assert_eq!(index.nearest([75.0, 45.0]), Some("b".to_string()));
        assert_eq!(index.nearest([510.0, 500.0]), Some("c".to_string()));
    }

    #[test]
    fn nothing_beyond_radius() {
        assert_eq!(index().nearest([50.0, 25.0]), None);
        assert_eq!(index().nearest([300.0, 300.0]), None);
    }

    #[test]
    fn web_mercator_projection() {
        let [x, y] = to_web_mercator(0.0, 0.0);
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
        let [x, y] = to_web_mercator(42.3601, -71.0589);
        assert!((x - -7_910_240.6).abs() < 1.0, "{x}");
        assert!((y - 5_215_074.2).abs() < 1.0, "{y}");
    }

    #[test]
    fn ids_from_numbers_have_no_decimal_point() {
        assert_eq!(format_number(86.0), "86");
        assert_eq!(format_number(86.5), "86.5");
    }
}
