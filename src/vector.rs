//! In-memory vector layers and their shapefile output.
//!
//! Hydrology results come out as GeoJSON feature collections. A
//! [`VectorLayer`] fixes their attribute schema (field names, kinds and
//! order) so the copy into a shapefile keeps it exactly.
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use geojson::{FeatureCollection, Value};
use serde_json::Value as JsonValue;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing, Polyline};
use tracing::debug;

use crate::error::{Error, Result};

/// Geometry type shared by every feature of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::LineString => "line",
            GeometryKind::Polygon => "polygon",
        }
    }

    /// ESRI shape type code written in the file headers.
    fn shape_type(self) -> i32 {
        match self {
            GeometryKind::Point => 1,
            GeometryKind::LineString => 3,
            GeometryKind::Polygon => 5,
        }
    }
}

/// Offset of the shape type in the `.shp` and `.shx` headers.
const HEADER_SHAPE_TYPE: u64 = 32;

/// Overwrites the header shape type of `path` and its `.shx` index.
fn set_shape_type(path: &Path, kind: GeometryKind) -> Result<()> {
    for file in [path.to_path_buf(), path.with_extension("shx")] {
        let mut f = OpenOptions::new().write(true).open(&file)?;
        f.seek(SeekFrom::Start(HEADER_SHAPE_TYPE))?;
        f.write_all(&kind.shape_type().to_le_bytes())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    Logical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// One feature: a geometry and one attribute per layer field, in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFeature {
    pub geometry: Value,
    pub attributes: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub name: String,
    pub geometry: GeometryKind,
    pub fields: Vec<FieldDef>,
    pub features: Vec<LayerFeature>,
}

fn kind_of(value: &JsonValue) -> Option<FieldKind> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(FieldKind::Logical),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(FieldKind::Integer),
        JsonValue::Number(_) => Some(FieldKind::Real),
        _ => Some(FieldKind::Text),
    }
}

fn promote(current: Option<FieldKind>, seen: Option<FieldKind>) -> Option<FieldKind> {
    match (current, seen) {
        (None, k) | (k, None) => k,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(FieldKind::Integer), Some(FieldKind::Real)) | (Some(FieldKind::Real), Some(FieldKind::Integer)) => {
            Some(FieldKind::Real)
        }
        _ => Some(FieldKind::Text),
    }
}

impl VectorLayer {
    /// Builds a layer from a feature collection.
    ///
    /// Fields are the union of the features' property keys in the order they
    /// are first seen. A field is Integer or Real if every non-null value is
    /// a number (Real as soon as one is fractional), Logical if every
    /// non-null value is a boolean, and Text otherwise, including when all
    /// values are null. Features without a geometry are skipped.
    pub fn from_feature_collection(name: &str, geometry: GeometryKind, fc: &FeatureCollection) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut kinds: Vec<Option<FieldKind>> = Vec::new();
        for feature in &fc.features {
            let Some(properties) = &feature.properties else {
                continue;
            };
            for (key, value) in properties {
                let i = match names.iter().position(|n| n == key) {
                    Some(i) => i,
                    None => {
                        names.push(key.clone());
                        kinds.push(None);
                        names.len() - 1
                    }
                };
                kinds[i] = promote(kinds[i], kind_of(value));
            }
        }
        let fields: Vec<FieldDef> = names
            .into_iter()
            .zip(kinds)
            .map(|(name, kind)| FieldDef {
                name,
                kind: kind.unwrap_or(FieldKind::Text),
            })
            .collect();

        let features = fc
            .features
            .iter()
            .filter_map(|feature| {
                let geometry = feature.geometry.as_ref()?.value.clone();
                let attributes = fields
                    .iter()
                    .map(|field| {
                        feature
                            .properties
                            .as_ref()
                            .and_then(|p| p.get(&field.name))
                            .cloned()
                            .unwrap_or(JsonValue::Null)
                    })
                    .collect();
                Some(LayerFeature { geometry, attributes })
            })
            .collect();

        Self {
            name: name.to_string(),
            geometry,
            fields,
            features,
        }
    }

    /// Writes the layer to `path` (plus its `.shx` and `.dbf`), replacing any
    /// existing files, and returns the number of features written.
    ///
    /// Field definitions are created in layer order. Reals keep 15 decimals
    /// so they read back unchanged. An empty layer still produces a valid,
    /// zero-feature shapefile of the layer's geometry type.
    pub fn write_shapefile(&self, path: &Path) -> Result<usize> {
        let mut table = TableWriterBuilder::new();
        for field in &self.fields {
            let name = FieldName::try_from(field.name.as_str()).map_err(|e| Error::FieldName {
                name: field.name.clone(),
                reason: format!("{e:?}"),
            })?;
            table = match field.kind {
                FieldKind::Integer => table.add_numeric_field(name, 18, 0),
                FieldKind::Real => table.add_numeric_field(name, 24, 15),
                FieldKind::Text => table.add_character_field(name, 254),
                FieldKind::Logical => table.add_logical_field(name),
            };
        }

        let mut writer = shapefile::Writer::from_path(path, table)?;
        for (index, feature) in self.features.iter().enumerate() {
            let record = self.record(feature);
            match self.geometry {
                GeometryKind::Point => {
                    let point = self.point(index, &feature.geometry)?;
                    writer.write_shape_and_record(&point, &record)?;
                }
                GeometryKind::LineString => {
                    let line = self.polyline(index, &feature.geometry)?;
                    writer.write_shape_and_record(&line, &record)?;
                }
                GeometryKind::Polygon => {
                    let polygon = self.polygon(index, &feature.geometry)?;
                    writer.write_shape_and_record(&polygon, &record)?;
                }
            }
        }
        // the writer takes the header type from the first shape, so an empty
        // layer would otherwise be left as a null shapefile
        drop(writer);
        set_shape_type(path, self.geometry)?;
        debug!("wrote {} features to {}", self.features.len(), path.display());
        Ok(self.features.len())
    }

    fn record(&self, feature: &LayerFeature) -> Record {
        let mut record = Record::default();
        for (field, value) in self.fields.iter().zip(&feature.attributes) {
            let value = match field.kind {
                FieldKind::Integer | FieldKind::Real => FieldValue::Numeric(value.as_f64()),
                FieldKind::Logical => FieldValue::Logical(value.as_bool()),
                FieldKind::Text => FieldValue::Character(match value {
                    JsonValue::Null => None,
                    JsonValue::String(s) => Some(truncate(s, 254)),
                    other => Some(truncate(&other.to_string(), 254)),
                }),
            };
            record.insert(field.name.clone(), value);
        }
        record
    }

    fn mismatch(&self, index: usize) -> Error {
        Error::GeometryMismatch {
            layer: self.name.clone(),
            index,
            expected: self.geometry.name(),
        }
    }

    fn degenerate(&self, index: usize) -> Error {
        Error::DegenerateGeometry {
            layer: self.name.clone(),
            index,
        }
    }

    fn point(&self, index: usize, geometry: &Value) -> Result<Point> {
        match geometry {
            Value::Point(p) if p.len() >= 2 => Ok(Point::new(p[0], p[1])),
            Value::Point(_) => Err(self.degenerate(index)),
            _ => Err(self.mismatch(index)),
        }
    }

    fn polyline(&self, index: usize, geometry: &Value) -> Result<Polyline> {
        let parts: Vec<Vec<Point>> = match geometry {
            Value::LineString(line) => vec![points(line)],
            Value::MultiLineString(lines) => lines.iter().map(|l| points(l)).collect(),
            _ => return Err(self.mismatch(index)),
        };
        if parts.is_empty() || parts.iter().any(|p| p.len() < 2) {
            return Err(self.degenerate(index));
        }
        Ok(Polyline::with_parts(parts))
    }

    fn polygon(&self, index: usize, geometry: &Value) -> Result<Polygon> {
        let polygons: Vec<&Vec<Vec<Vec<f64>>>> = match geometry {
            Value::Polygon(rings) => vec![rings],
            Value::MultiPolygon(polygons) => polygons.iter().collect(),
            _ => return Err(self.mismatch(index)),
        };
        let mut rings = Vec::new();
        for polygon in polygons {
            for (i, ring) in polygon.iter().enumerate() {
                let ring = points(ring);
                // a closed ring needs three distinct vertices plus the repeat
                if ring.len() < 4 {
                    return Err(self.degenerate(index));
                }
                rings.push(if i == 0 {
                    PolygonRing::Outer(ring)
                } else {
                    PolygonRing::Inner(ring)
                });
            }
        }
        if rings.is_empty() {
            return Err(self.degenerate(index));
        }
        Ok(Polygon::with_rings(rings))
    }
}

fn points(positions: &[Vec<f64>]) -> Vec<Point> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Point::new(p[0], p[1]))
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
