use geojson::{Feature as GeoFeature, FeatureCollection, GeoJson, Geometry as GeoGeometry, Value};
use log::debug;
use serde_json::{Map, Value as JsonValue};

use crate::clock::DisplayClock;
use crate::error::Result;
use crate::features::{Attributes, Coord, Feature, FeatureLayer, Geometry};
use crate::gpx_types::TrackPoint;
use crate::options::ViewerOptions;
use crate::parser::parse_gpx;
use crate::stats::aggregate;

/// Convert an enriched track to a GeoJSON FeatureCollection for the map:
/// one Point per track point carrying its derived values, then the whole
/// track as a LineString when it has at least two points.
pub fn track_to_feature_collection(
    points: &[TrackPoint],
    opts: &ViewerOptions,
    clock: &DisplayClock,
) -> FeatureCollection {
    let mut features: Vec<GeoFeature> = points
        .iter()
        .map(|pt| {
            let geometry = GeoGeometry::new(Value::Point(track_coords(pt, opts.include_elevation)));
            feature(geometry, track_point_props(pt, opts, clock))
        })
        .collect();

    if points.len() > 1 {
        let coords: Vec<Vec<f64>> = points
            .iter()
            .map(|pt| track_coords(pt, opts.include_elevation))
            .collect();
        let mut props = Map::new();
        props.insert("type".to_string(), JsonValue::String("track".to_string()));
        features.push(feature(GeoGeometry::new(Value::LineString(coords)), props));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Parse a GPX document and convert its track in one step.
pub fn gpx_to_feature_collection(gpx: &str, opts: &ViewerOptions) -> Result<FeatureCollection> {
    let clock = DisplayClock::from_options(opts)?;
    let stats = aggregate(&parse_gpx(gpx)?)?;
    Ok(track_to_feature_collection(&stats.points, opts, &clock))
}

fn feature(geometry: GeoGeometry, props: Map<String, JsonValue>) -> GeoFeature {
    GeoFeature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn track_coords(pt: &TrackPoint, include_elevation: bool) -> Vec<f64> {
    if include_elevation {
        vec![pt.lon, pt.lat, pt.elevation]
    } else {
        vec![pt.lon, pt.lat]
    }
}

fn track_point_props(
    pt: &TrackPoint,
    opts: &ViewerOptions,
    clock: &DisplayClock,
) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert("lat".to_string(), number(pt.lat));
    props.insert("lon".to_string(), number(pt.lon));
    props.insert("elevation".to_string(), number(round_to_cents(pt.elevation)));
    if opts.include_time {
        let time = match pt.time {
            Some(t) => JsonValue::String(t.to_rfc3339()),
            None => JsonValue::Null,
        };
        props.insert("time".to_string(), time);
    }
    props.insert(
        "localTime".to_string(),
        JsonValue::String(clock.format_point(pt.time)),
    );
    props.insert("speed".to_string(), number(round_to_cents(pt.speed.0)));
    props
}

fn number(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn round_to_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Read a GeoJSON document (e.g. a WFS GetFeature response) into a feature
/// layer. Multi-geometries are split into one feature per part; property
/// values are kept as strings.
pub fn feature_layer_from_geojson(title: &str, text: &str) -> Result<FeatureLayer> {
    let geojson = text.parse::<GeoJson>()?;
    let mut features = Vec::new();

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for f in fc.features {
                push_feature(&mut features, f);
            }
        }
        GeoJson::Feature(f) => push_feature(&mut features, f),
        GeoJson::Geometry(g) => {
            for geometry in flatten_geometry(g.value) {
                features.push(Feature::new(geometry));
            }
        }
    }

    Ok(FeatureLayer::new(title, features))
}

fn push_feature(out: &mut Vec<Feature>, f: GeoFeature) {
    let Some(geometry) = f.geometry else {
        debug!("skipping GeoJSON feature without geometry");
        return;
    };

    let attributes: Attributes = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, property_text(v)))
        .collect();

    for geometry in flatten_geometry(geometry.value) {
        out.push(Feature {
            geometry,
            attributes: attributes.clone(),
        });
    }
}

fn property_text(v: JsonValue) -> String {
    match v {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn coord(position: &[f64]) -> Option<Coord> {
    match position {
        [lon, lat] => Some(Coord::new(*lon, *lat)),
        [lon, lat, ele, ..] => Some(Coord::with_ele(*lon, *lat, *ele)),
        _ => None,
    }
}

fn coords(positions: &[Vec<f64>]) -> Vec<Coord> {
    positions.iter().filter_map(|p| coord(p)).collect()
}

fn flatten_geometry(value: Value) -> Vec<Geometry> {
    match value {
        Value::Point(p) => coord(&p).map(Geometry::Point).into_iter().collect(),
        Value::MultiPoint(points) => points
            .iter()
            .filter_map(|p| coord(p))
            .map(Geometry::Point)
            .collect(),
        Value::LineString(line) => vec![Geometry::LineString(coords(&line))],
        Value::MultiLineString(lines) => lines
            .iter()
            .map(|line| Geometry::LineString(coords(line)))
            .collect(),
        Value::Polygon(rings) => rings
            .first()
            .map(|outer| Geometry::Polygon(coords(outer)))
            .into_iter()
            .collect(),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|rings| rings.first())
            .map(|outer| Geometry::Polygon(coords(outer)))
            .collect(),
        Value::GeometryCollection(geometries) => geometries
            .into_iter()
            .flat_map(|g| flatten_geometry(g.value))
            .collect(),
    }
}

/// Convert a feature layer back to GeoJSON, e.g. to draw query results.
pub fn feature_layer_to_feature_collection(layer: &FeatureLayer) -> FeatureCollection {
    let features = layer
        .features
        .iter()
        .map(|f| {
            let value = match &f.geometry {
                Geometry::Point(c) => Value::Point(position(c)),
                Geometry::LineString(line) => Value::LineString(line.iter().map(position).collect()),
                Geometry::Polygon(ring) => Value::Polygon(vec![ring.iter().map(position).collect()]),
            };
            let props = f
                .attributes
                .iter()
                .map(|(k, v)| (k.to_string(), JsonValue::String(v.to_string())))
                .collect();
            feature(GeoGeometry::new(value), props)
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn position(c: &Coord) -> Vec<f64> {
    match c.ele {
        Some(ele) => vec![c.lon, c.lat, ele],
        None => vec![c.lon, c.lat],
    }
}
