use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, ViewerError};
use crate::features::{Attributes, Coord, Feature, FeatureLayer, Geometry};
use crate::parser::{read_text_owned, truncated};

/// Read every `Placemark` of a KML document into a feature layer.
///
/// Each geometry of a `MultiGeometry` becomes its own feature carrying the
/// placemark's attributes. Placemarks without a geometry are dropped.
pub fn parse_kml(title: &str, xml: &str) -> Result<FeatureLayer> {
    let mut reader = Reader::from_str(xml);
    let mut features = Vec::new();
    let mut seen_root = false;
    let mut root_open = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if !seen_root {
                    expect_kml_root(&e)?;
                    seen_root = true;
                    root_open = true;
                    continue;
                }
                if e.local_name().as_ref() == b"Placemark" {
                    features.extend(parse_placemark(&mut reader)?);
                }
            }
            Ok(Event::Empty(e)) if !seen_root => {
                expect_kml_root(&e)?;
                seen_root = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"kml" => root_open = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    if !seen_root {
        return Err(ViewerError::UnsupportedFormat(
            "missing <kml> root element".to_string(),
        ));
    }
    if root_open {
        return Err(truncated(b"kml"));
    }

    Ok(FeatureLayer::new(title, features))
}

fn expect_kml_root(e: &BytesStart<'_>) -> Result<()> {
    if e.local_name().as_ref() == b"kml" {
        Ok(())
    } else {
        Err(ViewerError::UnsupportedFormat(format!(
            "expected <kml> root element, found <{}>",
            String::from_utf8_lossy(e.local_name().as_ref())
        )))
    }
}

fn parse_placemark<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Vec<Feature>> {
    let mut attributes = Attributes::new();
    let mut geometries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => {
                    attributes.insert("name".to_string(), read_text_owned(reader, &e)?);
                }
                b"description" => {
                    let text = read_text_owned(reader, &e)?;
                    attributes.insert("description".to_string(), text.trim().to_string());
                }
                b"ExtendedData" => parse_extended_data(reader, &mut attributes)?,
                b"Point" => {
                    let coords = read_coordinates(reader, b"Point")?;
                    match coords.first() {
                        Some(c) => geometries.push(Geometry::Point(*c)),
                        None => debug!("skipping <Point> without coordinates"),
                    }
                }
                b"LineString" => {
                    geometries.push(Geometry::LineString(read_coordinates(reader, b"LineString")?));
                }
                b"Polygon" => geometries.push(Geometry::Polygon(read_outer_ring(reader)?)),
                // children are picked up by this loop
                b"MultiGeometry" => {}
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Placemark" => break,
            Ok(Event::Eof) => return Err(truncated(b"Placemark")),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    if geometries.is_empty() {
        debug!("skipping placemark without geometry");
    }

    Ok(geometries
        .into_iter()
        .map(|geometry| Feature {
            geometry,
            attributes: attributes.clone(),
        })
        .collect())
}

/// `Data/value` pairs and `SchemaData/SimpleData` values.
fn parse_extended_data<'a>(
    reader: &mut Reader<&'a [u8]>,
    attributes: &mut Attributes,
) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Data" => {
                    let name = attribute_value(&e, b"name");
                    let value = read_data_value(reader)?;
                    if let Some(name) = name {
                        attributes.insert(name, value);
                    }
                }
                b"SimpleData" => {
                    let name = attribute_value(&e, b"name");
                    let value = read_text_owned(reader, &e)?;
                    if let Some(name) = name {
                        attributes.insert(name, value);
                    }
                }
                b"SchemaData" => {}
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"ExtendedData" => break,
            Ok(Event::Eof) => return Err(truncated(b"ExtendedData")),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(())
}

fn read_data_value<'a>(reader: &mut Reader<&'a [u8]>) -> Result<String> {
    let mut value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"value" => value = read_text_owned(reader, &e)?,
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Data" => break,
            Ok(Event::Eof) => return Err(truncated(b"Data")),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(value)
}

fn attribute_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Collect the `<coordinates>` found before the closing `end` tag.
fn read_coordinates<'a>(reader: &mut Reader<&'a [u8]>, end: &[u8]) -> Result<Vec<Coord>> {
    let mut coords = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"coordinates" => {
                    let text = read_text_owned(reader, &e)?;
                    coords.extend(parse_coordinates(&text)?);
                }
                b"LinearRing" => {}
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == end => break,
            Ok(Event::Eof) => return Err(truncated(end)),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(coords)
}

/// Outer ring of a `<Polygon>`; holes are skipped.
fn read_outer_ring<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Vec<Coord>> {
    let mut ring = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"outerBoundaryIs" => ring = read_coordinates(reader, b"outerBoundaryIs")?,
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Polygon" => break,
            Ok(Event::Eof) => return Err(truncated(b"Polygon")),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(ring)
}

/// Parse whitespace-separated `lon,lat[,alt]` tuples.
pub fn parse_coordinates(text: &str) -> Result<Vec<Coord>> {
    text.split_whitespace()
        .map(|tuple| {
            let parts = tuple
                .split(',')
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| ViewerError::MalformedCoordinates(tuple.to_string()))?;
            match parts.as_slice() {
                [lon, lat] => Ok(Coord::new(*lon, *lat)),
                [lon, lat, alt] => Ok(Coord::with_ele(*lon, *lat, *alt)),
                _ => Err(ViewerError::MalformedCoordinates(tuple.to_string())),
            }
        })
        .collect()
}
