use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::clock::parse_instant;
use crate::error::{Result, ViewerError};
use crate::gpx_types::*;

/// Parse a GPX XML string into a GpxDocument.
///
/// Every `<trkpt>` of every `<trk>`/`<trkseg>` is collected into one ordered
/// sequence. Routes and waypoints are only counted. A track point without a
/// usable position aborts the whole parse.
pub fn parse_gpx(xml: &str) -> Result<GpxDocument> {
    let mut reader = Reader::from_str(xml);
    let mut doc = GpxDocument::default();
    let mut seen_root = false;
    let mut root_open = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if !seen_root {
                    expect_gpx_root(&e)?;
                    seen_root = true;
                    root_open = true;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"wpt" => {
                        doc.waypoint_count += 1;
                        reader.read_to_end(e.name())?;
                    }
                    b"rte" => {
                        doc.route_count += 1;
                        reader.read_to_end(e.name())?;
                    }
                    b"trk" => parse_track(&mut reader, &mut doc.points)?,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if !seen_root {
                    expect_gpx_root(&e)?;
                    seen_root = true;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"wpt" => doc.waypoint_count += 1,
                    b"rte" => doc.route_count += 1,
                    _ => {}
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"gpx" => root_open = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    if !seen_root {
        return Err(ViewerError::UnsupportedFormat(
            "missing <gpx> root element".to_string(),
        ));
    }
    if root_open {
        return Err(truncated(b"gpx"));
    }

    Ok(doc)
}

fn expect_gpx_root(e: &BytesStart<'_>) -> Result<()> {
    if e.local_name().as_ref() == b"gpx" {
        Ok(())
    } else {
        Err(ViewerError::UnsupportedFormat(format!(
            "expected <gpx> root element, found <{}>",
            String::from_utf8_lossy(e.local_name().as_ref())
        )))
    }
}

/// Parse lat/lon attributes from a `<trkpt>` start tag. `index` is the
/// zero-based position of the point in the document, used in errors.
fn parse_lat_lon(e: &BytesStart<'_>, index: usize) -> Result<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| ViewerError::Xml(e.into()))?;
        let key = attr.key.local_name();
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match key.as_ref() {
            b"lat" => lat = Some(parse_coordinate(val, "lat", 90.0, index)?),
            b"lon" => lon = Some(parse_coordinate(val, "lon", 180.0, index)?),
            _ => {}
        }
    }

    let lat = lat.ok_or_else(|| malformed(index, "missing attribute 'lat'".to_string()))?;
    let lon = lon.ok_or_else(|| malformed(index, "missing attribute 'lon'".to_string()))?;

    Ok((lat, lon))
}

fn parse_coordinate(val: &str, attribute: &str, limit: f64, index: usize) -> Result<f64> {
    let value = val
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed(index, format!("invalid value '{val}' for '{attribute}'")))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(malformed(
            index,
            format!("'{attribute}' out of range: {val}"),
        ));
    }
    Ok(value)
}

/// The document ended while `element` was still open.
pub(crate) fn truncated(element: &[u8]) -> ViewerError {
    ViewerError::Truncated(String::from_utf8_lossy(element).into_owned())
}

fn malformed(index: usize, reason: String) -> ViewerError {
    ViewerError::MalformedTrackPoint { index, reason }
}

/// Parse a `<trkpt>` element and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
    index: usize,
) -> Result<RawPoint> {
    let (lat, lon) = parse_lat_lon(start, index)?;
    let mut point = RawPoint::new(lat, lon);
    let end_name = start.name().0.to_vec(); // own the end tag name for comparison

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    point.ele = match text.trim().parse::<f64>() {
                        Ok(ele) if ele.is_finite() => Some(ele),
                        _ => {
                            warn!("track point #{index}: ignoring elevation '{text}'");
                            None
                        }
                    };
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    point.time = parse_instant(&text);
                }
                _ => {
                    // Skip name/desc/extensions and anything else
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(truncated(&end_name)),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(point)
}

/// Parse a `<trk>` element, appending its points.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>, points: &mut Vec<RawPoint>) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkseg" => parse_segment(reader, points)?,
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => return Err(truncated(b"trk")),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(())
}

/// Parse a `<trkseg>` element, appending its points.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>, points: &mut Vec<RawPoint>) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => {
                    let pt = parse_point(&e, reader, points.len())?;
                    points.push(pt);
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    let (lat, lon) = parse_lat_lon(&e, points.len())?;
                    points.push(RawPoint::new(lat, lon));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => return Err(truncated(b"trkseg")),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(())
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
pub(crate) fn read_text_owned<'a>(
    reader: &mut Reader<&'a [u8]>,
    start: &BytesStart<'_>,
) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(raw);
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(s);
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                    match name {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(truncated(&end_name)),
            Err(e) => return Err(ViewerError::Xml(e)),
            _ => {}
        }
    }

    Ok(text)
}
