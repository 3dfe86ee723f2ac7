use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::clock::DisplayClock;
use crate::error::{Result, ViewerError};
use crate::features::{Coord, Feature, FeatureLayer, Geometry};
use crate::gpx_types::TrackPoint;
use crate::units::round2;

pub const KML_MIME_TYPE: &str = "application/vnd.google-earth.kml+xml";
pub const KML_EXTENSION: &str = ".kml";
const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Streams a `kml > Document > Folder > Placemark` document.
struct KmlWriter {
    writer: Writer<Vec<u8>>,
}

impl KmlWriter {
    fn new() -> Result<Self> {
        let mut kml = Self {
            writer: Writer::new(Vec::new()),
        };
        kml.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut root = BytesStart::new("kml");
        root.push_attribute(("xmlns", KML_NAMESPACE));
        kml.emit(Event::Start(root))?;
        kml.start("Document")?;
        Ok(kml)
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| ViewerError::Write(e.to_string()))
    }

    fn start(&mut self, tag: &str) -> Result<()> {
        self.emit(Event::Start(BytesStart::new(tag)))
    }

    fn end(&mut self, tag: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(tag)))
    }

    fn text_element(&mut self, tag: &str, text: &str) -> Result<()> {
        self.start(tag)?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.end(tag)
    }

    fn open_folder(&mut self, name: &str) -> Result<()> {
        self.start("Folder")?;
        self.text_element("name", name)
    }

    fn close_folder(&mut self) -> Result<()> {
        self.end("Folder")
    }

    fn placemark(&mut self, description: &str, geometry: &Geometry) -> Result<()> {
        self.start("Placemark")?;
        self.start("description")?;
        for section in cdata_sections(description) {
            self.emit(Event::CData(BytesCData::new(section)))?;
        }
        self.end("description")?;
        match geometry {
            Geometry::Point(c) => {
                self.start("Point")?;
                self.text_element("coordinates", &format_coords(std::slice::from_ref(c)))?;
                self.end("Point")?;
            }
            Geometry::LineString(coords) => {
                self.start("LineString")?;
                self.text_element("coordinates", &format_coords(coords))?;
                self.end("LineString")?;
            }
            Geometry::Polygon(ring) => {
                self.start("Polygon")?;
                self.start("outerBoundaryIs")?;
                self.start("LinearRing")?;
                self.text_element("coordinates", &format_coords(ring))?;
                self.end("LinearRing")?;
                self.end("outerBoundaryIs")?;
                self.end("Polygon")?;
            }
        }
        self.end("Placemark")
    }

    fn finish(mut self) -> Result<String> {
        self.end("Document")?;
        self.end("kml")?;
        String::from_utf8(self.writer.into_inner()).map_err(|e| ViewerError::Write(e.to_string()))
    }
}

/// Split text into CDATA sections that never contain `]]>`. The terminator
/// is broken between `]]` and `>`; readers join adjacent sections back.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(i) = rest.find("]]>") {
        sections.push(&rest[..i + 2]);
        rest = &rest[i + 2..];
    }
    sections.push(rest);
    sections
}

/// `lon,lat,ele` tuples separated by spaces; missing elevation is written as 0.
fn format_coords(coords: &[Coord]) -> String {
    coords
        .iter()
        .map(|c| format!("{},{},{}", c.lon, c.lat, c.ele.unwrap_or(0.0)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn point_description(pt: &TrackPoint, clock: &DisplayClock) -> String {
    let time = pt
        .time
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "N/A".to_string());
    [
        format!("lat: {}", pt.lat),
        format!("lon: {}", pt.lon),
        format!("elevation: {}", round2(pt.elevation)),
        format!("time: {time}"),
        format!("localTime: {}", clock.format_point(pt.time)),
        format!("speed: {}", pt.speed),
    ]
    .join("<br>")
}

/// `key: value` pairs joined by `<br>`; empty values read `N/A`.
fn attribute_description(feature: &Feature) -> String {
    feature
        .attributes
        .iter()
        .map(|(k, v)| {
            let v = if v.is_empty() { "N/A" } else { v };
            format!("{k}: {v}")
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Export one track: a `Track Summary` folder holding the summary and the
/// whole line, and a `Track Points` folder with one placemark per point.
pub fn export_track(
    title: &str,
    points: &[TrackPoint],
    summary_text: &str,
    clock: &DisplayClock,
) -> Result<String> {
    if points.is_empty() {
        return Err(ViewerError::NoExportableData(title.to_string()));
    }

    let line: Vec<Coord> = points
        .iter()
        .map(|p| Coord::with_ele(p.lon, p.lat, p.elevation))
        .collect();

    let mut kml = KmlWriter::new()?;
    kml.open_folder("Track Summary")?;
    kml.placemark(&summary_text.replace('\n', "<br>"), &Geometry::LineString(line.clone()))?;
    kml.close_folder()?;

    kml.open_folder("Track Points")?;
    for (pt, coord) in points.iter().zip(line) {
        kml.placemark(&point_description(pt, clock), &Geometry::Point(coord))?;
    }
    kml.close_folder()?;
    kml.finish()
}

/// Export a feature layer as one folder named after the layer.
pub fn export_features(layer: &FeatureLayer) -> Result<String> {
    if layer.is_empty() {
        return Err(ViewerError::NoExportableData(layer.title.clone()));
    }

    let mut kml = KmlWriter::new()?;
    kml.open_folder(&layer.title)?;
    for feature in &layer.features {
        kml.placemark(&attribute_description(feature), &feature.geometry)?;
    }
    kml.close_folder()?;
    kml.finish()
}

/// Turn a user-supplied name into a `.kml` file name. Characters that are
/// not allowed in file names become `_`; a blank name falls back to the
/// layer title.
pub fn export_file_name(requested: &str, layer_title: &str) -> String {
    let sanitize = |s: &str| -> String {
        s.trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect()
    };

    let mut name = sanitize(requested);
    if name.is_empty() {
        name = sanitize(layer_title);
    }
    if name.is_empty() {
        name = "export".to_string();
    }
    name.push_str(KML_EXTENSION);
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::parse_kml;
    use crate::units::KilometersPerHour;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn clock() -> DisplayClock {
        DisplayClock::new(FixedOffset::east_opt(330 * 60).unwrap(), "IST")
    }

    fn points() -> Vec<TrackPoint> {
        vec![
            TrackPoint {
                lat: 23.766398,
                lon: 78.776032,
                elevation: 412.5,
                time: Some(Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap()),
                speed: KilometersPerHour(0.0),
            },
            TrackPoint {
                lat: 23.7671,
                lon: 78.7772,
                elevation: 0.0,
                time: None,
                speed: KilometersPerHour(12.346),
            },
        ]
    }

    #[test]
    fn test_track_document_structure() {
        let kml = export_track("Run", &points(), "Run:\nTracks: 1", &clock()).unwrap();
        assert!(kml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><kml xmlns="http://www.opengis.net/kml/2.2"><Document>"#));
        assert!(kml.ends_with("</Document></kml>"));
        assert!(kml.contains("<Folder><name>Track Summary</name>"));
        assert!(kml.contains("<Folder><name>Track Points</name>"));
        assert!(kml.contains("<![CDATA[Run:<br>Tracks: 1]]>"));
        assert!(kml.contains(
            "<LineString><coordinates>78.776032,23.766398,412.5 78.7772,23.7671,0</coordinates></LineString>"
        ));
        assert!(kml.contains("<Point><coordinates>78.7772,23.7671,0</coordinates></Point>"));
    }

    #[test]
    fn test_point_description() {
        let kml = export_track("Run", &points(), "s", &clock()).unwrap();
        assert!(kml.contains(
            "lat: 23.766398<br>lon: 78.776032<br>elevation: 412.50<br>time: 2025-01-01T06:00:00+00:00<br>localTime: 01 Jan 2025 11:30:00<br>speed: 0.00"
        ));
        assert!(kml.contains("time: N/A<br>localTime: N/A<br>speed: 12.35"));
    }

    #[test]
    fn test_track_round_trip() {
        let pts = points();
        let kml = export_track("Run", &pts, "summary", &clock()).unwrap();
        let layer = parse_kml("Run", &kml).unwrap();

        // summary line followed by one placemark per point
        assert_eq!(layer.features.len(), pts.len() + 1);
        match &layer.features[0].geometry {
            Geometry::LineString(coords) => {
                for (c, p) in coords.iter().zip(&pts) {
                    assert!((c.lon - p.lon).abs() < 1e-9);
                    assert!((c.lat - p.lat).abs() < 1e-9);
                    assert!((c.ele.unwrap() - p.elevation).abs() < 1e-9);
                }
            }
            other => panic!("Expected LineString, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_track_not_exportable() {
        assert!(matches!(
            export_track("Run", &[], "s", &clock()),
            Err(ViewerError::NoExportableData(t)) if t == "Run"
        ));
    }

    #[test]
    fn test_feature_layer_export() {
        let layer = FeatureLayer::new(
            "Districts",
            vec![
                Feature::new(Geometry::Polygon(vec![
                    Coord::new(0.0, 0.0),
                    Coord::new(1.0, 0.0),
                    Coord::new(1.0, 1.0),
                    Coord::new(0.0, 0.0),
                ]))
                .with_attribute("name", "North")
                .with_attribute("code", ""),
                Feature::new(Geometry::Point(Coord::new(77.4, 23.26))).with_attribute("name", "Bhopal"),
            ],
        );
        let kml = export_features(&layer).unwrap();
        assert!(kml.contains("<Folder><name>Districts</name>"));
        assert!(kml.contains("<![CDATA[name: North<br>code: N/A]]>"));
        assert!(kml.contains(
            "<Polygon><outerBoundaryIs><LinearRing><coordinates>0,0,0 1,0,0 1,1,0 0,0,0</coordinates></LinearRing></outerBoundaryIs></Polygon>"
        ));
        assert!(kml.contains("<Point><coordinates>77.4,23.26,0</coordinates></Point>"));
    }

    #[test]
    fn test_empty_feature_layer_not_exportable() {
        let layer = FeatureLayer::new("Nothing", Vec::new());
        assert!(matches!(
            export_features(&layer),
            Err(ViewerError::NoExportableData(_))
        ));
    }

    #[test]
    fn test_escaping_in_names_and_descriptions() {
        let layer = FeatureLayer::new(
            "A & B",
            vec![Feature::new(Geometry::Point(Coord::new(1.0, 2.0))).with_attribute("note", "x ]]> y")],
        );
        let kml = export_features(&layer).unwrap();
        assert!(kml.contains("<name>A &amp; B</name>"));
        assert!(kml.contains("<![CDATA[note: x ]]]]><![CDATA[> y]]>"));

        let back = parse_kml("A & B", &kml).unwrap();
        assert_eq!(back.features[0].attribute("description"), Some("note: x ]]> y"));
    }

    #[test]
    fn test_cdata_sections() {
        assert_eq!(cdata_sections("plain"), vec!["plain"]);
        assert_eq!(cdata_sections("a]]>b]]>"), vec!["a]]", ">b]]", ">"]);
    }

    #[test]
    fn test_attributes_exported_in_source_order() {
        let layer = FeatureLayer::new(
            "Districts",
            vec![
                Feature::new(Geometry::Point(Coord::new(77.4, 23.26)))
                    .with_attribute("state", "MP")
                    .with_attribute("district", "Bhopal"),
            ],
        );
        let kml = export_features(&layer).unwrap();
        assert!(kml.contains("<![CDATA[state: MP<br>district: Bhopal]]>"));
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("  my track ", "Run"), "my track.kml");
        assert_eq!(export_file_name("a/b:c", "Run"), "a_b_c.kml");
        assert_eq!(export_file_name("   ", "Run"), "Run.kml");
        assert_eq!(export_file_name("", ""), "export.kml");
    }
}
