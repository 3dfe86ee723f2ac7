use std::io::{Cursor, Read};

use log::debug;

use crate::error::{Result, ViewerError};

/// Formats accepted by the upload control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Gpx,
    Kml,
    Kmz,
    GeoJson,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "gpx" => Ok(Self::Gpx),
            "kml" => Ok(Self::Kml),
            "kmz" => Ok(Self::Kmz),
            "geojson" | "json" => Ok(Self::GeoJson),
            _ => Err(ViewerError::UnsupportedFormat(format!(
                "please upload a KML, KMZ, GPX or GeoJSON file ({file_name})"
            ))),
        }
    }
}

/// Layer title for an uploaded file: its name without the extension.
pub fn layer_title(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Decode a text upload.
pub fn text(bytes: &[u8], format: FileFormat) -> Result<String> {
    let content = String::from_utf8(bytes.to_vec()).map_err(|_| {
        ViewerError::UnsupportedFormat(format!("{format:?} file is not valid UTF-8"))
    })?;
    if format == FileFormat::Gpx && !content.contains("<gpx") {
        return Err(ViewerError::UnsupportedFormat(
            "Invalid GPX file: Missing <gpx> tag".to_string(),
        ));
    }
    Ok(content)
}

/// Extract the first `.kml` document from a KMZ archive.
pub fn kml_from_kmz(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.name().to_ascii_lowercase().ends_with(".kml") {
            continue;
        }
        debug!("reading {} from KMZ", entry.name());
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| ViewerError::Archive(e.to_string()))?;
        return Ok(content);
    }

    Err(ViewerError::UnsupportedFormat(
        "No KML file found in KMZ".to_string(),
    ))
}
