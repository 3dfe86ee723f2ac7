use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Malformed track point #{index}: {reason}")]
    MalformedTrackPoint { index: usize, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Track has no points")]
    EmptyTrack,

    #[error("No exportable data for '{0}'")]
    NoExportableData(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unexpected end of document inside <{0}>")]
    Truncated(String),

    #[error("Malformed coordinates: {0}")]
    MalformedCoordinates(String),

    #[error("No valid features found in '{0}'")]
    NoFeatures(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("'{0}' is an imported track and cannot be replaced by remote data")]
    TrackConflict(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No features in '{0}' match the query criteria")]
    NoMatchingFeatures(String),

    #[error("Failed to write document: {0}")]
    Write(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl From<zip::result::ZipError> for ViewerError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Archive(e.to_string())
    }
}

impl From<ViewerError> for JsValue {
    fn from(e: ViewerError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_point_names_index() {
        let e = ViewerError::MalformedTrackPoint {
            index: 3,
            reason: "missing attribute 'lat'".to_string(),
        };
        assert_eq!(e.to_string(), "Malformed track point #3: missing attribute 'lat'");
    }
}
