pub mod clock;
pub mod converter;
pub mod error;
pub mod exporter;
pub mod features;
pub mod geodesic;
pub mod gpx_types;
pub mod import;
pub mod kml;
pub mod logging;
pub mod measure;
pub mod options;
pub mod parser;
pub mod query;
pub mod registry;
pub mod session;
pub mod stats;
pub mod summary;
pub mod units;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::features::Coord;
use crate::options::ViewerOptions;
use crate::query::{AttributeQuery, RequestToken, filtered_title};
use crate::session::Session;

/// Convert GPX string to GeoJSON, returned as a JS object.
#[wasm_bindgen(js_name = gpxToGeoJson)]
pub fn gpx_to_geojson(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let fc = converter::gpx_to_feature_collection(gpx_string, &opts)?;
    to_js(&fc)
}

/// Convert GPX string to GeoJSON, returned as a JSON string.
#[wasm_bindgen(js_name = gpxToGeoJsonString)]
pub fn gpx_to_geojson_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let fc = converter::gpx_to_feature_collection(gpx_string, &opts)?;
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Length of a measured line given as `[[lon, lat], ...]`.
#[wasm_bindgen(js_name = formatLength)]
pub fn format_length(coordinates: JsValue) -> Result<String, JsValue> {
    let coords = parse_coords(coordinates)?;
    Ok(measure::format_length(measure::line_length(&coords)))
}

/// Area of a measured polygon ring given as `[[lon, lat], ...]`.
#[wasm_bindgen(js_name = formatArea)]
pub fn format_area(coordinates: JsValue) -> Result<String, JsValue> {
    let coords = parse_coords(coordinates)?;
    Ok(measure::format_area(measure::polygon_area(&coords)))
}

/// Send crate logs to the browser console at the given level.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let filter = logging::parse_level(level.as_deref().unwrap_or_default())?;
    logging::init(filter);
    Ok(())
}

/// MIME type to use for exported KML downloads.
#[wasm_bindgen(js_name = kmlMimeType)]
pub fn kml_mime_type() -> String {
    exporter::KML_MIME_TYPE.to_string()
}

/// The layers loaded in one map view.
#[wasm_bindgen]
pub struct MapSession {
    inner: Session,
}

#[wasm_bindgen]
impl MapSession {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<MapSession, JsValue> {
        console_error_panic_hook::set_once();

        let opts = parse_options(options)?;
        Ok(MapSession {
            inner: Session::new(opts)?,
        })
    }

    /// Import an uploaded GPX, KML, KMZ or GeoJSON file. Returns the layer title.
    #[wasm_bindgen(js_name = importFile)]
    pub fn import_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<String, JsValue> {
        Ok(self.inner.import_file(file_name, bytes)?)
    }

    /// Import GPX text; returns the track summary.
    #[wasm_bindgen(js_name = importGpx)]
    pub fn import_gpx(&mut self, title: &str, gpx: &str) -> Result<JsValue, JsValue> {
        let summary = self.inner.import_gpx(title, gpx)?;
        to_js(&summary)
    }

    /// Import KML text; returns the number of features.
    #[wasm_bindgen(js_name = importKml)]
    pub fn import_kml(&mut self, title: &str, kml: &str) -> Result<usize, JsValue> {
        Ok(self.inner.import_kml(title, kml)?)
    }

    #[wasm_bindgen(js_name = importGeoJson)]
    pub fn import_geojson(&mut self, title: &str, geojson: &str) -> Result<usize, JsValue> {
        Ok(self.inner.import_geojson(title, geojson)?)
    }

    #[wasm_bindgen(js_name = removeLayer)]
    pub fn remove_layer(&mut self, title: &str) -> bool {
        self.inner.remove_layer(title)
    }

    #[wasm_bindgen(js_name = layerTitles)]
    pub fn layer_titles(&self) -> js_sys::Array {
        self.inner
            .registry()
            .titles()
            .map(JsValue::from_str)
            .collect()
    }

    #[wasm_bindgen(js_name = summariesHtml)]
    pub fn summaries_html(&self) -> String {
        self.inner.summaries_html()
    }

    #[wasm_bindgen(js_name = canExport)]
    pub fn can_export(&self) -> bool {
        self.inner.can_export()
    }

    /// GeoJSON of a loaded layer for drawing on the map.
    #[wasm_bindgen(js_name = trackGeoJson)]
    pub fn track_geojson(&self, title: &str) -> Result<JsValue, JsValue> {
        let fc = self.inner.layer_geojson(title)?;
        to_js(&fc)
    }

    #[wasm_bindgen(js_name = exportKml)]
    pub fn export_kml(&self, title: &str) -> Result<String, JsValue> {
        Ok(self.inner.export_kml(title)?)
    }

    #[wasm_bindgen(js_name = exportFileName)]
    pub fn export_file_name(&self, requested: &str, layer_title: &str) -> String {
        exporter::export_file_name(requested, layer_title)
    }

    /// Run `{ attribute, operator, value }` against a layer. Returns the
    /// matching features as GeoJSON.
    #[wasm_bindgen(js_name = runQuery)]
    pub fn run_query(&mut self, layer_title: &str, query: JsValue) -> Result<JsValue, JsValue> {
        let query: AttributeQuery =
            serde_wasm_bindgen::from_value(query).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.inner.run_query(layer_title, &query)?;
        let fc = self.inner.layer_geojson(&filtered_title(layer_title))?;
        to_js(&fc)
    }

    #[wasm_bindgen(js_name = clearQuery)]
    pub fn clear_query(&mut self, layer_title: &str) -> bool {
        self.inner.clear_query(layer_title)
    }

    /// Token to hand back with the response of a remote query.
    #[wasm_bindgen(js_name = beginRemoteQuery)]
    pub fn begin_remote_query(&mut self) -> f64 {
        self.inner.begin_remote_query().0 as f64
    }

    /// Returns false when a newer remote query superseded this one.
    #[wasm_bindgen(js_name = applyRemoteResponse)]
    pub fn apply_remote_response(
        &mut self,
        token: f64,
        title: &str,
        geojson: &str,
    ) -> Result<bool, JsValue> {
        Ok(self
            .inner
            .apply_remote_response(RequestToken(token as u64), title, geojson)?)
    }
}

fn parse_options(options: JsValue) -> Result<ViewerOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ViewerOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn parse_coords(coordinates: JsValue) -> Result<Vec<Coord>, JsValue> {
    let positions: Vec<[f64; 2]> = serde_wasm_bindgen::from_value(coordinates)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(positions
        .into_iter()
        .map(|[lon, lat]| Coord::new(lon, lat))
        .collect())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}
