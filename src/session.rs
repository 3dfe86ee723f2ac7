use std::borrow::Cow;

use geojson::FeatureCollection;
use log::{debug, info};

use crate::clock::DisplayClock;
use crate::converter;
use crate::error::{Result, ViewerError};
use crate::exporter;
use crate::features::{Coord, Feature, FeatureLayer, Geometry};
use crate::import::{self, FileFormat};
use crate::kml;
use crate::options::ViewerOptions;
use crate::parser::parse_gpx;
use crate::query::{AttributeQuery, RequestSequencer, RequestToken, filtered_title};
use crate::registry::{Layer, LayerRegistry, TrackLayer};
use crate::stats::{TrackSummary, aggregate};
use crate::summary;

/// One viewer session: the imported layers and everything computed on them.
///
/// Every import is processed to completion before the registry is touched,
/// so a failed import leaves earlier layers as they were.
#[derive(Debug)]
pub struct Session {
    opts: ViewerOptions,
    clock: DisplayClock,
    registry: LayerRegistry,
    remote: RequestSequencer,
}

impl Session {
    pub fn new(opts: ViewerOptions) -> Result<Self> {
        let clock = DisplayClock::from_options(&opts)?;
        Ok(Self {
            opts,
            clock,
            registry: LayerRegistry::new(),
            remote: RequestSequencer::new(),
        })
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Import an uploaded file, picking the format from its extension.
    /// Returns the title the layer was registered under.
    pub fn import_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let format = FileFormat::from_file_name(file_name)?;
        let title = import::layer_title(file_name).to_string();

        match format {
            FileFormat::Gpx => {
                let content = import::text(bytes, format)?;
                self.import_gpx(&title, &content)?;
            }
            FileFormat::Kml => {
                let content = import::text(bytes, format)?;
                self.import_kml(&title, &content)?;
            }
            FileFormat::Kmz => {
                let content = import::kml_from_kmz(bytes)?;
                self.import_kml(&title, &content)?;
            }
            FileFormat::GeoJson => {
                let content = import::text(bytes, format)?;
                self.import_geojson(&title, &content)?;
            }
        }

        Ok(title)
    }

    /// Parse and summarize a GPX document, replacing any track with the
    /// same title.
    pub fn import_gpx(&mut self, title: &str, gpx: &str) -> Result<TrackSummary> {
        let doc = parse_gpx(gpx)?;
        let stats = aggregate(&doc)?;
        let rendered = summary::render(title, &stats.summary, &self.clock);

        info!(
            "imported track '{}': {} points, {}",
            title,
            stats.summary.point_count,
            stats.summary.total_distance.to_kilometers()
        );

        let summary = stats.summary.clone();
        self.registry.insert(
            title,
            Layer::Track(TrackLayer {
                points: stats.points,
                summary: stats.summary,
                rendered,
            }),
        );
        Ok(summary)
    }

    pub fn import_kml(&mut self, title: &str, kml_text: &str) -> Result<usize> {
        let layer = kml::parse_kml(title, kml_text)?;
        self.insert_features(layer)
    }

    pub fn import_geojson(&mut self, title: &str, text: &str) -> Result<usize> {
        let layer = converter::feature_layer_from_geojson(title, text)?;
        self.insert_features(layer)
    }

    fn insert_features(&mut self, layer: FeatureLayer) -> Result<usize> {
        if layer.is_empty() {
            return Err(ViewerError::NoFeatures(layer.title));
        }
        let count = layer.features.len();
        info!("imported layer '{}': {} features", layer.title, count);
        self.registry
            .insert(layer.title.clone(), Layer::Features(layer));
        Ok(count)
    }

    /// Drop a layer and everything derived from it.
    pub fn remove_layer(&mut self, title: &str) -> bool {
        let removed = self.registry.remove(title).is_some();
        if removed {
            info!("removed layer '{title}'");
        }
        removed
    }

    /// Summary panel contents for every loaded track.
    pub fn summaries_html(&self) -> String {
        summary::join_html(
            self.registry
                .tracks()
                .map(|(_, track)| track.rendered.html.as_str()),
        )
    }

    pub fn can_export(&self) -> bool {
        !self.registry.is_empty()
    }

    /// GeoJSON for drawing a layer on the map.
    pub fn layer_geojson(&self, title: &str) -> Result<FeatureCollection> {
        match self.registry.get(title) {
            Some(Layer::Track(track)) => Ok(converter::track_to_feature_collection(
                &track.points,
                &self.opts,
                &self.clock,
            )),
            Some(Layer::Features(layer)) => {
                Ok(converter::feature_layer_to_feature_collection(layer))
            }
            None => Err(ViewerError::NoExportableData(title.to_string())),
        }
    }

    /// Serialize a layer as a KML document.
    pub fn export_kml(&self, title: &str) -> Result<String> {
        let kml = match self.registry.get(title) {
            Some(Layer::Track(track)) => {
                exporter::export_track(title, &track.points, &track.rendered.text, &self.clock)?
            }
            Some(Layer::Features(layer)) => exporter::export_features(layer)?,
            None => return Err(ViewerError::NoExportableData(title.to_string())),
        };
        info!("exported '{title}' as KML ({} bytes)", kml.len());
        Ok(kml)
    }

    /// Features of a layer as the query sees them. Track points are exposed
    /// with the same fields the map popups show.
    fn queryable(&self, title: &str) -> Option<Cow<'_, FeatureLayer>> {
        match self.registry.get(title)? {
            Layer::Features(layer) => Some(Cow::Borrowed(layer)),
            Layer::Track(track) => Some(Cow::Owned(self.track_features(title, track))),
        }
    }

    fn track_features(&self, title: &str, track: &TrackLayer) -> FeatureLayer {
        let features = track
            .points
            .iter()
            .map(|pt| {
                Feature::new(Geometry::Point(Coord::with_ele(pt.lon, pt.lat, pt.elevation)))
                    .with_attribute("lat", pt.lat.to_string())
                    .with_attribute("lon", pt.lon.to_string())
                    .with_attribute("elevation", pt.elevation.to_string())
                    .with_attribute(
                        "time",
                        pt.time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    )
                    .with_attribute("localTime", self.clock.format_point(pt.time))
                    .with_attribute("speed", pt.speed.to_string())
            })
            .collect();
        FeatureLayer::new(title, features)
    }

    /// Run an attribute query and register the matches as
    /// `Filtered: <layer>`, replacing an earlier result for that layer.
    pub fn run_query(&mut self, layer_title: &str, query: &AttributeQuery) -> Result<usize> {
        let source = self.queryable(layer_title).ok_or_else(|| {
            ViewerError::InvalidQuery(format!("layer '{layer_title}' not found"))
        })?;
        let matches = query.run(&source)?;
        let count = matches.len();
        let title = filtered_title(layer_title);
        self.registry
            .insert(title.clone(), Layer::Features(FeatureLayer::new(title, matches)));
        Ok(count)
    }

    pub fn clear_query(&mut self, layer_title: &str) -> bool {
        self.registry.remove(&filtered_title(layer_title)).is_some()
    }

    /// Start a remote query; pass the token back with its response.
    pub fn begin_remote_query(&mut self) -> RequestToken {
        self.remote.issue()
    }

    /// Apply a remote GeoJSON response unless a newer query has been
    /// started since. Returns whether the response was applied.
    ///
    /// Remote results never replace an imported track and an empty result
    /// is reported as `NoFeatures` instead of becoming a layer.
    pub fn apply_remote_response(
        &mut self,
        token: RequestToken,
        title: &str,
        geojson_text: &str,
    ) -> Result<bool> {
        if !self.remote.is_current(token) {
            debug!("dropping response #{} for '{title}'", token.0);
            return Ok(false);
        }
        let layer = converter::feature_layer_from_geojson(title, geojson_text)?;
        if layer.is_empty() {
            return Err(ViewerError::NoFeatures(title.to_string()));
        }
        if self.registry.track(title).is_some() {
            return Err(ViewerError::TrackConflict(title.to_string()));
        }
        if !self.remote.accept(token) {
            return Ok(false);
        }
        self.insert_features(layer)?;
        Ok(true)
    }
}
