use crate::features::FeatureLayer;
use crate::gpx_types::TrackPoint;
use crate::stats::TrackSummary;
use crate::summary::RenderedSummary;

/// An imported GPX track with everything derived from it.
#[derive(Debug, Clone)]
pub struct TrackLayer {
    pub points: Vec<TrackPoint>,
    pub summary: TrackSummary,
    pub rendered: RenderedSummary,
}

#[derive(Debug, Clone)]
pub enum Layer {
    Track(TrackLayer),
    Features(FeatureLayer),
}

/// Session-owned layers keyed by title, in insertion order.
///
/// Inserting under an existing title replaces that layer in place.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    entries: Vec<(String, Layer)>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the layer previously stored under `title`.
    pub fn insert(&mut self, title: impl Into<String>, layer: Layer) -> Option<Layer> {
        let title = title.into();
        match self.position(&title) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, layer)),
            None => {
                self.entries.push((title, layer));
                None
            }
        }
    }

    pub fn remove(&mut self, title: &str) -> Option<Layer> {
        self.position(title).map(|i| self.entries.remove(i).1)
    }

    pub fn get(&self, title: &str) -> Option<&Layer> {
        self.position(title).map(|i| &self.entries[i].1)
    }

    pub fn track(&self, title: &str) -> Option<&TrackLayer> {
        match self.get(title)? {
            Layer::Track(t) => Some(t),
            Layer::Features(_) => None,
        }
    }

    pub fn features(&self, title: &str) -> Option<&FeatureLayer> {
        match self.get(title)? {
            Layer::Features(f) => Some(f),
            Layer::Track(_) => None,
        }
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn tracks(&self) -> impl Iterator<Item = (&str, &TrackLayer)> {
        self.entries.iter().filter_map(|(t, layer)| match layer {
            Layer::Track(track) => Some((t.as_str(), track)),
            Layer::Features(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, title: &str) -> Option<usize> {
        self.entries.iter().position(|(t, _)| t == title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(title: &str) -> Layer {
        Layer::Features(FeatureLayer::new(title, Vec::new()))
    }

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut reg = LayerRegistry::new();
        assert!(reg.insert("a", features("a-1")).is_none());
        reg.insert("b", features("b"));
        let previous = reg.insert("a", features("a-2"));

        assert!(matches!(previous, Some(Layer::Features(f)) if f.title == "a-1"));
        assert_eq!(reg.titles().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(reg.features("a").unwrap().title, "a-2");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut reg = LayerRegistry::new();
        reg.insert("a", features("a"));
        assert!(reg.remove("a").is_some());
        assert!(reg.remove("a").is_none());
        assert!(reg.is_empty());
        assert!(reg.get("a").is_none());
    }

    #[test]
    fn test_kind_lookups() {
        let mut reg = LayerRegistry::new();
        reg.insert("a", features("a"));
        assert!(reg.track("a").is_none());
        assert!(reg.features("a").is_some());
        assert_eq!(reg.tracks().count(), 0);
    }
}
