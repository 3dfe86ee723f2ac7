use log::debug;
use serde::Deserialize;

use crate::error::{Result, ViewerError};
use crate::features::{Feature, FeatureLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
}

impl Operator {
    pub fn parse(op: &str) -> Result<Self> {
        Ok(match op.trim() {
            "=" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            op if op.eq_ignore_ascii_case("like") => Self::Like,
            other => {
                return Err(ViewerError::InvalidQuery(format!(
                    "unknown operator '{other}'"
                )));
            }
        })
    }
}

/// `attribute operator value` filter over a feature layer.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeQuery {
    pub attribute: String,
    pub operator: String,
    pub value: String,
}

impl AttributeQuery {
    /// Features whose attribute satisfies the query. String comparisons
    /// ignore case; ordering operators compare numerically and never match
    /// non-numeric values.
    pub fn run(&self, layer: &FeatureLayer) -> Result<Vec<Feature>> {
        if self.attribute.trim().is_empty() || self.value.trim().is_empty() {
            return Err(ViewerError::InvalidQuery(
                "attribute and value are required".to_string(),
            ));
        }
        let op = Operator::parse(&self.operator)?;

        let matches: Vec<Feature> = layer
            .features
            .iter()
            .filter(|f| self.matches(op, f))
            .cloned()
            .collect();

        debug!(
            "query {} {} {} on '{}': {} of {} features",
            self.attribute,
            self.operator,
            self.value,
            layer.title,
            matches.len(),
            layer.features.len()
        );

        if matches.is_empty() {
            return Err(ViewerError::NoMatchingFeatures(layer.title.clone()));
        }
        Ok(matches)
    }

    fn matches(&self, op: Operator, feature: &Feature) -> bool {
        let Some(actual) = feature.attribute(&self.attribute) else {
            return false;
        };
        let actual_lower = actual.to_lowercase();
        let wanted_lower = self.value.to_lowercase();

        match op {
            Operator::Eq => actual_lower == wanted_lower,
            Operator::Ne => actual_lower != wanted_lower,
            Operator::Like => actual_lower.contains(&wanted_lower),
            Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
                let (Ok(a), Ok(b)) = (
                    actual.trim().parse::<f64>(),
                    self.value.trim().parse::<f64>(),
                ) else {
                    return false;
                };
                match op {
                    Operator::Gt => a > b,
                    Operator::Lt => a < b,
                    Operator::Ge => a >= b,
                    _ => a <= b,
                }
            }
        }
    }
}

/// Title of the layer holding the results of a query on `layer_title`.
pub fn filtered_title(layer_title: &str) -> String {
    format!("Filtered: {layer_title}")
}

/// Identifies one outgoing remote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(pub u64);

/// Hands out increasing request tokens and accepts only the response to
/// the most recent request. Older responses arriving late are dropped.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: u64,
    applied: Option<u64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestToken {
        self.issued += 1;
        RequestToken(self.issued)
    }

    /// True when `token` is the latest request and its response has not
    /// been applied yet. Marks it applied.
    pub fn accept(&mut self, token: RequestToken) -> bool {
        if token.0 != self.issued || self.applied == Some(token.0) {
            debug!(
                "discarding stale response #{} (latest #{})",
                token.0, self.issued
            );
            return false;
        }
        self.applied = Some(token.0);
        true
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Coord, Geometry};

    fn layer() -> FeatureLayer {
        let f = |name: &str, pop: &str| {
            Feature::new(Geometry::Point(Coord::new(0.0, 0.0)))
                .with_attribute("name", name)
                .with_attribute("population", pop)
        };
        FeatureLayer::new(
            "Cities",
            vec![
                f("Bhopal", "1798218"),
                f("Indore", "1994397"),
                f("Sehore", "unknown"),
                Feature::new(Geometry::Point(Coord::new(1.0, 1.0))),
            ],
        )
    }

    fn query(attribute: &str, operator: &str, value: &str) -> AttributeQuery {
        AttributeQuery {
            attribute: attribute.to_string(),
            operator: operator.to_string(),
            value: value.to_string(),
        }
    }

    fn names(features: &[Feature]) -> Vec<&str> {
        features.iter().filter_map(|f| f.attribute("name")).collect()
    }

    #[test]
    fn test_equality_ignores_case() {
        let hits = query("name", "=", "bhopal").run(&layer()).unwrap();
        assert_eq!(names(&hits), vec!["Bhopal"]);

        let hits = query("name", "!=", "BHOPAL").run(&layer()).unwrap();
        assert_eq!(names(&hits), vec!["Indore", "Sehore"]);
    }

    #[test]
    fn test_numeric_comparisons_skip_non_numbers() {
        let hits = query("population", ">", "1800000").run(&layer()).unwrap();
        assert_eq!(names(&hits), vec!["Indore"]);

        let hits = query("population", "<=", "1994397").run(&layer()).unwrap();
        assert_eq!(names(&hits), vec!["Bhopal", "Indore"]);
    }

    #[test]
    fn test_like() {
        let hits = query("name", "like", "ORE").run(&layer()).unwrap();
        assert_eq!(names(&hits), vec!["Indore", "Sehore"]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            query("name", "~", "x").run(&layer()),
            Err(ViewerError::InvalidQuery(_))
        ));
        assert!(matches!(
            query("", "=", "x").run(&layer()),
            Err(ViewerError::InvalidQuery(_))
        ));
        assert!(matches!(
            query("name", "=", "Delhi").run(&layer()),
            Err(ViewerError::NoMatchingFeatures(t)) if t == "Cities"
        ));
    }

    #[test]
    fn test_sequencer_last_request_wins() {
        let mut seq = RequestSequencer::new();
        let first = seq.issue();
        let second = seq.issue();
        assert!(second > first);

        assert!(!seq.accept(first));
        assert!(seq.is_current(second));
        assert!(seq.accept(second));
        // a duplicate delivery of the same response is ignored
        assert!(!seq.accept(second));

        let third = seq.issue();
        assert!(!seq.accept(second));
        assert!(seq.accept(third));
    }
}
