//! Unit-tagged quantities.
//!
//! Distances are accumulated in meters and shown in kilometers; speeds are
//! kilometers per hour. Keeping them in distinct types stops a meters value
//! from being printed as kilometers by accident.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Meters(pub f64);

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Kilometers(pub f64);

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct KilometersPerHour(pub f64);

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct SquareMeters(pub f64);

impl Meters {
    pub fn to_kilometers(self) -> Kilometers {
        Kilometers(self.0 / 1000.0)
    }

    /// Average speed over `seconds`. `None` unless `seconds` is positive.
    pub fn per_seconds(self, seconds: f64) -> Option<KilometersPerHour> {
        (seconds > 0.0).then(|| KilometersPerHour(self.0 / seconds * 3.6))
    }
}

impl Add for Meters {
    type Output = Meters;

    fn add(self, rhs: Meters) -> Meters {
        Meters(self.0 + rhs.0)
    }
}

impl AddAssign for Meters {
    fn add_assign(&mut self, rhs: Meters) {
        self.0 += rhs.0;
    }
}

impl Sum for Meters {
    fn sum<I: Iterator<Item = Meters>>(iter: I) -> Meters {
        iter.fold(Meters(0.0), Add::add)
    }
}

impl SquareMeters {
    pub fn to_square_kilometers(self) -> f64 {
        self.0 / 1_000_000.0
    }
}

/// Two decimal places, the precision every summary figure is shown with.
pub fn round2(value: f64) -> String {
    format!("{value:.2}")
}

impl fmt::Display for Meters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} m", round2(self.0))
    }
}

impl fmt::Display for Kilometers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} km", round2(self.0))
    }
}

impl fmt::Display for KilometersPerHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&round2(self.0))
    }
}
