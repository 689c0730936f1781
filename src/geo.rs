use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::EARTH_RADIUS_KM;
use crate::error::ClinicsError;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Rejects non-finite or out-of-range coordinates.
    pub fn validate(self) -> Result<Self, ClinicsError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ClinicsError::InvalidInput(format!(
                "latitude out of range: {}",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ClinicsError::InvalidInput(format!(
                "longitude out of range: {}",
                self.lng
            )));
        }
        Ok(self)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Parses `"lat,lng"`.
impl FromStr for Position {
    type Err = ClinicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(ClinicsError::InvalidInput(format!(
                "position must be lat,lng: {s}"
            )));
        }
        let lat: f64 = parts[0]
            .parse()
            .map_err(|_| ClinicsError::InvalidInput(format!("bad latitude: {}", parts[0])))?;
        let lng: f64 = parts[1]
            .parse()
            .map_err(|_| ClinicsError::InvalidInput(format!("bad longitude: {}", parts[1])))?;
        Position::new(lat, lng).validate()
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_km(a: Position, b: Position) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let sin_lat = (d_lat / 2.0).sin();
    let sin_lng = (d_lng / 2.0).sin();
    let h = sin_lat * sin_lat
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * sin_lng * sin_lng;
    // rounding can push h just past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{} מ'", (km * 1000.0).round() as i64)
    } else {
        format!("{km:.1} ק\"מ")
    }
}
