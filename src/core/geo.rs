use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::Options;
use crate::core::constants::MAX_ZOOM;

/// Geographical coordinate in configuration order: `[lng, lat]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Reads `[lng, lat]` out of a JSON array of two numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_array()?.as_slice() {
            [x, y] => Some(Self::new(x.as_f64()?, y.as_f64()?)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        json!([self.lng, self.lat])
    }

    /// Coordinate in `[lat, lng]` order, as Leaflet-style libraries expect it.
    pub fn reversed(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self::new(lng, lat)
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(value: LngLat) -> Self {
        [value.lng, value.lat]
    }
}

/// Camera state of a map: where it looks and how close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
}

impl Camera {
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, MAX_ZOOM),
        }
    }

    /// Camera described by the `center` and `zoom` options, if both are usable.
    pub fn from_options(options: &Options) -> Option<Self> {
        let center = LngLat::from_value(options.get("center")?)?;
        let zoom = options.get("zoom")?.as_f64()?;
        Some(Self::new(center, zoom))
    }

    /// Write this camera back into an option map.
    pub fn write_to(&self, options: &mut Options) {
        options.insert("center".to_string(), self.center.to_value());
        options.insert("zoom".to_string(), json!(self.zoom));
    }
}
