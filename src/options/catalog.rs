//! Catalog of the options a renderer understands, and their defaults.
//!
//! Each [`MapOption`] carries a description and an example for editors and
//! the CLI, plus a validator for user supplied values.

use once_cell::sync::Lazy;
use reqwest::Url;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::config::Options;
use crate::core::constants::MAX_ZOOM;
use crate::core::geo::LngLat;
use crate::{MapclayError, Result};

/// Options every renderer starts from before a configuration is copied in.
pub fn default_options() -> Options {
    let defaults = json!({
        "width": "300px",
        "height": "300px",
        "center": [121, 24],
        "zoom": 7,
        "control": { "scale": false, "fullscreen": false },
        "data": [],
    });
    match defaults {
        Value::Object(options) => options,
        _ => Options::new(),
    }
}

/// A documented, validated option.
#[derive(Debug, Clone, Serialize)]
pub struct MapOption {
    pub name: &'static str,
    pub desc: &'static str,
    pub example: Option<&'static str>,
    pub example_desc: Option<&'static str>,
    #[serde(skip)]
    validator: fn(&Value) -> bool,
}

impl MapOption {
    pub fn is_valid(&self, value: &Value) -> bool {
        (self.validator)(value)
    }
}

const CSS_UNITS: [&str; 12] = [
    "px", "%", "em", "rem", "vh", "vw", "vmin", "vmax", "pt", "cm", "mm", "in",
];

fn is_css_length(value: &Value) -> bool {
    let Some(text) = value.as_str().map(str::trim) else {
        return false;
    };
    if text == "auto" || text == "0" {
        return true;
    }
    CSS_UNITS.iter().any(|unit| {
        text.strip_suffix(unit)
            .is_some_and(|number| !number.is_empty() && number.parse::<f64>().is_ok())
    })
}

fn is_coordinate(value: &Value) -> bool {
    match value {
        Value::String(text) => serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|parsed| LngLat::from_value(&parsed))
            .is_some(),
        other => LngLat::from_value(other).is_some(),
    }
}

fn is_zoom(value: &Value) -> bool {
    let zoom = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    zoom.is_some_and(|zoom| (0.0..=MAX_ZOOM).contains(&zoom))
}

fn is_flag(value: &Value) -> bool {
    matches!(value, Value::Bool(_)) || matches!(value.as_str(), Some("true" | "false"))
}

fn is_url(value: &Value) -> bool {
    value.as_str().is_some_and(|text| Url::parse(text).is_ok())
}

fn is_tile_url(value: &Value) -> bool {
    value.as_str().is_some_and(|text| {
        Url::parse(text).is_ok() && ["{x}", "{y}", "{z}"].iter().all(|p| text.contains(p))
    })
}

/// All options known to the base renderer.
pub static VALID_OPTIONS: Lazy<Vec<MapOption>> = Lazy::new(|| {
    vec![
        MapOption {
            name: "id",
            desc: "id of map HTML element",
            example: None,
            example_desc: None,
            validator: |value| {
                value
                    .as_str()
                    .is_some_and(|id| id.chars().any(|c| c.is_alphanumeric() || c == '_'))
            },
        },
        MapOption {
            name: "width",
            desc: "CSS width of map HTML element",
            example: Some("200px"),
            example_desc: None,
            validator: is_css_length,
        },
        MapOption {
            name: "height",
            desc: "CSS height of map HTML element",
            example: Some("200px"),
            example_desc: None,
            validator: is_css_length,
        },
        MapOption {
            name: "center",
            desc: "Center of camera map, value: [lon, lat]",
            example: Some("[121, 24]"),
            example_desc: Some("Center of Taiwan"),
            validator: is_coordinate,
        },
        MapOption {
            name: "zoom",
            desc: "Zoom level for map camera, number between: 0-22",
            example: Some("7.0"),
            example_desc: Some("Small country / US state"),
            validator: is_zoom,
        },
        MapOption {
            name: "control",
            desc: "Object of control options, supports: fullscreen, scale",
            example: Some("\n  scale: true"),
            example_desc: Some("Add Scale bar"),
            validator: Value::is_object,
        },
        MapOption {
            name: "debug",
            desc: "Set true to show tile boundary",
            example: Some("true"),
            example_desc: None,
            validator: is_flag,
        },
        MapOption {
            name: "XYZ",
            desc: "Raster tile format with {x}, {y} and {z}",
            example: Some("https://tile.openstreetmap.jp/styles/osm-bright/512/{z}/{x}/{y}.png"),
            example_desc: Some("Tile from OSM Japan!"),
            validator: is_tile_url,
        },
        MapOption {
            name: "GPX",
            desc: "URL of GPX file",
            example: Some("https://raw.githubusercontent.com/openlayers/openlayers/main/examples/data/gpx/fells_loop.gpx"),
            example_desc: Some("Example from topografix"),
            validator: is_url,
        },
        MapOption {
            name: "WMTS",
            desc: "URL of WMTS document",
            example: Some("https://gis.sinica.edu.tw/tileserver/wmts"),
            example_desc: Some("SINICA Taiwan"),
            validator: is_url,
        },
        MapOption {
            name: "draw",
            desc: "Draw Something on map",
            example: Some("true"),
            example_desc: Some("Enable Draw Tools"),
            validator: is_flag,
        },
        MapOption {
            name: "eval",
            desc: "Custom Script",
            example: Some("console.log('this', this)"),
            example_desc: Some("Print Renderer info"),
            validator: |_| true,
        },
    ]
});

pub fn find_option(name: &str) -> Option<&'static MapOption> {
    VALID_OPTIONS.iter().find(|option| option.name == name)
}

/// Check `value` against the validator of option `name`.
pub fn validate_option(name: &str, value: &Value) -> Result<bool> {
    find_option(name)
        .map(|option| option.is_valid(value))
        .ok_or_else(|| MapclayError::UnknownOption(name.to_string()))
}
