//! Typed views over the `data` and `markers` options.
//!
//! Configurations may also use the `XYZ`, `WMTS` and `GPX` shorthands; these
//! are folded into `data` records when a renderer is materialized.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::Options;
use crate::core::geo::LngLat;
use crate::options::alias::starts_uppercase;

/// Kind of a `data` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Tile,
    Wmts,
    Gpx,
}

/// One entry of the `data` option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    #[serde(rename = "type")]
    pub kind: DataType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One entry of the `markers` option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub xy: LngLat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Records of the `data` option; malformed entries are skipped.
pub fn data_records(options: &Options) -> Vec<DataRecord> {
    options
        .get("data")
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .filter_map(|record| serde_json::from_value(record.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Records of the given kind, in declared order.
pub fn records_of(options: &Options, kind: DataType) -> Vec<DataRecord> {
    data_records(options)
        .into_iter()
        .filter(|record| record.kind == kind)
        .collect()
}

/// Entries of the `markers` option; malformed entries are skipped.
pub fn markers(options: &Options) -> Vec<MarkerSpec> {
    options
        .get("markers")
        .and_then(Value::as_array)
        .map(|markers| {
            markers
                .iter()
                .filter_map(|marker| serde_json::from_value(marker.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// A layer switcher is worth showing once there is a choice of base layers.
pub fn show_layer_switcher(records: &[DataRecord]) -> bool {
    records.iter().any(|record| record.kind == DataType::Wmts)
        || records.iter().filter(|record| record.kind == DataType::Tile).count() > 1
}

/// Title for a tile URL: host plus the path up to the first placeholder.
pub fn tile_title(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    let prefix = path.split("%7B").next().unwrap_or(path);
    Some(format!("{}{}", parsed.host_str().unwrap_or_default(), prefix))
}

/// Fold the `XYZ`, `WMTS` and `GPX` shorthands into `data` records.
///
/// Shorthand keys are removed. Record URLs naming an entry of `aliases.data`
/// are replaced by the aliased URL, keeping the alias name as title.
pub fn expand_shorthands(options: &mut Options) {
    let mut records = match options.remove("data") {
        Some(Value::Array(records)) => records,
        _ => Vec::new(),
    };

    if let Some(xyz) = options.remove("XYZ") {
        let entries = match xyz {
            Value::Array(entries) => entries,
            single => vec![single],
        };
        records.extend(entries.into_iter().filter_map(tile_record));
    }

    if let Some(Value::String(url)) = options.remove("WMTS") {
        records.push(json!({ "type": "wmts", "url": url }));
    }

    if let Some(Value::String(url)) = options.remove("GPX") {
        records.push(json!({ "type": "gpx", "url": url }));
    }

    let data_aliases = options
        .get("aliases")
        .and_then(|aliases| aliases.get("data"))
        .and_then(Value::as_object)
        .cloned();
    if let Some(data_aliases) = data_aliases {
        for record in records.iter_mut().filter_map(Value::as_object_mut) {
            let Some(name) = record.get("url").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            if !starts_uppercase(&name) {
                continue;
            }
            let resolved = match data_aliases.get(&name) {
                Some(Value::Object(descriptor)) => descriptor.get("value").cloned(),
                Some(Value::Array(_)) | None => None,
                Some(literal) => Some(literal.clone()),
            };
            if let Some(url) = resolved {
                record.insert("title".to_string(), Value::String(name));
                record.insert("url".to_string(), url);
            }
        }
    }

    options.insert("data".to_string(), Value::Array(records));
}

fn tile_record(entry: Value) -> Option<Value> {
    let (url, title) = match entry {
        Value::String(url) => (url, None),
        Value::Object(record) => {
            let url = record.get("url")?.as_str()?.to_string();
            let title = record.get("title").and_then(Value::as_str).map(str::to_string);
            (url, title)
        }
        _ => return None,
    };
    let mut record = json!({ "type": "tile", "url": url });
    if let Some(title) = title.or_else(|| tile_title(&url)) {
        record["title"] = Value::String(title);
    }
    Some(record)
}
