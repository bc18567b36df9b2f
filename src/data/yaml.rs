//! Multi-document YAML parsing of map configurations.
//!
//! Every mapping document becomes one [`Config`]. Any other document (a bare
//! scalar, typically script text written after a `---` separator) is attached
//! to the preceding configuration as its `eval` option.

use serde::Deserialize;
use serde_json::Value;

use crate::core::config::Config;
use crate::Result;

/// Parse raw YAML text into an ordered, never empty list of configurations.
pub fn parse_configs(text: &str) -> Result<Vec<Config>> {
    let mut configs: Vec<Config> = Vec::new();

    for document in serde_yaml_ng::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        match value {
            Value::Object(options) => configs.push(Config::new(options)),
            // Empty documents (a trailing `---`, comments only) carry nothing
            Value::Null => {}
            other => match configs.last_mut() {
                Some(config) => config.set("eval", script_text(other)),
                None => log::debug!("dropping script document without a preceding configuration"),
            },
        }
    }

    if configs.is_empty() {
        configs.push(Config::default());
    }
    log::debug!("parsed {} configuration(s) from YAML", configs.len());

    Ok(configs)
}

/// Parse a single YAML document into a JSON value.
pub fn parse_document(text: &str) -> Result<Value> {
    Ok(serde_yaml_ng::from_str(text)?)
}

fn script_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
