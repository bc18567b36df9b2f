//! Alias tables and the alias resolver.
//!
//! An alias is a capitalized option value (`use: Leaflet`) looked up in the
//! `aliases` option, keyed first by option name and then by alias name. The
//! entry is either a literal value or a descriptor `{ value, description, url }`.

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::core::config::Config;
use crate::core::constants::{DEFAULT_CONTAINER_WIDTH, DEFAULT_RENDERER_ALIAS};

/// Built-in aliases for the renderers shipped alongside the core.
pub static DEFAULT_ALIASES: Lazy<Value> = Lazy::new(|| {
    json!({
        "use": {
            "Leaflet": {
                "value": "renderers/leaflet",
                "description": "Leaflet is the leading open-source JavaScript library for mobile-friendly interactive maps. It has all the mapping features most developers ever need."
            },
            "Maplibre": {
                "value": "renderers/maplibre",
                "description": "MapLibre GL JS is a TypeScript library that uses WebGL to render interactive maps from vector tiles in a browser. The customization of the map comply with the MapLibre Style Spec."
            },
            "Openlayers": {
                "value": "renderers/openlayers",
                "description": "OpenLayers makes it easy to put a dynamic map in any web page. It can display map tiles, vector data and markers loaded from any source."
            }
        }
    })
});

/// Whether a value may reference an alias: it must start upper-case.
pub fn starts_uppercase(value: &str) -> bool {
    value.chars().next().is_some_and(char::is_uppercase)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Merge two alias tables option by option, `local` winning per alias name.
pub fn merge_aliases(base: Option<&Value>, local: Option<&Value>) -> Value {
    let mut merged: Map<String, Value> = base
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(local) = local.and_then(Value::as_object) {
        for (option, table) in local {
            match (merged.get_mut(option), table) {
                (Some(Value::Object(existing)), Value::Object(entries)) => {
                    existing.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                _ => {
                    merged.insert(option.clone(), table.clone());
                }
            }
        }
    }

    Value::Object(merged)
}

/// Replace capitalized option values by their aliased values, in place.
///
/// Unknown aliases are left untouched; calling this again on a resolved
/// configuration changes nothing.
pub fn set_value_by_aliases(config: &mut Config) -> &mut Config {
    let Some(aliases) = config.options.get("aliases").and_then(Value::as_object).cloned() else {
        return config;
    };

    let candidates: Vec<(String, String)> = config
        .options
        .iter()
        .filter(|(option, _)| option.as_str() != "aliases")
        .filter_map(|(option, value)| {
            let alias = value.as_str().filter(|alias| starts_uppercase(alias))?;
            Some((option.clone(), alias.to_string()))
        })
        .collect();

    for (option, alias) in candidates {
        let Some(entry) = aliases.get(&option).and_then(|table| table.get(&alias)) else {
            log::debug!("no alias '{alias}' for option '{option}', keeping it literally");
            continue;
        };

        let (value, descriptor) = match entry {
            Value::Object(descriptor) => (descriptor.get("value").cloned(), Some(descriptor)),
            literal => (Some(literal.clone()), None),
        };
        let Some(value) = value.filter(is_truthy) else {
            continue;
        };

        log::debug!("alias {option}: {alias} -> {value}");
        config.options.insert(option.clone(), value);

        if option == "use" {
            for field in ["url", "description"] {
                if let Some(extra) = descriptor.and_then(|d| d.get(field)) {
                    config.options.insert(field.to_string(), extra.clone());
                }
            }
        }
    }

    config
}

/// Default converter: fill `use` and `width`, and layer the built-in aliases
/// underneath the configuration's own.
pub fn apply_default_aliases(mut config: Config) -> Config {
    let options = &mut config.options;
    if options.get("use").map_or(true, Value::is_null) && config.renderer.is_none() {
        options.insert("use".to_string(), json!(DEFAULT_RENDERER_ALIAS));
    }
    options
        .entry("width".to_string())
        .or_insert_with(|| json!(DEFAULT_CONTAINER_WIDTH));

    let aliases = merge_aliases(Some(&*DEFAULT_ALIASES), options.get("aliases"));
    options.insert("aliases".to_string(), aliases);

    config
}
