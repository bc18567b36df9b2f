//! Map configuration as parsed from one YAML document.
//!
//! A [`Config`] is a plain option map plus the two things a YAML document
//! cannot carry: the element it renders into and, optionally, an explicit
//! renderer to use instead of resolving the `use` option.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::constants::{FINGERPRINT_EXCLUDED_KEYS, PRESET_LAST};
use crate::core::element::Element;
use crate::renderer::StepProvider;

/// Option map of a configuration.
pub type Options = Map<String, Value>;

#[derive(Clone, Default)]
pub struct Config {
    /// Option name to value, as read from YAML.
    pub options: Options,
    /// Container this configuration renders into, once one was assigned.
    pub target: Option<Element>,
    /// Explicit renderer, taking precedence over the `use` option.
    pub renderer: Option<Arc<dyn StepProvider>>,
}

impl Config {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Build a configuration from a JSON object; other values give an empty one.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(options) => Self::new(options),
            _ => Self::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn StepProvider>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_target(mut self, target: Element) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.options.insert(key.to_string(), value.into());
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// Renderer reference from the `use` option.
    pub fn use_ref(&self) -> Option<&Value> {
        self.options.get("use")
    }

    /// URL of a remote configuration to merge underneath this one.
    pub fn apply_url(&self) -> Option<&str> {
        self.get_str("apply").filter(|url| !url.is_empty())
    }

    pub fn inherits_last(&self) -> bool {
        self.get_str("preset") == Some(PRESET_LAST)
    }

    /// Trailing script attached to this configuration.
    pub fn eval_script(&self) -> Option<&str> {
        self.get_str("eval")
    }

    /// Serialized options without aliases and target, used as idempotence key.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.options)
    }
}

/// Fingerprint of an option map: its JSON form with excluded keys stripped.
pub fn fingerprint(options: &Options) -> String {
    let stripped: Options = options
        .iter()
        .filter(|(key, _)| !FINGERPRINT_EXCLUDED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(stripped).to_string()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("options", &self.options)
            .field("target", &self.target)
            .field("renderer", &self.renderer.as_ref().map(|r| r.id().to_string()))
            .finish()
    }
}

impl From<Options> for Config {
    fn from(options: Options) -> Self {
        Self::new(options)
    }
}
