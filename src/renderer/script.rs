use std::any::Any;

use serde_json::Value;

use crate::core::config::Options;
use crate::core::element::Element;

/// Values a custom script can see while it runs.
pub struct ScriptBindings<'a> {
    /// Live map object, if `add_map` produced one.
    pub map: Option<&'a (dyn Any + Send + Sync)>,
    /// Resolved options of the renderer.
    pub config: &'a Options,
    /// Id of the mapping library the renderer wraps.
    pub library: &'a str,
    pub target: Option<&'a Element>,
}

/// Evaluates the `eval` script of a configuration.
pub trait ScriptHost: Send + Sync {
    fn eval(&self, script: &str, bindings: ScriptBindings<'_>) -> anyhow::Result<Value>;
}
