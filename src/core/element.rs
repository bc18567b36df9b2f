//! In-process element tree standing in for the page DOM.
//!
//! The scheduler only needs a handful of DOM capabilities: creating a child
//! container, tagging it with an id, a class and string attributes, and
//! replacing the children of a parent. [`Element`] is a cheap, clonable
//! handle over shared node state so the same node can be referenced from a
//! [`Config`](crate::core::config::Config), a [`Renderer`](crate::renderer::Renderer)
//! and its parent at once.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::constants::{
    CONTAINER_CLASS, CONTAINER_TAG, FINGERPRINT_ATTRIBUTE, STATUS_ATTRIBUTE,
};
use crate::prelude::HashMap;
use crate::MapclayError;

/// Render status token stored on a map container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStatus {
    Rendering,
    Fulfilled,
    Unfulfilled,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rendering => "rendering",
            Self::Fulfilled => "fulfilled",
            Self::Unfulfilled => "unfulfilled",
        }
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderStatus {
    type Err = MapclayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rendering" => Ok(Self::Rendering),
            "fulfilled" => Ok(Self::Fulfilled),
            "unfulfilled" => Ok(Self::Unfulfilled),
            other => Err(MapclayError::Parse(format!("unknown render status '{other}'"))),
        }
    }
}

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    id: Option<String>,
    title: Option<String>,
    classes: Vec<String>,
    attributes: HashMap<String, String>,
    style: HashMap<String, String>,
    text: String,
    children: Vec<Element>,
    generation: u64,
}

/// Shared handle to a node of the element tree.
#[derive(Clone, Default)]
pub struct Element {
    inner: Arc<Mutex<ElementData>>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ElementData {
                tag: tag.into(),
                ..Default::default()
            })),
        }
    }

    /// A fresh map container: a `div` carrying the container class.
    pub fn container() -> Self {
        let element = Self::new(CONTAINER_TAG);
        element.add_class(CONTAINER_CLASS);
        element
    }

    fn data(&self) -> MutexGuard<'_, ElementData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn tag(&self) -> String {
        self.data().tag.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.data().id.clone()
    }

    pub fn set_id(&self, id: impl Into<String>) {
        self.data().id = Some(id.into());
    }

    pub fn title(&self) -> Option<String> {
        self.data().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.data().title = Some(title.into());
    }

    pub fn add_class(&self, class: &str) {
        let mut data = self.data();
        if !data.classes.iter().any(|c| c == class) {
            data.classes.push(class.to_string());
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.data().classes.iter().any(|c| c == class)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.data().attributes.get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        self.data().attributes.insert(name.to_string(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.data().attributes.remove(name)
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.data().style.get(property).cloned()
    }

    pub fn set_style(&self, property: &str, value: impl Into<String>) {
        self.data().style.insert(property.to_string(), value.into());
    }

    pub fn text_content(&self) -> String {
        self.data().text.clone()
    }

    pub fn set_text_content(&self, text: impl Into<String>) {
        self.data().text = text.into();
    }

    pub fn children(&self) -> Vec<Element> {
        self.data().children.clone()
    }

    pub fn append(&self, child: Element) {
        self.data().children.push(child);
    }

    pub fn clear_children(&self) {
        self.data().children.clear();
    }

    /// Replace all children at once, keeping the given order.
    pub fn replace_children(&self, children: Vec<Element>) {
        self.data().children = children;
    }

    /// Fingerprint of the configuration this container was last rendered with.
    pub fn fingerprint(&self) -> Option<String> {
        self.attribute(FINGERPRINT_ATTRIBUTE)
    }

    pub fn render_status(&self) -> Option<RenderStatus> {
        self.attribute(STATUS_ATTRIBUTE)
            .and_then(|status| status.parse().ok())
    }

    pub fn set_render_status(&self, status: RenderStatus) {
        self.set_attribute(STATUS_ATTRIBUTE, status.as_str());
    }

    pub fn generation(&self) -> u64 {
        self.data().generation
    }

    /// Start a new render of this container and return its generation.
    pub fn begin_render(&self, fingerprint: &str) -> u64 {
        let mut data = self.data();
        data.generation += 1;
        data.attributes
            .insert(FINGERPRINT_ATTRIBUTE.to_string(), fingerprint.to_string());
        data.attributes.insert(
            STATUS_ATTRIBUTE.to_string(),
            RenderStatus::Rendering.as_str().to_string(),
        );
        data.generation
    }

    /// Write the final status of the render started as `generation`.
    ///
    /// Returns `false` without touching the element when a newer render has
    /// started since.
    pub fn settle(&self, generation: u64, status: RenderStatus) -> bool {
        let mut data = self.data();
        if data.generation != generation {
            return false;
        }
        data.attributes.insert(
            STATUS_ATTRIBUTE.to_string(),
            status.as_str().to_string(),
        );
        true
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("Element")
            .field("tag", &data.tag)
            .field("id", &data.id)
            .field("classes", &data.classes)
            .field("children", &data.children.len())
            .finish()
    }
}
