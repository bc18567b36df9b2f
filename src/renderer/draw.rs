//! Identifiers for user drawn features.

use uuid::Uuid;

use crate::core::element::Element;

/// Generates feature ids scoped to one map container.
///
/// Ids are `<container id>-<uuid>`, or a bare uuid when the container has no
/// id, so features of different maps on one page never collide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawIdStrategy {
    prefix: String,
}

impl DrawIdStrategy {
    pub fn for_target(target: Option<&Element>) -> Self {
        let prefix = target
            .and_then(Element::id)
            .filter(|id| !id.is_empty())
            .map(|id| format!("{id}-"))
            .unwrap_or_default();
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&self) -> String {
        format!("{}{}", self.prefix, Uuid::new_v4())
    }

    /// Whether `id` was generated for this container.
    pub fn owns(&self, id: &str) -> bool {
        id.strip_prefix(&self.prefix)
            .is_some_and(|rest| Uuid::parse_str(rest).is_ok())
    }
}
