//! Core constants shared by the scheduler, the renderers and the element model.
//! Keeping them in a single place makes it easier to keep attribute names in sync.

/// Class added to every map container created by the scheduler.
pub const CONTAINER_CLASS: &str = "mapclay";

/// Attribute holding the fingerprint of the configuration a container was rendered with.
pub const FINGERPRINT_ATTRIBUTE: &str = "data-mapclay";

/// Attribute holding the render status token of a container.
pub const STATUS_ATTRIBUTE: &str = "data-render";

/// Tag name used for freshly created map containers.
pub const CONTAINER_TAG: &str = "div";

/// Option keys left out of the configuration fingerprint.
pub const FINGERPRINT_EXCLUDED_KEYS: [&str; 2] = ["aliases", "target"];

/// Value of `preset` that inherits the previous sibling configuration.
pub const PRESET_LAST: &str = "last";

/// Renderer used by the default converter when a configuration names none.
pub const DEFAULT_RENDERER_ALIAS: &str = "Leaflet";

/// Container width set by the default converter.
pub const DEFAULT_CONTAINER_WIDTH: &str = "100%";

/// Upper bound of the zoom levels accepted by the option catalog.
pub const MAX_ZOOM: f64 = 22.0;

/// Marker icon default size.
pub const MARKER_ICON_SIZE: (u32, u32) = (25, 41);

/// Anchor inside the marker icon (hot-spot) in pixel coords.
pub const MARKER_ICON_ANCHOR: (u32, u32) = (12, 41);

/// Tile layer used by renderers when a configuration carries no tile data.
pub const FALLBACK_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
