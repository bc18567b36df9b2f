pub mod alias;
pub mod catalog;
pub mod preset;

pub use alias::{apply_default_aliases, merge_aliases, set_value_by_aliases, DEFAULT_ALIASES};
pub use catalog::{default_options, find_option, validate_option, MapOption, VALID_OPTIONS};
pub use preset::{inherit_from, merge_preset, PresetMerger};
