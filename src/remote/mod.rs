pub mod cache;
pub mod source;

pub use cache::PresetCache;
pub use source::{ConfigFetcher, HttpFetcher, MemoryFetcher};
