pub mod records;
pub mod yaml;

pub use records::{DataRecord, DataType, MarkerSpec};
pub use yaml::parse_configs;
