pub mod builder;
pub mod config;
pub mod constants;
pub mod element;
pub mod geo;
