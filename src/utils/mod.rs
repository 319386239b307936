//! Shared utilities: logging, progress reporting and ordered maps

pub mod logging;
pub mod ordered_map;

pub use ordered_map::OrderedMap;
