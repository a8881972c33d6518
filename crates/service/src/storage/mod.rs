//! Storage abstractions for service layer
//!
//! Contains the file-backed map store used by the reservation store and
//! the atomic file replacement it relies on.

pub mod json_map_store;

pub use json_map_store::JsonMapStore;
