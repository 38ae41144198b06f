//! YouTube URL merge library - shared modules for the binary.

pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod safety;
pub mod table;
