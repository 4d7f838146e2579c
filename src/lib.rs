pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod observer;
pub mod planner;
pub mod scanner;
pub mod sequence;
pub mod session;
pub mod store;
pub mod track;

/// Format every catalogued track is stored in
pub const CANONICAL_EXTENSION: &str = "mp3";

/// Containers converted to the canonical format before cataloguing
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &["m4a"];

/// Application name for XDG paths
pub const APP_NAME: &str = "beatwalk";
