//! Session core configuration.
//!
//! Re-exports all configuration types from the `termdeck-config` crate.
//! All configuration types, defaults, and path helpers are defined there.

pub use termdeck_config::*;
