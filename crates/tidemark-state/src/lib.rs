//! Watermark persistence for tidemark.
//!
//! Provides the [`WatermarkStore`] trait, a [`YamlWatermarkStore`] that
//! keeps every watermark in one YAML document, and a
//! [`SqliteWatermarkStore`] for deployments that prefer a database file.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;
pub mod yaml;

pub use backend::WatermarkStore;
pub use error::StateError;
pub use sqlite::SqliteWatermarkStore;
pub use yaml::YamlWatermarkStore;
