//! stixgraph-core: threat object model, bundle loading, and configuration.
//!
//! This crate provides the foundational types shared by the stixgraph crates:
//! - `ThreatObject`, the parse-time classification of STIX objects
//! - `Bundle`, a loaded and classified STIX document
//! - Configuration management
//! - Common error types

pub mod bundle;
pub mod config;
pub mod error;
pub mod types;

pub use bundle::{Bundle, LoadOptions, LoadSummary};
pub use error::CoreError;
pub use types::{Entity, ObjectType, Relationship, ThreatObject};
