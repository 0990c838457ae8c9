// src/config/mod.rs

//! Configuration loading and validation for batchdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate references and acyclicity (`validate.rs`).
//! - Expose option sections to tasks as an opaque store (`view.rs`).

pub mod loader;
pub mod model;
pub mod validate;
pub mod view;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ExecuteSection, OutputSection, RawConfigFile, SubtaskConfig, TaskConfig,
};
pub use view::ConfigView;
