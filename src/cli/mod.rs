//! CLI command handlers

pub mod commands;

pub use commands::{compile, find_sheet, DEFAULT_STAGING_DIR};
