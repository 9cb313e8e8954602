//! capumm - A CLI mod manager for Capuchin
//!
//! This crate keeps a game's BepInEx plugin directory in step with a
//! selection of mods from a remote manifest:
//! - Manifest ingestion into typed catalog entries
//! - Selection rules (runtime always on, companion mod auto-enabled)
//! - Reconciliation: removals, staged downloads, archive extraction
//! - Installed-state persistence across runs

pub mod app;
pub mod config;
pub mod error;
pub mod games;
pub mod manifest;
pub mod mods;
pub mod selection;
pub mod state;

pub use app::App;
pub use config::Config;
pub use error::{Error, TitleError};
