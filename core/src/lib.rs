//! # Trellis Core
//!
//! Document-model core of the Trellis diagram editor: the unit-of-work
//! change-tracking and undo/redo engine.

pub mod config;
pub mod unit_of_work;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logs the library version. Call once at startup after installing a logger.
pub fn init() {
    log::info!("Trellis Core v{} initialized", VERSION);
}
