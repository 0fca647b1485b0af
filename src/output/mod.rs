//! Output module for inspecting and exporting harvest results
//!
//! This module handles:
//! - Reporting record counts and checkpoint positions
//! - Exporting SQLite data to JSON arrays

mod export;
pub mod stats;

pub use export::{export_json, ExportCounts};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
