pub mod analyze;
pub mod concurrent;
pub mod config;
pub mod discover;
pub mod http_client;
pub mod output;
pub mod payload;
pub mod probe;
pub mod scan;
pub mod utils;

pub use crate::scan::{scan, scan_with, ScanContext, ScanResult};
