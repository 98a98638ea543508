//! Shared helpers for subprocess integration tests

#![allow(dead_code)]

use std::path::PathBuf;

/// Route library tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Absolute path of a system tool
pub fn tool(name: &str) -> PathBuf {
    which::which(name).unwrap_or_else(|e| panic!("{name} not found on PATH: {e}"))
}
