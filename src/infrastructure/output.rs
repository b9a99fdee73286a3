// JSON dump helpers for debugging output
use crate::error::{RegressionError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub fn to_pretty_json<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).map_err(|e| RegressionError::json("output", e))
}

/// Print `data` as pretty-printed JSON on stdout.
pub fn log_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    println!("{}", to_pretty_json(data)?);
    Ok(())
}

/// Write `data` as pretty-printed JSON, creating parent directories.
pub fn save_to_file<T: Serialize + ?Sized>(data: &T, path: &Path) -> Result<()> {
    let json = to_pretty_json(data)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RegressionError::io(parent, e))?;
    }
    fs::write(path, json).map_err(|e| RegressionError::io(path, e))
}
