use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{IoResultExt, Result};

/// write `content` to `path` and sync it to disk
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).with_path(path)?;
    file.write_all(content).with_path(path)?;
    file.sync_all().with_path(path)?;
    Ok(())
}

/// serialize `value` as compact JSON followed by a newline
pub fn write_json_line<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    write_file(path, &bytes)
}

/// copy a file byte for byte
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    fs::copy(src, dst).with_path(src)
}

/// sync a directory to disk
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}
