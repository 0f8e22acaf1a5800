//! work directory management
//!
//! conversion phases start from directories in a known state. [`fresh_dir`]
//! discards whatever is at the path; [`ensure_dir`] keeps an existing
//! directory and reports whether it had to create one.

use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::{IoResultExt, Result};

/// make `path` an empty directory, DISCARDING any prior contents
pub fn fresh_dir(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        tracing::debug!(path = %path.display(), "discarding previous contents");
        remove_path(path)?;
    }
    fs::create_dir_all(path).with_path(path)
}

/// create `path` as a directory unless one already exists
///
/// returns true if the directory was created. a non-directory at `path` is
/// removed first.
pub fn ensure_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    if path.symlink_metadata().is_ok() {
        remove_path(path)?;
    }
    fs::create_dir_all(path).with_path(path)?;
    Ok(true)
}

/// remove a file, symlink or directory tree
///
/// extracted layers may contain read-only directories; if plain removal is
/// refused, owner write permission is restored throughout the tree and the
/// removal retried.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = path.symlink_metadata().with_path(path)?;
    if !meta.is_dir() {
        return fs::remove_file(path).with_path(path);
    }

    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            make_tree_writable(path)?;
            fs::remove_dir_all(path).with_path(path)
        }
        Err(e) => Err(e).with_path(path),
    }
}

/// add owner rwx to every directory under (and including) `dir`
fn make_tree_writable(dir: &Path) -> Result<()> {
    let meta = dir.symlink_metadata().with_path(dir)?;
    let mode = meta.permissions().mode();
    if mode & 0o700 != 0o700 {
        fs::set_permissions(dir, Permissions::from_mode(mode | 0o700)).with_path(dir)?;
    }

    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let file_type = entry.file_type().with_path(entry.path())?;
        if file_type.is_dir() {
            make_tree_writable(&entry.path())?;
        }
    }
    Ok(())
}
