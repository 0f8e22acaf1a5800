//! tar archive codec
//!
//! extraction preserves permissions and refuses entries that would escape the
//! destination. packing walks the source tree in name order and writes
//! deterministic headers, so the same tree always packs to the same bytes.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tar::{Archive, Builder, HeaderMode};
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};

/// extract `archive` into the existing directory `dest`
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).with_path(archive)?;
    let mut tar = Archive::new(file);
    tar.set_preserve_permissions(true);
    tar.set_preserve_mtime(true);
    tar.set_overwrite(true);
    tar.unpack(dest).map_err(|source| archive_error(archive, source))
}

/// archive the contents of `src` (not `src` itself) into a new file at `archive`
pub fn pack_dir(src: &Path, archive: &Path) -> Result<()> {
    let file = File::create(archive).with_path(archive)?;
    let mut builder = Builder::new(file);
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| archive_error(archive, e.into()))?;
        let name = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::InvalidLayerPath(entry.path().to_path_buf()))?;
        builder
            .append_path_with_name(entry.path(), name)
            .map_err(|source| archive_error(archive, source))?;
    }

    let file = builder
        .into_inner()
        .map_err(|source| archive_error(archive, source))?;
    file.sync_all().with_path(archive)?;
    Ok(())
}

/// read the content of the regular file `name` stored in `archive`
///
/// names are compared after stripping a leading `./`.
pub fn read_entry(archive: &Path, name: &str) -> Result<Option<Vec<u8>>> {
    let file = File::open(archive).with_path(archive)?;
    let mut tar = Archive::new(file);
    let wanted = Path::new(name.trim_start_matches("./"));

    let entries = tar.entries().map_err(|e| archive_error(archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive, e))?;
        let path: PathBuf = entry
            .path()
            .map_err(|e| archive_error(archive, e))?
            .into_owned();
        if path.strip_prefix(".").unwrap_or(path.as_path()) != wanted {
            continue;
        }
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| archive_error(archive, e))?;
        return Ok(Some(content));
    }
    Ok(None)
}

fn archive_error(path: &Path, source: std::io::Error) -> Error {
    Error::Archive {
        path: path.to_path_buf(),
        source,
    }
}
