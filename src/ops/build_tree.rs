use std::fs;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{fresh_dir, read_symlink_target, write_file, FileMetadata, FileType};
use crate::pool::ContentPool;
use crate::types::Dirent;

/// walk `root` and build its metadata tree, pooling every regular file
///
/// the filesystem is left untouched; see [`replace_with_metadata`] for the
/// destructive half of the conversion.
pub fn build_tree(root: &Path, pool: &ContentPool) -> Result<Dirent> {
    let meta = FileMetadata::from_path(root)?;
    let mut node = Dirent::directory(meta.mode);
    build_dir(root, &mut node, pool)?;
    Ok(node)
}

/// fill `node` with the entries of `dir` (recursive helper)
fn build_dir(dir: &Path, node: &mut Dirent, pool: &ContentPool) -> Result<()> {
    let mut dir_entries: Vec<_> = fs::read_dir(dir)
        .with_path(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(dir)?;
    dir_entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for entry in dir_entries {
        let path = entry.path();
        let name = entry.file_name().into_string().map_err(|raw| {
            Error::InvalidEntryName(format!("{:?} in {} is not utf-8", raw, dir.display()))
        })?;

        let meta = FileMetadata::from_path(&path)?;

        let child = match meta.file_type {
            FileType::Directory => {
                let mut child = Dirent::directory(meta.mode);
                build_dir(&path, &mut child, pool)?;
                child
            }

            FileType::Symlink => Dirent::Symlink {
                mode: meta.mode,
                size: meta.size,
                link: read_symlink_target(&path)?,
            },

            FileType::Regular => Dirent::File {
                mode: meta.mode,
                size: meta.size,
                hash: pool.put_file(&path)?,
            },

            // reading a fifo would block and devices have no content to pool
            FileType::BlockDevice | FileType::CharDevice | FileType::Fifo | FileType::Socket => {
                Dirent::Special {
                    mode: meta.mode,
                    size: meta.size,
                    rdev: meta.rdev,
                }
            }
        };

        node.insert(name, child)?;
    }

    Ok(())
}

/// serialize a metadata tree as compact JSON with children in name order
pub fn serialize_tree(tree: &Dirent) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(tree)?)
}

/// DESTROY everything under `root` and leave only `tree` serialized as `filename`
///
/// the previous contents cannot be recovered without re-extracting the layer.
pub fn replace_with_metadata(root: &Path, tree: &Dirent, filename: &str) -> Result<()> {
    let bytes = serialize_tree(tree)?;
    fresh_dir(root)?;
    let path = root.join(filename);
    write_file(&path, &bytes)
}
