use std::fmt;
use std::path::Path;

use crate::archive;
use crate::error::{Error, Result};
use crate::types::Dirent;

/// one node of a layer's metadata tree with its full path
#[derive(Debug, Clone)]
pub struct LsEntry {
    pub path: String,
    pub node: Dirent,
}

/// read the metadata document stored as `metadata_name` in a converted layer
pub fn read_metadata(layer_tar: &Path, metadata_name: &str) -> Result<Dirent> {
    let bytes = archive::read_entry(layer_tar, metadata_name)?.ok_or_else(|| {
        Error::MetadataNotFound {
            archive: layer_tar.to_path_buf(),
            name: metadata_name.to_string(),
        }
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// list every node of a converted layer, sorted by path
pub fn ls_layer(layer_tar: &Path, metadata_name: &str) -> Result<Vec<LsEntry>> {
    let tree = read_metadata(layer_tar, metadata_name)?;
    let mut entries: Vec<LsEntry> = tree
        .walk()
        .into_iter()
        .map(|(path, node)| LsEntry {
            path,
            node: node.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

impl fmt::Display for LsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = match self.node.size() {
            Some(size) => size.to_string(),
            None => "-".to_string(),
        };

        let detail = match &self.node {
            Dirent::File { hash, .. } => hash.to_hex()[..12].to_string(),
            _ => "-".repeat(12),
        };

        write!(
            f,
            "{:06o} {:<9} {:>10} {}    {}",
            self.node.mode(),
            self.node.type_name(),
            size,
            detail,
            self.path
        )?;

        if let Dirent::Symlink { link, .. } = &self.node {
            write!(f, " -> {}", link)?;
        }
        Ok(())
    }
}
