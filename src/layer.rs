//! one image layer, packed or unpacked
//!
//! a layer is identified by the name of the directory holding its archive,
//! e.g. `<id>/layer.tar`. the id survives every transformation and is how a
//! layer's `VERSION` and `json` sidecars are matched between trees.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::{hash_file, Hash};
use crate::ops::{build_tree, replace_with_metadata};
use crate::pool::ContentPool;
use crate::types::Dirent;

/// file name of a packed layer archive inside its layer directory
pub const LAYER_ARCHIVE: &str = "layer.tar";

/// directory an unpacked layer is extracted into inside its layer directory
pub const LAYER_ROOT: &str = "layer";

/// take the layer id from the name of `path`'s parent directory
fn layer_id_of(path: &Path) -> Result<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidLayerPath(path.to_path_buf()))
}

/// a layer stored as a tar archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    id: String,
    path: PathBuf,
}

impl Layer {
    /// handle for the archive at `path`
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let id = layer_id_of(&path)?;
        Ok(Self { id, path })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// extract into `scratch/<id>/layer/`
    ///
    /// `scratch` must exist; the per-layer directory must not.
    pub fn unpack(&self, scratch: &Path) -> Result<UnpackedLayer> {
        let root = scratch.join(&self.id).join(LAYER_ROOT);
        fs::create_dir_all(&root).with_path(&root)?;
        archive::extract(&self.path, &root)?;
        tracing::debug!(id = %self.id, path = %root.display(), "unpacked layer");
        Ok(UnpackedLayer {
            id: self.id.clone(),
            root,
        })
    }

    /// content hash of the archive
    pub fn hash(&self) -> Result<Hash> {
        hash_file(&self.path)
    }

    /// `sha256:<hex>` of the archive, as recorded in `rootfs.diff_ids`
    pub fn diff_id(&self) -> Result<String> {
        Ok(self.hash()?.digest_string())
    }
}

/// a layer extracted into a working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedLayer {
    id: String,
    root: PathBuf,
}

impl UnpackedLayer {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// directory holding the layer's filesystem
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// pool every file and replace the working directory with a single
    /// metadata document named `metadata_name`
    pub fn convert(&self, metadata_name: &str, pool: &ContentPool) -> Result<Dirent> {
        let tree = build_tree(&self.root, pool)?;
        replace_with_metadata(&self.root, &tree, metadata_name)?;
        Ok(tree)
    }

    /// archive the working directory into `dest/<id>/layer.tar`
    pub fn pack(&self, dest: &Path) -> Result<Layer> {
        let dir = dest.join(&self.id);
        fs::create_dir_all(&dir).with_path(&dir)?;
        let path = dir.join(LAYER_ARCHIVE);
        archive::pack_dir(&self.root, &path)?;
        Ok(Layer {
            id: self.id.clone(),
            path,
        })
    }
}
