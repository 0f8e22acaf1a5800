use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;

/// one node of a layer's metadata tree
///
/// serialized as a bare JSON object; the variant is identified by which keys
/// are present (`dirents`, `link`, `hash` or `rdev`). `mode` is the full
/// `st_mode`, file type bits included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dirent {
    /// directory with children keyed by name
    Directory {
        mode: u32,
        dirents: BTreeMap<String, Dirent>,
    },

    /// symbolic link; the target is stored verbatim and never pooled
    Symlink { mode: u32, size: u64, link: String },

    /// regular file whose content lives in the pool under `hash`
    File { mode: u32, size: u64, hash: Hash },

    /// device node, fifo or socket
    Special { mode: u32, size: u64, rdev: u64 },
}

impl Dirent {
    /// create an empty directory node
    pub fn directory(mode: u32) -> Self {
        Self::Directory {
            mode,
            dirents: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> u32 {
        match self {
            Dirent::Directory { mode, .. }
            | Dirent::Symlink { mode, .. }
            | Dirent::File { mode, .. }
            | Dirent::Special { mode, .. } => *mode,
        }
    }

    /// recorded size; directories report none
    pub fn size(&self) -> Option<u64> {
        match self {
            Dirent::Directory { .. } => None,
            Dirent::Symlink { size, .. }
            | Dirent::File { size, .. }
            | Dirent::Special { size, .. } => Some(*size),
        }
    }

    /// get the type name for listings and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Dirent::Directory { .. } => "directory",
            Dirent::Symlink { .. } => "symlink",
            Dirent::File { .. } => "file",
            Dirent::Special { .. } => "special",
        }
    }

    /// pool reference, for regular files only
    pub fn hash(&self) -> Option<&Hash> {
        match self {
            Dirent::File { hash, .. } => Some(hash),
            _ => None,
        }
    }

    /// children of a directory node
    pub fn children(&self) -> Option<&BTreeMap<String, Dirent>> {
        match self {
            Dirent::Directory { dirents, .. } => Some(dirents),
            _ => None,
        }
    }

    /// add a child to a directory node
    pub fn insert(&mut self, name: impl Into<String>, child: Dirent) -> Result<()> {
        let name = name.into();
        validate_entry_name(&name)?;
        match self {
            Dirent::Directory { dirents, .. } => {
                if dirents.contains_key(&name) {
                    return Err(Error::InvalidEntryName(format!("duplicate name: {}", name)));
                }
                dirents.insert(name, child);
                Ok(())
            }
            other => Err(Error::InvalidEntryName(format!(
                "cannot add {} to a {} node",
                name,
                other.type_name()
            ))),
        }
    }

    /// look up a node by slash-separated path relative to this node
    pub fn get(&self, path: &str) -> Option<&Dirent> {
        let mut current = self;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = current.children()?.get(component)?;
        }
        Some(current)
    }

    /// every node below this one with its slash-separated path, parents before
    /// children, siblings in name order; the node itself is not included
    pub fn walk(&self) -> Vec<(String, &Dirent)> {
        let mut out = Vec::new();
        walk_into(self, "", &mut out);
        out
    }
}

fn walk_into<'a>(node: &'a Dirent, prefix: &str, out: &mut Vec<(String, &'a Dirent)>) {
    if let Some(children) = node.children() {
        for (name, child) in children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            out.push((path.clone(), child));
            walk_into(child, &path, out);
        }
    }
}

/// validate an entry name
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}
