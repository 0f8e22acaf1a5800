//! documents found at the root of a `docker save` archive

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// `repositories`: repository name -> tag version -> top layer id
pub type Repositories = BTreeMap<String, BTreeMap<String, String>>;

/// one record of `manifest.json`
///
/// fields the converter does not touch are kept in `extra` and written back
/// unchanged. `repo_tags` tells an absent key (`None`) from an explicit
/// `null` (`Some(None)`) so both survive a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageManifest {
    pub config: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub repo_tags: Option<Option<Vec<String>>>,
    pub layers: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageManifest {
    /// parse `manifest.json`; only the first record is converted
    ///
    /// `Config` and `Layers` are checked up front so a missing field is
    /// reported by name rather than as a generic decode error.
    pub fn from_slice(bytes: &[u8]) -> Result<Vec<Self>> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let first = value
            .as_array()
            .and_then(|records| records.first())
            .ok_or(Error::EmptyManifest)?;
        for field in ["Config", "Layers"] {
            if first.get(field).is_none() {
                return Err(Error::MissingField {
                    document: "manifest.json",
                    field,
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// tags naming this image; an untagged image has none
    pub fn tags(&self) -> &[String] {
        self.repo_tags.as_ref().and_then(|t| t.as_deref()).unwrap_or(&[])
    }

    /// replace the tag list, keeping an absent or null `RepoTags` as it was
    pub fn set_tags(&mut self, tags: Vec<String>) {
        if let Some(Some(current)) = &mut self.repo_tags {
            *current = tags;
        }
    }
}

/// mark a key that is present in the document, even when its value is null
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// opaque image configuration with access to `rootfs.diff_ids`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageConfig {
    doc: serde_json::Value,
}

impl ImageConfig {
    /// parse a config document; `rootfs.diff_ids` must be present
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_slice(bytes)?;
        let config = Self { doc };
        config.diff_ids()?;
        Ok(config)
    }

    /// load and parse a config document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_path(path)?;
        Self::from_slice(&bytes)
    }

    pub fn diff_ids(&self) -> Result<&Vec<serde_json::Value>> {
        self.doc
            .get("rootfs")
            .and_then(|r| r.get("diff_ids"))
            .and_then(|d| d.as_array())
            .ok_or(Error::MissingField {
                document: "image config",
                field: "rootfs.diff_ids",
            })
    }

    fn diff_ids_mut(&mut self) -> Result<&mut Vec<serde_json::Value>> {
        self.doc
            .get_mut("rootfs")
            .and_then(|r| r.get_mut("diff_ids"))
            .and_then(|d| d.as_array_mut())
            .ok_or(Error::MissingField {
                document: "image config",
                field: "rootfs.diff_ids",
            })
    }

    /// empty the diff id list
    pub fn clear_diff_ids(&mut self) -> Result<()> {
        self.diff_ids_mut()?.clear();
        Ok(())
    }

    /// append a `sha256:<hex>` diff id
    pub fn push_diff_id(&mut self, diff_id: String) -> Result<()> {
        self.diff_ids_mut()?.push(serde_json::Value::String(diff_id));
        Ok(())
    }

    /// compact serialization with object keys sorted, suitable for hashing
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        // serde_json's Map is ordered by key unless preserve_order is enabled
        Ok(serde_json::to_vec(&self.doc)?)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.doc
    }
}

/// a `name:version` repo tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTag {
    pub name: String,
    pub version: String,
}

impl RepoTag {
    /// split a tag at its version separator
    ///
    /// the version is whatever follows the last `:` that is not part of a
    /// registry host, so `localhost:5000/app:1.0` names repository
    /// `localhost:5000/app`. tags without a version are rejected.
    pub fn parse(tag: &str) -> Result<Self> {
        let invalid = || Error::InvalidRepoTag(tag.to_string());
        let (name, version) = tag.rsplit_once(':').ok_or_else(invalid)?;
        if name.is_empty() || version.is_empty() || version.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// same repository, version with `suffix` appended
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            name: self.name.clone(),
            version: format!("{}{}", self.version, suffix),
        }
    }
}

impl fmt::Display for RepoTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// move `tag` to `new` inside `repos`, returning the layer id it pointed to
pub fn rekey_tag(repos: &mut Repositories, tag: &RepoTag, new: &RepoTag) -> Result<String> {
    let versions = repos
        .get_mut(&tag.name)
        .ok_or_else(|| Error::TagNotFound(tag.to_string()))?;
    let layer_id = versions
        .remove(&tag.version)
        .ok_or_else(|| Error::TagNotFound(tag.to_string()))?;
    versions.insert(new.version.clone(), layer_id.clone());
    Ok(layer_id)
}

/// check that `tag` is recorded in `repos`
pub fn ensure_tag(repos: &Repositories, tag: &RepoTag) -> Result<()> {
    repos
        .get(&tag.name)
        .and_then(|versions| versions.get(&tag.version))
        .map(|_| ())
        .ok_or_else(|| Error::TagNotFound(tag.to_string()))
}
