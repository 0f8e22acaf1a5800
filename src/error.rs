use std::path::PathBuf;

/// error type for lazyimg operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a .tar archive: {0}")]
    InvalidArchiveName(PathBuf),

    #[error("image work directory is locked by another conversion: {0}")]
    LockContention(PathBuf),

    #[error("archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest.json contains no image records")]
    EmptyManifest,

    #[error("missing field '{field}' in {document}")]
    MissingField {
        document: &'static str,
        field: &'static str,
    },

    #[error("invalid repo tag: {0}")]
    InvalidRepoTag(String),

    #[error("duplicate repo tag in manifest: {0}")]
    DuplicateRepoTag(String),

    #[error("repo tag not found in repositories: {0}")]
    TagNotFound(String),

    #[error("layer path has no parent directory to name it: {0}")]
    InvalidLayerPath(PathBuf),

    #[error("duplicate layer id: {0}")]
    DuplicateLayerId(String),

    #[error("invalid dirent name: {0}")]
    InvalidEntryName(String),

    #[error("metadata document {name} not found in {archive}")]
    MetadataNotFound { archive: PathBuf, name: String },

    #[error("pool integrity check failed: {0} corrupt blobs")]
    CorruptPool(usize),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
