//! lazyimg - lazy container image converter
//!
//! rewrites a `docker save` archive so every layer carries only a metadata
//! document describing its filesystem. file contents move into a shared,
//! content-addressed pool from which a lazy-loading runtime fetches them on
//! first access.
//!
//! # Core concepts
//!
//! - **Pool**: flat directory of blobs named by the sha256 of their content
//! - **Dirent**: one node of a layer's metadata tree (directory, file, symlink, special)
//! - **Layer**: a `<id>/layer.tar` archive; the id is its directory name
//! - **Image**: a source archive plus the work area its conversion uses
//!
//! # Output layout
//!
//! ```text
//! <name>-lazy.tar
//!   manifest.json           tags suffixed, config renamed
//!   repositories            tags suffixed
//!   <sha256>.json           config with recomputed rootfs.diff_ids
//!   <id>/layer.tar          holds only metadata.json
//!   <id>/VERSION, <id>/json copied unchanged
//! ```
//!
//! # Example usage
//!
//! ```no_run
//! use lazyimg::{ops, Config};
//! use std::path::Path;
//!
//! let config = Config::default().with_pool("/var/lib/lazyimg/pool");
//! let report = ops::convert_image(Path::new("/images/app.tar"), &config).unwrap();
//! println!("wrote {}", report.output.display());
//! ```

mod archive;
mod config;
mod error;
mod hash;
mod layer;
mod pool;

pub mod fs;
pub mod ops;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use hash::{hash_bytes, hash_file, ContentHasher, Hash};
pub use layer::{Layer, UnpackedLayer};
pub use pool::{ContentPool, CorruptBlob, PoolStats, VerifyReport};
