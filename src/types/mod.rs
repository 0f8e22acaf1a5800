mod dirent;
mod image;

pub use dirent::Dirent;
pub use image::{ensure_tag, rekey_tag, ImageConfig, ImageManifest, RepoTag, Repositories};
