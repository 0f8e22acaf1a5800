//! high-level operations on image archives

mod build_tree;
mod convert;
mod ls_layer;

pub use build_tree::{build_tree, replace_with_metadata, serialize_tree};
pub use convert::{convert_image, ConversionReport, Image, ARCHIVE_SUFFIX};
pub use ls_layer::{ls_layer, read_metadata, LsEntry};
