pub mod lock;
pub mod read;
pub mod scratch;
pub mod write;

pub use lock::WorkLock;
pub use read::{read_symlink_target, FileMetadata, FileType};
pub use scratch::{ensure_dir, fresh_dir, remove_path};
pub use write::{copy_file, fsync_dir, write_file, write_json_line};
