//! content-addressed blob pool
//!
//! every blob lives at `<pool>/<hex sha256>`. blobs are write-once: a blob that
//! already exists is never rewritten. writes land in `<pool>/.tmp` under a
//! unique name and are renamed into place, so concurrent writers of the same
//! content never expose a partial blob.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{IoResultExt, Result};
use crate::fs::fsync_dir;
use crate::hash::{hash_file, ContentHasher, Hash};

/// name of the private temp directory inside the pool
const TMP_DIR: &str = ".tmp";

/// a content pool directory
pub struct ContentPool {
    path: PathBuf,
    /// blobs committed through this handle
    inserted: AtomicUsize,
}

/// temp file that is removed on drop unless committed
struct TmpBlob {
    path: PathBuf,
    committed: bool,
}

impl TmpBlob {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(uuid::Uuid::new_v4().to_string()),
            committed: false,
        }
    }
}

impl Drop for TmpBlob {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl ContentPool {
    /// open a pool, creating the directory if it does not exist
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path.join(TMP_DIR)).with_path(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inserted: AtomicUsize::new(0),
        })
    }

    /// pool root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// path to the temp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join(TMP_DIR)
    }

    /// get the filesystem path to a blob
    pub fn blob_path(&self, hash: &Hash) -> PathBuf {
        self.path.join(hash.to_hex())
    }

    /// check if a blob exists in the pool
    pub fn contains(&self, hash: &Hash) -> bool {
        self.blob_path(hash).exists()
    }

    /// number of new blobs this handle has added to the pool
    pub fn inserted(&self) -> usize {
        self.inserted.load(Ordering::Relaxed)
    }

    /// insert content from a reader, returning its hash
    ///
    /// the content is streamed into a temp file while hashing, then either
    /// renamed into place or discarded if the pool already has it.
    pub fn put<R: Read>(&self, reader: &mut R) -> Result<Hash> {
        let mut tmp = TmpBlob::new(&self.tmp_path());

        let mut hasher = ContentHasher::new();
        {
            let mut tmp_file = File::create(&tmp.path).with_path(&tmp.path)?;
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = reader.read(&mut buf).with_path(&tmp.path)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                tmp_file.write_all(&buf[..n]).with_path(&tmp.path)?;
            }
            tmp_file.sync_all().with_path(&tmp.path)?;
        }

        let hash = hasher.finalize();
        let blob_path = self.blob_path(&hash);

        // dedup check; the guard discards the temp file
        if blob_path.exists() {
            return Ok(hash);
        }

        self.commit_tmp(&mut tmp, &blob_path, &hash)?;
        Ok(hash)
    }

    /// insert the content of a file, returning its hash
    ///
    /// the file is hashed first; content is only copied when the pool does
    /// not already hold it.
    pub fn put_file(&self, path: &Path) -> Result<Hash> {
        let hash = hash_file(path)?;
        let blob_path = self.blob_path(&hash);

        if blob_path.exists() {
            tracing::trace!(%hash, path = %path.display(), "blob already pooled");
            return Ok(hash);
        }

        let mut tmp = TmpBlob::new(&self.tmp_path());
        {
            let mut src = File::open(path).with_path(path)?;
            let mut tmp_file = File::create(&tmp.path).with_path(&tmp.path)?;
            std::io::copy(&mut src, &mut tmp_file).with_path(&tmp.path)?;
            tmp_file.sync_all().with_path(&tmp.path)?;
        }

        self.commit_tmp(&mut tmp, &blob_path, &hash)?;
        Ok(hash)
    }

    /// list all blob hashes in the pool, sorted
    pub fn list(&self) -> Result<Vec<Hash>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.path).with_path(&self.path)? {
            let entry = entry.with_path(&self.path)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // skips the temp dir and anything else that is not a blob
            if let Ok(hash) = Hash::from_hex(name) {
                hashes.push(hash);
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// number of blobs and their total size
    pub fn stats(&self) -> Result<PoolStats> {
        let mut stats = PoolStats::default();
        for hash in self.list()? {
            let path = self.blob_path(&hash);
            let meta = fs::metadata(&path).with_path(&path)?;
            stats.blobs += 1;
            stats.bytes += meta.len();
        }
        Ok(stats)
    }

    /// re-hash every blob and report those whose content does not match their name
    pub fn verify(&self) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        for hash in self.list()? {
            report.blobs_checked += 1;
            let actual = hash_file(&self.blob_path(&hash))?;
            if actual != hash {
                report.corrupt.push(CorruptBlob {
                    expected: hash,
                    actual,
                });
            }
        }
        Ok(report)
    }

    /// rename a fully written temp file into place and fsync the pool directory
    fn commit_tmp(&self, tmp: &mut TmpBlob, blob_path: &Path, hash: &Hash) -> Result<()> {
        // a concurrent writer may have won the race; both hold identical content
        fs::rename(&tmp.path, blob_path).with_path(blob_path)?;
        tmp.committed = true;
        fsync_dir(&self.path)?;
        self.inserted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%hash, "pooled new blob");
        Ok(())
    }
}

/// pool statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub blobs: usize,
    pub bytes: u64,
}

/// result of [`ContentPool::verify`]
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub blobs_checked: usize,
    pub corrupt: Vec<CorruptBlob>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// a blob whose content hash differs from its filename
#[derive(Debug)]
pub struct CorruptBlob {
    pub expected: Hash,
    pub actual: Hash,
}
