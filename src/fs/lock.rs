use std::fs::File;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::error::{Error, IoResultExt, Result};

/// guard that holds an exclusive advisory lock until dropped
pub struct WorkLock {
    #[allow(dead_code)]
    flock: Flock<File>,
    path: PathBuf,
}
// lock is released automatically when Flock is dropped

impl WorkLock {
    /// acquire an exclusive lock on `path`, failing immediately if it is held
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = File::create(path).with_path(path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| Error::LockContention(path.to_path_buf()))?;

        Ok(Self {
            flock,
            path: path.to_path_buf(),
        })
    }

    /// try to acquire the lock, returning None if already locked
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        match Self::acquire(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(Error::LockContention(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
