//! Per-directory reader/writer locks

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Registry handing out one lock per artifact directory.
///
/// Training takes the write side across fit, persist and commit; prediction
/// takes the read side while loading artifacts. Distinct directories get
/// distinct locks and never contend.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `dir`, created on first use
    pub fn lock_for(&self, dir: &Path) -> Arc<RwLock<()>> {
        let key = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key).or_default())
    }

    /// Number of directories seen so far
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_dir_shares_lock() {
        let locks = DirectoryLocks::new();
        let a = locks.lock_for(Path::new("models"));
        let b = locks.lock_for(Path::new("models"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_distinct_dirs_do_not_contend() {
        let locks = DirectoryLocks::new();
        let a = locks.lock_for(Path::new("models/a"));
        let b = locks.lock_for(Path::new("models/b"));
        assert!(!Arc::ptr_eq(&a, &b));

        let _write_a = a.write();
        assert!(b.try_write().is_some());
    }
}
