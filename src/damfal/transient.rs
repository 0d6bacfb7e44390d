//! # Transient Local Copies
//!
//! Asset bytes live in the DAM. They only touch the local disk when the host needs
//! byte-level processing (thumbnails, metadata extraction), and then only for as long as the
//! host holds on to them.
//!
//! - [`LocalCopy`] is the scoped handle: the backing temp file is deleted when it drops, on
//!   every exit path. A download that fails half way never leaves a file behind.
//! - [`TransientFiles`] is the per-driver registry for copies the host asked for as a plain
//!   path. They are deleted when the registry is swept or dropped. Files someone else already
//!   removed are skipped silently.
//!
//! The registry is owned by a driver instance, never process-wide, so two drivers in one
//! process cannot delete each other's files.

use crate::error::{DamError, Result};
use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

const PREFIX: &str = "damfal-";

#[derive(Debug)]
pub struct LocalCopy {
    path: TempPath,
}

impl LocalCopy {
    /// Creates a temp file (in `dir`, or the system temp dir) with the given
    /// extension and lets `fill` write the content. If `fill` fails the file is removed.
    pub fn create<F>(dir: Option<&Path>, extension: &str, fill: F) -> Result<Self>
    where
        F: FnOnce(&mut dyn Write) -> Result<u64>,
    {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX).suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(DamError::Io)?;

        let written = fill(file.as_file_mut())?;
        file.as_file_mut().flush().map_err(DamError::Io)?;
        tracing::debug!(path = %file.path().display(), bytes = written, "materialized local copy");

        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(DamError::Io)
    }
}

impl AsRef<Path> for LocalCopy {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

#[derive(Debug, Default)]
pub struct TransientFiles {
    files: RefCell<Vec<TempPath>>,
}

impl TransientFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of the copy and returns its path, valid until the next sweep.
    pub fn register(&self, copy: LocalCopy) -> PathBuf {
        let path = copy.path().to_path_buf();
        self.files.borrow_mut().push(copy.path);
        path
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }

    /// Deletes every registered file that still exists. Never fails; returns how
    /// many files were actually removed.
    pub fn sweep(&self) -> usize {
        let files: Vec<TempPath> = self.files.borrow_mut().drain(..).collect();
        let mut removed = 0;
        for file in files {
            if !file.exists() {
                // Dropping a TempPath whose file is gone is a no-op.
                continue;
            }
            let shown = file.display().to_string();
            match file.close() {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %shown, error = %e, "could not remove transient file"),
            }
        }
        removed
    }
}

impl Drop for TransientFiles {
    fn drop(&mut self) {
        let removed = self.sweep();
        if removed > 0 {
            tracing::debug!(removed, "swept transient files");
        }
    }
}
