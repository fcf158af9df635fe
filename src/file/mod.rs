//! File access and low-level binary IO.
//!
//! Modules come in through [`File`], a thin memory-mapped view over the
//! on-disk container, and are decoded with the bounds-checked
//! [`parser::Parser`]. The symmetric [`writer::Writer`] produces the bytes
//! written back out after patching.

pub mod parser;
pub mod writer;

use std::path::Path;

use memmap2::Mmap;

use crate::Result;

/// A read-only, memory-mapped view of a module container on disk.
pub struct File {
    mmap: Mmap,
}

impl File {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// mapped, or [`crate::Error::Empty`] for zero-length files.
    pub fn open(path: &Path) -> Result<File> {
        let file = std::fs::File::open(path)?;

        // Safety: the mapping is read-only and private to this process; a
        // concurrent truncation of the underlying file is the caller's
        // responsibility, as with every mmap-based reader.
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(File { mmap })
    }

    /// The mapped bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }
}
