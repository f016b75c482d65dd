//! Monitor file backed by a shared memory mapping

use crate::error::{MonitorError, MonitorResult};
use crate::writer::MonitorFileWriter;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A monitor file mapped read-write into this process
///
/// The file is truncated and sized on creation. Pages that are never written
/// stay sparse on filesystems that support it.
#[derive(Debug)]
pub struct MappedMonitorFile {
    path: PathBuf,
    mmap: MmapMut,
}

impl MappedMonitorFile {
    /// Create (or truncate) `path`, size it to `length` bytes and map it
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created, sized or mapped.
    pub fn create(path: &Path, length: usize) -> MonitorResult<Self> {
        if length == 0 {
            return Err(MonitorError::InvalidConfig {
                message: "monitor file length must be non-zero".to_string(),
            });
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path)?;
        file.set_len(length as u64)?;

        // SAFETY: the file was just truncated and sized by this process. Other
        // processes may map it concurrently, but they only read, and every
        // counter update goes through aligned atomics.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        info!("Mapped monitor file {:?} ({} bytes)", path, length);
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    /// Create `path` with the length `writer` requires
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::create`].
    pub fn for_writer(path: &Path, writer: &MonitorFileWriter) -> MonitorResult<Self> {
        Self::create(path, writer.total_file_length())
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the mapping is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Mapped bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Mapped bytes, for structural writes and counter factories
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Write dirty pages back to the file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub fn flush(&self) -> MonitorResult<()> {
        self.mmap.flush()?;
        debug!("Flushed monitor file {:?}", self.path);
        Ok(())
    }
}
