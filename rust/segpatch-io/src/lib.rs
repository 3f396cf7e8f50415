//! I/O abstractions:
//! - `ReadAt`: positional reader with the ability to fetch a specified byte range from a file/blob.
//! - `SealingWrite`: sequential writer with a `seal()` operation, committing the write activity.
//!
//! Provides a couple of simple implementations: memory-based and file-based.

use std::{ops::Range, sync::Arc};

pub mod file;
pub mod memory;
pub mod utils;

pub use file::{FileReader, FileWriter};

/// A trait representing a conceptual file or buffer that supports reading from arbitrary
/// positions.
///
/// Segment side files (patch files in particular) are immutable once sealed, so
/// implementations are shared across threads behind `Arc<dyn ReadAt>`.
pub trait ReadAt: Send + Sync + 'static {
    /// Returns the size of the underlying object.
    fn size(&self) -> std::io::Result<u64>;

    /// Reads a specified range of bytes from the object.
    ///
    /// **NOTE**: `read_at` should not return with a short read, unless end-of-file
    /// is encountered.
    fn read_at(&self, range: Range<u64>) -> std::io::Result<Vec<u8>>;

    /// Reads the whole object.
    fn read_all(&self) -> std::io::Result<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0..size)
    }
}

/// A trait for sequential writing with explicit sealing semantics.
///
/// Unlike standard [`std::io::Write`], this trait requires explicit sealing to ensure
/// data is properly flushed and committed to the underlying storage medium.
pub trait SealingWrite: Send {
    /// Writes the entire buffer to the underlying storage, appending it to any
    /// previously written data.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Seals the writer, ensuring all buffered data is flushed and committed.
    ///
    /// Once sealed, the writer should not accept any further write operations.
    fn seal(&mut self) -> std::io::Result<()>;
}

impl<T> ReadAt for Arc<T>
where
    T: ReadAt + ?Sized,
{
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Vec<u8>> {
        self.as_ref().read_at(range)
    }
}

impl<T> SealingWrite for Box<T>
where
    T: SealingWrite + ?Sized,
{
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.as_mut().write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.as_mut().seal()
    }
}

impl<T> SealingWrite for &mut T
where
    T: SealingWrite + ?Sized,
{
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        (**self).write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        (**self).seal()
    }
}
