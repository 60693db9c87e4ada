//! Read-only access to file contents as a plain byte slice.
//!
//! The format parsers in `binsight-extract` all consume `&[u8]`. [`ByteView`]
//! bridges the file system into that world: it memory-maps a file, or wraps a
//! buffer that already lives in memory, and exposes the bytes behind a cheap
//! clonable handle. The mapping is released when the last handle drops, so no
//! file descriptor outlives the parse that needed it.

use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

/// Where the bytes of a view actually live.
#[derive(Debug)]
enum Backing<'a> {
    /// An in-memory buffer, borrowed or owned.
    Buffer(Cow<'a, [u8]>),
    /// A file mapped into the address space.
    Mapped(Mmap),
}

impl Deref for Backing<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match *self {
            Backing::Buffer(ref buf) => buf,
            Backing::Mapped(ref mmap) => mmap,
        }
    }
}

/// A shared, read-only view of binary data.
///
/// Whether the data came from a mapped file, an owned vector or a borrowed
/// slice, a `ByteView` dereferences to the same `&[u8]`, so parsers never
/// need to care where their input lives. Cloning only bumps a reference
/// count.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use binsight_common::ByteView;
///
/// fn main() -> Result<(), std::io::Error> {
///     let mut file = tempfile::NamedTempFile::new()?;
///     file.write_all(b"1234")?;
///
///     let view = ByteView::open(file.path())?;
///     assert_eq!(view.as_slice(), b"1234");
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ByteView<'a> {
    backing: Arc<Backing<'a>>,
}

impl<'a> ByteView<'a> {
    /// Wraps a `Cow` buffer in a view.
    pub fn from_cow(cow: Cow<'a, [u8]>) -> Self {
        ByteView {
            backing: Arc::new(Backing::Buffer(cow)),
        }
    }

    /// Wraps a borrowed slice in a view.
    pub fn from_slice(buffer: &'a [u8]) -> Self {
        ByteView::from_cow(Cow::Borrowed(buffer))
    }

    /// Wraps an owned vector in a view.
    pub fn from_vec(buffer: Vec<u8>) -> Self {
        ByteView::from_cow(Cow::Owned(buffer))
    }

    /// Memory-maps an open file handle.
    pub fn map_file(file: &File) -> Result<Self, io::Error> {
        let backing = match unsafe { Mmap::map(file) } {
            Ok(mmap) => Backing::Mapped(mmap),
            Err(err) => {
                // A zero-length file cannot be mapped. Most platforms report
                // that as `InvalidInput`; Windows sometimes surfaces raw
                // error 1006 instead. Both degrade to an empty buffer so
                // probing an empty file is a soft miss, not a hard failure.
                if err.kind() == io::ErrorKind::InvalidInput
                    || (cfg!(windows) && err.raw_os_error() == Some(1006))
                {
                    Backing::Buffer(Cow::Borrowed(b""))
                } else {
                    return Err(err);
                }
            }
        };

        Ok(ByteView {
            backing: Arc::new(backing),
        })
    }

    /// Opens and memory-maps the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let file = File::open(path)?;
        Self::map_file(&file)
    }

    /// The bytes of this view.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        self.backing.deref()
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Deref for ByteView<'_> {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_yields_empty_slice() -> Result<(), std::io::Error> {
        let tmp = NamedTempFile::new()?;

        let view = ByteView::open(tmp.path())?;
        assert_eq!(&*view, b"");

        Ok(())
    }

    #[test]
    fn test_reads_file_contents() -> Result<(), std::io::Error> {
        let mut tmp = NamedTempFile::new()?;

        tmp.write_all(b"1234")?;

        let view = ByteView::open(tmp.path())?;
        assert_eq!(&*view, b"1234");

        Ok(())
    }

    #[test]
    fn test_buffer_backings() {
        assert_eq!(ByteView::from_slice(b"abc").as_slice(), b"abc");
        assert_eq!(ByteView::from_vec(b"abc".to_vec()).as_slice(), b"abc");

        let clone = ByteView::from_vec(b"shared".to_vec());
        assert_eq!(&*clone.clone(), &*clone);
    }
}
