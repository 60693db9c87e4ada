//! A seekable file reader with explicit endianness.
//!
//! [`ByteReader`] is the lowest layer of the extraction engine: every structured
//! read from disk that is not done through a memory-mapped [`ByteView`] goes
//! through it. All multi-byte reads convert from the file's declared byte order
//! to host order; failed reads record a message retrievable via
//! [`ByteReader::last_error`] and leave the cursor position unspecified.
//!
//! [`ByteView`]: crate::ByteView

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Maximum number of bytes a single LEB128 value may occupy.
///
/// Ten bytes are sufficient for any 64-bit value; longer encodings are treated
/// as malformed input.
pub const MAX_LEB128_BYTES: usize = 10;

/// Byte order declared by a file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
    /// Whatever byte order the host uses.
    Native,
}

mod private {
    pub trait Sealed {}
}

/// A primitive type that can be decoded from a fixed number of bytes.
///
/// Implemented for the unsigned and signed integers up to 64 bits and for
/// `f32`/`f64`. This trait is sealed; it exists so that
/// [`ByteReader::read_array`] can be generic over element types.
pub trait Primitive: Sized + Copy + private::Sealed {
    /// The number of bytes this type occupies on disk.
    const SIZE: usize;

    /// Decodes a value from exactly `Self::SIZE` bytes in the given byte order.
    fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self;
}

macro_rules! impl_primitive {
    ($ty:ty) => {
        impl private::Sealed for $ty {}

        impl Primitive for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                match endianness {
                    Endianness::Little => <$ty>::from_le_bytes(buf),
                    Endianness::Big => <$ty>::from_be_bytes(buf),
                    Endianness::Native => <$ty>::from_ne_bytes(buf),
                }
            }
        }
    };
}

impl_primitive!(u8);
impl_primitive!(u16);
impl_primitive!(u32);
impl_primitive!(u64);
impl_primitive!(i8);
impl_primitive!(i16);
impl_primitive!(i32);
impl_primitive!(i64);

impl private::Sealed for f32 {}

impl Primitive for f32 {
    const SIZE: usize = 4;

    fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self {
        f32::from_bits(u32::from_bytes(bytes, endianness))
    }
}

impl private::Sealed for f64 {}

impl Primitive for f64 {
    const SIZE: usize = 8;

    fn from_bytes(bytes: &[u8], endianness: Endianness) -> Self {
        f64::from_bits(u64::from_bytes(bytes, endianness))
    }
}

/// A seekable file reader with explicit endianness and bounds-checked reads.
///
/// The reader owns its file handle and releases it on drop. After a failed
/// read the cursor position is unspecified; callers must [`seek`] before
/// reusing the reader.
///
/// [`seek`]: ByteReader::seek
#[derive(Debug)]
pub struct ByteReader {
    file: Option<File>,
    endianness: Endianness,
    size: u64,
    last_error: Option<String>,
}

impl ByteReader {
    /// Opens the file at `path` for reading in the given byte order.
    ///
    /// An unopenable file yields a reader for which [`is_open`] returns
    /// `false` and every read fails; this mirrors the behavior of the format
    /// probes, which treat unreadable files as unclassifiable rather than as
    /// hard errors.
    ///
    /// [`is_open`]: ByteReader::is_open
    pub fn open<P: AsRef<Path>>(path: P, endianness: Endianness) -> Self {
        match File::open(path.as_ref()) {
            Ok(file) => {
                let size = file.metadata().map(|m| m.len()).unwrap_or(0);
                ByteReader {
                    file: Some(file),
                    endianness,
                    size,
                    last_error: None,
                }
            }
            Err(err) => ByteReader {
                file: None,
                endianness,
                size: 0,
                last_error: Some(format!("cannot open file: {err}")),
            },
        }
    }

    /// Returns `true` if the underlying file was opened successfully.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The byte order used for multi-byte reads.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The total size of the underlying file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The current cursor position, or 0 if the file is not open.
    pub fn position(&mut self) -> u64 {
        match self.file {
            Some(ref mut file) => file.stream_position().unwrap_or(0),
            None => 0,
        }
    }

    /// Returns `true` once the cursor has reached the end of the file.
    pub fn eof(&mut self) -> bool {
        !self.is_open() || self.position() >= self.size
    }

    /// The message of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Clears a recorded failure message.
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn fail<T>(&mut self, message: String) -> io::Result<T> {
        self.last_error = Some(message.clone());
        Err(io::Error::new(io::ErrorKind::Other, message))
    }

    /// Moves the cursor to the absolute position `pos`.
    ///
    /// Seeking past the end of the file is rejected.
    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.size {
            return self.fail(format!("seek past end: {pos} > {}", self.size));
        }
        match self.file {
            Some(ref mut file) => match file.seek(SeekFrom::Start(pos)) {
                Ok(_) => Ok(()),
                Err(err) => self.fail(format!("seek failed: {err}")),
            },
            None => self.fail("file is not open".into()),
        }
    }

    /// Moves the cursor by `offset` bytes relative to the current position.
    pub fn seek_relative(&mut self, offset: i64) -> io::Result<()> {
        let pos = self.position();
        let target = pos as i64 + offset;
        if target < 0 {
            return self.fail(format!("seek before start: {pos} {offset:+}"));
        }
        self.seek(target as u64)
    }

    /// Reads exactly `buf.len()` bytes into `buf`.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self.file {
            Some(ref mut file) => match file.read_exact(buf) {
                Ok(()) => Ok(()),
                Err(err) => self.fail(format!("short read of {} bytes: {err}", buf.len())),
            },
            None => self.fail("file is not open".into()),
        }
    }

    /// Reads one primitive value in the reader's byte order.
    pub fn read<T: Primitive>(&mut self) -> io::Result<T> {
        let mut buf = [0u8; 8];
        let endianness = self.endianness;
        self.read_bytes(&mut buf[..T::SIZE])?;
        Ok(T::from_bytes(&buf[..T::SIZE], endianness))
    }

    /// Reads an unsigned 8-bit integer.
    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.read()
    }

    /// Reads an unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.read()
    }

    /// Reads an unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.read()
    }

    /// Reads an unsigned 64-bit integer.
    pub fn read_u64(&mut self) -> io::Result<u64> {
        self.read()
    }

    /// Reads a signed 8-bit integer.
    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.read()
    }

    /// Reads a signed 16-bit integer.
    pub fn read_i16(&mut self) -> io::Result<i16> {
        self.read()
    }

    /// Reads a signed 32-bit integer.
    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.read()
    }

    /// Reads a signed 64-bit integer.
    pub fn read_i64(&mut self) -> io::Result<i64> {
        self.read()
    }

    /// Reads a 32-bit IEEE float.
    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.read()
    }

    /// Reads a 64-bit IEEE float.
    pub fn read_f64(&mut self) -> io::Result<f64> {
        self.read()
    }

    /// Reads `count` primitive values in the reader's byte order.
    pub fn read_array<T: Primitive>(&mut self, count: usize) -> io::Result<Vec<T>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read()?);
        }
        Ok(values)
    }

    /// Reads `len` bytes and converts them to a string, lossily.
    pub fn read_string(&mut self, len: usize) -> io::Result<String> {
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Stops at the first NUL or after `max_len` bytes, whichever comes first.
    /// The NUL is consumed but not included in the result.
    pub fn read_null_terminated_string(&mut self, max_len: usize) -> io::Result<String> {
        let mut buf = Vec::new();
        for _ in 0..max_len {
            let byte = self.read_u8()?;
            if byte == 0 {
                break;
            }
            buf.push(byte);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads an unsigned LEB128 value of at most [`MAX_LEB128_BYTES`] bytes.
    pub fn read_uleb128(&mut self) -> io::Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_LEB128_BYTES {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        self.fail("unterminated LEB128 value".into())
    }

    /// Reads a signed LEB128 value of at most [`MAX_LEB128_BYTES`] bytes.
    pub fn read_sleb128(&mut self) -> io::Result<i64> {
        let mut result = 0i64;
        let mut shift = 0u32;
        for _ in 0..MAX_LEB128_BYTES {
            let byte = self.read_u8()?;
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
        self.fail("unterminated LEB128 value".into())
    }
}

/// Decodes an unsigned LEB128 value from `data` starting at `*offset`.
///
/// On success the offset is advanced past the value. Returns `None` on
/// truncated input or when the encoding exceeds [`MAX_LEB128_BYTES`], leaving
/// the offset untouched.
pub fn decode_uleb128(data: &[u8], offset: &mut usize) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut pos = *offset;

    for _ in 0..MAX_LEB128_BYTES {
        let byte = *data.get(pos)?;
        pos += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            *offset = pos;
            return Some(result);
        }
        shift += 7;
    }

    None
}

/// Decodes a signed LEB128 value from `data` starting at `*offset`.
///
/// Mirrors [`decode_uleb128`] with sign extension for the final byte.
pub fn decode_sleb128(data: &[u8], offset: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0u32;
    let mut pos = *offset;

    for _ in 0..MAX_LEB128_BYTES {
        let byte = *data.get(pos)?;
        pos += 1;
        result |= i64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                result |= -1i64 << shift;
            }
            *offset = pos;
            return Some(result);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;

    fn fixture(bytes: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_endianness() {
        let tmp = fixture(&[0x01, 0x02, 0x03, 0x04]);

        let mut le = ByteReader::open(tmp.path(), Endianness::Little);
        assert_eq!(le.read_u32().unwrap(), 0x0403_0201);

        let mut be = ByteReader::open(tmp.path(), Endianness::Big);
        assert_eq!(be.read_u16().unwrap(), 0x0102);
        assert_eq!(be.read_u16().unwrap(), 0x0304);
    }

    #[test]
    fn test_signed_and_float() {
        let tmp = fixture(&[0xff, 0x00, 0x00, 0x80, 0x3f]);

        let mut reader = ByteReader::open(tmp.path(), Endianness::Little);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
        assert!(reader.eof());
    }

    #[test]
    fn test_seek_and_position() {
        let tmp = fixture(b"abcdef");

        let mut reader = ByteReader::open(tmp.path(), Endianness::Little);
        assert_eq!(reader.size(), 6);
        reader.seek(4).unwrap();
        assert_eq!(reader.position(), 4);
        reader.seek_relative(-2).unwrap();
        assert_eq!(reader.read_string(2).unwrap(), "cd");

        assert!(reader.seek(7).is_err());
        assert!(reader.last_error().is_some());
        reader.clear_error();
        assert_eq!(reader.last_error(), None);
    }

    #[test]
    fn test_short_read_sets_error() {
        let tmp = fixture(&[0x01]);

        let mut reader = ByteReader::open(tmp.path(), Endianness::Little);
        assert!(reader.read_u32().is_err());
        assert!(reader.last_error().is_some());
    }

    #[test]
    fn test_open_failure() {
        let mut reader = ByteReader::open("/nonexistent/binsight", Endianness::Little);
        assert!(!reader.is_open());
        assert!(reader.read_u8().is_err());
        assert!(reader.last_error().is_some());
    }

    #[test]
    fn test_null_terminated_string() {
        let tmp = fixture(b"hello\0world");

        let mut reader = ByteReader::open(tmp.path(), Endianness::Little);
        assert_eq!(reader.read_null_terminated_string(64).unwrap(), "hello");
        // The NUL is consumed, the cursor sits on 'w'.
        assert_eq!(reader.read_string(5).unwrap(), "world");

        reader.seek(0).unwrap();
        assert_eq!(reader.read_null_terminated_string(3).unwrap(), "hel");
    }

    #[test]
    fn test_read_array() {
        let tmp = fixture(&[0x01, 0x00, 0x02, 0x00, 0x03, 0x00]);

        let mut reader = ByteReader::open(tmp.path(), Endianness::Little);
        assert_eq!(reader.read_array::<u16>(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_reader_leb128() {
        let tmp = fixture(&[0xe5, 0x8e, 0x26, 0x7f]);

        let mut reader = ByteReader::open(tmp.path(), Endianness::Little);
        assert_eq!(reader.read_uleb128().unwrap(), 624_485);
        assert_eq!(reader.read_sleb128().unwrap(), -1);
    }

    #[test]
    fn test_decode_uleb128() {
        let mut offset = 0;
        assert_eq!(decode_uleb128(&[0x00], &mut offset), Some(0));
        assert_eq!(offset, 1);

        let mut offset = 0;
        assert_eq!(decode_uleb128(&[0xe5, 0x8e, 0x26], &mut offset), Some(624_485));
        assert_eq!(offset, 3);

        // Truncated value: offset must not move.
        let mut offset = 0;
        assert_eq!(decode_uleb128(&[0x80], &mut offset), None);
        assert_eq!(offset, 0);

        // Over-long encodings are rejected.
        let mut offset = 0;
        let overlong = [0x80u8; MAX_LEB128_BYTES + 1];
        assert_eq!(decode_uleb128(&overlong, &mut offset), None);
    }

    #[test]
    fn test_decode_sleb128() {
        let mut offset = 0;
        assert_eq!(decode_sleb128(&[0x7f], &mut offset), Some(-1));

        let mut offset = 0;
        assert_eq!(decode_sleb128(&[0xff, 0x7e], &mut offset), Some(-129));

        let mut offset = 0;
        assert_eq!(decode_sleb128(&[0x3f], &mut offset), Some(63));
    }
}
