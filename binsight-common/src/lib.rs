//! Common functionality for `binsight`.
//!
//! This crate exposes the byte-level and path-level plumbing shared by the
//! format parsers in `binsight-extract`:
//!
//!  - [`ByteView`]: Gives access to binary data in-memory or on the file system.
//!  - [`ByteReader`]: A seekable, explicitly endian file reader with
//!    bounds-checked primitive reads.
//!  - LEB128/ULEB128 slice decoders used throughout DWARF parsing.
//!  - Functions and utilities to deal with file system paths.
//!
//! This module is part of the `binsight` workspace.

#![warn(missing_docs)]

mod byteview;
mod path;
mod reader;

pub use crate::byteview::*;
pub use crate::path::*;
pub use crate::reader::*;
