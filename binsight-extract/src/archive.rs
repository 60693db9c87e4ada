//! Support for Unix `ar` archives, used for static libraries.
//!
//! Archives are a sequence of 60-byte ASCII member headers followed by the
//! member payload, padded to even offsets. The GNU dialect stores long member
//! names in a `//` table and the symbol index in a `/` member; the BSD dialect
//! uses `__.SYMDEF` members for the index. Thin archives (`!<thin>\n`) store
//! path references instead of payload bytes.

use std::collections::HashMap;
use std::path::Path;

use binsight_common::{ByteReader, Endianness};

use crate::base::{
    ExtractError, ExtractErrorKind, FileFormat, SectionInfo, SymbolInfo,
};
use crate::detector::detect_format;
use crate::extractor::BinaryExtractor;

const HEADER_SIZE: u64 = 60;

/// One member of a Unix archive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveMember {
    /// The member's file name.
    pub name: String,
    /// The name resolved from the long-name table, when the header carried a
    /// reference instead of the name itself. Empty otherwise.
    pub long_name: String,
    /// File offset of the member's payload within the archive.
    pub offset: u64,
    /// Size of the member payload in bytes.
    pub size: u64,
    /// Modification time as seconds since the epoch.
    pub modification_time: u64,
    /// Owner id field, as recorded.
    pub owner: String,
    /// Group id field, as recorded.
    pub group: String,
    /// File mode field, as recorded (octal).
    pub mode: String,
    /// Names of symbols the archive index attributes to this member.
    pub symbols: Vec<String>,
}

/// The parsed structure of an archive: its members and its symbol index.
#[derive(Debug, Default)]
struct ArchiveLayout {
    thin: bool,
    members: Vec<ArchiveMember>,
    /// Symbols from the System V index that could not be attributed to a member.
    orphan_symbols: Vec<String>,
}

/// Extracts metadata from traditional and thin `ar` archives.
pub struct ArchiveExtractor {
    verbose: bool,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractor {
    /// Creates an extractor with default configuration.
    pub fn new() -> Self {
        ArchiveExtractor { verbose: false }
    }

    /// Enumerates the archive's members.
    ///
    /// Long-name and symbol-index members (`/`, `//`, `__.SYMDEF*`) are
    /// consumed to resolve names and attribute symbols but are excluded from
    /// the returned list.
    pub fn members(&self, path: &Path) -> Result<Vec<ArchiveMember>, ExtractError> {
        Ok(self.parse(path)?.members)
    }

    /// Returns `true` if the archive is a thin archive.
    pub fn is_thin(&self, path: &Path) -> Result<bool, ExtractError> {
        Ok(self.parse(path)?.thin)
    }

    fn parse(&self, path: &Path) -> Result<ArchiveLayout, ExtractError> {
        let mut reader = ByteReader::open(path, Endianness::Big);
        if !reader.is_open() {
            return Err(ExtractError::new(
                ExtractErrorKind::NotFound,
                format!("cannot open {}", path.display()),
            ));
        }

        let magic = reader.read_string(8).map_err(|err| {
            ExtractError::with_source(ExtractErrorKind::Truncated, "archive magic unreadable", err)
        })?;
        let thin = match magic.as_str() {
            "!<arch>\n" => false,
            "!<thin>\n" => true,
            _ => {
                return Err(ExtractError::new(
                    ExtractErrorKind::Malformed,
                    format!("{} is not an ar archive", path.display()),
                ))
            }
        };

        let mut layout = ArchiveLayout {
            thin,
            ..Default::default()
        };

        let mut long_names: Vec<u8> = Vec::new();
        // System V index entries: (member header offset, symbol name).
        let mut index: Vec<(u64, String)> = Vec::new();
        // Maps a member's header offset to its position in `layout.members`.
        let mut header_offsets: HashMap<u64, usize> = HashMap::new();

        let file_size = reader.size();
        let mut pos = 8u64;

        while pos + HEADER_SIZE <= file_size {
            if reader.seek(pos).is_err() {
                break;
            }

            let raw_name = match reader.read_string(16) {
                Ok(name) => name,
                Err(_) => break,
            };
            let date = read_field(&mut reader, 12);
            let owner = read_field(&mut reader, 6);
            let group = read_field(&mut reader, 6);
            let mode = read_field(&mut reader, 8);
            let size_field = read_field(&mut reader, 10);
            let terminator = reader.read_string(2).unwrap_or_default();
            if terminator != "\x60\x0a" {
                break;
            }

            // The size field is ASCII decimal per the ar format.
            let size: u64 = match size_field.parse() {
                Ok(size) => size,
                Err(_) => break,
            };

            let payload_offset = pos + HEADER_SIZE;
            let name = raw_name.trim_end().to_string();

            // Thin archives carry no payload bytes for regular members; only
            // the metadata members are stored inline.
            let is_meta = name == "/" || name == "//" || name.starts_with("__.SYMDEF");
            let stored = !thin || is_meta;

            // An inline payload cannot be larger than the archive itself.
            if stored && size > file_size {
                break;
            }

            if name == "/" {
                if let Ok(data) = read_payload(&mut reader, payload_offset, size) {
                    index = parse_sysv_index(&data);
                }
            } else if name == "//" {
                if let Ok(data) = read_payload(&mut reader, payload_offset, size) {
                    long_names = data;
                }
            } else if name.starts_with("__.SYMDEF") {
                // BSD symbol index; consumed but not parsed.
            } else {
                let (display, long_name) = resolve_name(&name, &long_names);
                header_offsets.insert(pos, layout.members.len());
                layout.members.push(ArchiveMember {
                    name: display,
                    long_name,
                    offset: payload_offset,
                    size,
                    modification_time: date.parse().unwrap_or(0),
                    owner,
                    group,
                    mode,
                    symbols: Vec::new(),
                });
            }

            pos = if stored {
                let padded = size + (size & 1);
                payload_offset + padded
            } else {
                payload_offset
            };
        }

        for (member_offset, symbol) in index {
            match header_offsets.get(&member_offset) {
                Some(&idx) => layout.members[idx].symbols.push(symbol),
                None => layout.orphan_symbols.push(symbol),
            }
        }

        if self.verbose {
            tracing::debug!(
                path = %path.display(),
                members = layout.members.len(),
                thin = layout.thin,
                "parsed archive"
            );
        }

        Ok(layout)
    }
}

fn read_field(reader: &mut ByteReader, len: usize) -> String {
    reader
        .read_string(len)
        .map(|field| field.trim_end().to_string())
        .unwrap_or_default()
}

fn read_payload(
    reader: &mut ByteReader,
    offset: u64,
    size: u64,
) -> Result<Vec<u8>, ExtractError> {
    reader.seek(offset).map_err(|err| {
        ExtractError::with_source(ExtractErrorKind::Truncated, "member payload past EOF", err)
    })?;
    let mut data = vec![0u8; size as usize];
    reader.read_bytes(&mut data).map_err(|err| {
        ExtractError::with_source(ExtractErrorKind::Truncated, "member payload short read", err)
    })?;
    Ok(data)
}

/// Resolves a raw header name against the GNU long-name table.
///
/// Returns the display name and, when the header held a `/offset` reference,
/// the resolved long name.
fn resolve_name(raw: &str, long_names: &[u8]) -> (String, String) {
    if let Some(offset) = raw.strip_prefix('/').and_then(|rest| rest.parse::<usize>().ok()) {
        if offset < long_names.len() {
            let tail = &long_names[offset..];
            let end = tail
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or(tail.len());
            let long = String::from_utf8_lossy(&tail[..end])
                .trim_end_matches('/')
                .to_string();
            return (long.clone(), long);
        }
    }

    // GNU terminates inline names with a slash.
    let name = raw.strip_suffix('/').unwrap_or(raw);
    (name.to_string(), String::new())
}

/// Parses the System V symbol index: a big-endian count, that many big-endian
/// member header offsets, then the symbol names as NUL-terminated strings.
fn parse_sysv_index(data: &[u8]) -> Vec<(u64, String)> {
    if data.len() < 4 {
        return Vec::new();
    }

    let count = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let offsets_end = match 4usize.checked_add(count.checked_mul(4).unwrap_or(usize::MAX)) {
        Some(end) if end <= data.len() => end,
        _ => return Vec::new(),
    };

    let mut entries = Vec::with_capacity(count);
    let mut name_pos = offsets_end;

    for i in 0..count {
        let base = 4 + i * 4;
        let offset = u32::from_be_bytes([
            data[base],
            data[base + 1],
            data[base + 2],
            data[base + 3],
        ]);

        let tail = &data[name_pos.min(data.len())..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        let name = String::from_utf8_lossy(&tail[..end]).into_owned();
        name_pos += end + 1;

        if !name.is_empty() {
            entries.push((u64::from(offset), name));
        }
    }

    entries
}

impl BinaryExtractor for ArchiveExtractor {
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        let layout = self.parse(path)?;

        let mut symbols = Vec::new();
        for member in &layout.members {
            for name in &member.symbols {
                symbols.push(SymbolInfo {
                    name: name.clone(),
                    address: 0,
                    size: 0,
                    defined: true,
                    global: true,
                    weak: false,
                    section: member.name.clone(),
                });
            }
        }
        for name in layout.orphan_symbols {
            // Index entries whose member header could not be located.
            symbols.push(SymbolInfo {
                name,
                defined: true,
                global: true,
                section: "archive_index".to_string(),
                ..Default::default()
            });
        }

        Ok(symbols)
    }

    fn extract_sections(&self, path: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
        let layout = self.parse(path)?;
        Ok(layout
            .members
            .iter()
            .map(|member| SectionInfo {
                name: member.name.clone(),
                kind: "archive_member".to_string(),
                address: member.offset,
                size: member.size,
                flags: 0,
            })
            .collect())
    }

    fn extract_version(&self, path: &Path) -> Result<String, ExtractError> {
        let layout = self.parse(path)?;
        Ok(if layout.thin { "ar-thin" } else { "ar" }.to_string())
    }

    fn extract_dependencies(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        // Archives have no intrinsic dependencies; members that look like
        // shared libraries are surfaced as a weak hint.
        let layout = self.parse(path)?;
        Ok(layout
            .members
            .iter()
            .filter(|member| {
                member.name.ends_with(".so")
                    || member.name.contains(".so.")
                    || member.name.ends_with(".dll")
                    || member.name.ends_with(".dylib")
            })
            .map(|member| member.name.clone())
            .collect())
    }

    fn can_handle(&self, path: &Path) -> bool {
        detect_format(path) == FileFormat::Archive
    }

    fn format_name(&self) -> &'static str {
        "Archive"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_resolve_inline_name() {
        assert_eq!(resolve_name("foo.o/", &[]), ("foo.o".into(), String::new()));
        assert_eq!(resolve_name("bar.o", &[]), ("bar.o".into(), String::new()));
    }

    #[test]
    fn test_resolve_long_name() {
        let table = b"very_long_member_name.o/\nanother.o/\n";
        assert_eq!(
            resolve_name("/0", table),
            (
                "very_long_member_name.o".into(),
                "very_long_member_name.o".into()
            )
        );
        assert_eq!(resolve_name("/25", table), ("another.o".into(), "another.o".into()));
        // Out-of-range references fall back to the raw name.
        assert_eq!(resolve_name("/99", table), ("/99".into(), String::new()));
    }

    #[test]
    fn test_parse_sysv_index() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&132u32.to_be_bytes());
        data.extend_from_slice(b"alpha\0beta\0");

        assert_eq!(
            parse_sysv_index(&data),
            vec![(8, "alpha".to_string()), (132, "beta".to_string())]
        );
    }

    #[test]
    fn test_parse_sysv_index_malformed() {
        assert_eq!(parse_sysv_index(&[]), vec![]);
        // Count larger than the payload.
        let mut data = Vec::new();
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(parse_sysv_index(&data), vec![]);
    }
}
