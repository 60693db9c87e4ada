//! Support for the Executable and Linkable Format, used on Linux.

use std::collections::HashSet;
use std::path::Path;

use debugid::CodeId;
use goblin::elf::{self, Elf};
use scroll::Pread;

use binsight_common::ByteView;

use crate::base::{
    ExtractError, ExtractErrorKind, FileFormat, FileKind, SectionInfo, SymbolInfo,
};
use crate::detector::detect_format;
use crate::extractor::BinaryExtractor;

/// Offset of the version byte in `e_ident`.
const EI_VERSION: usize = 6;

/// Extracts metadata from ELF executables, shared objects and relocatables.
///
/// Symbols come from `SHT_SYMTAB` and `SHT_DYNSYM` paired with their linked
/// string tables; dependencies from `DT_NEEDED`; the build identifier from the
/// `.note.gnu.build-id` section or `PT_NOTE` program headers.
pub struct ElfExtractor {
    verbose: bool,
    include_local_symbols: bool,
    include_file_symbols: bool,
}

impl Default for ElfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ElfExtractor {
    /// Creates an extractor with default configuration.
    ///
    /// Local symbols and `STT_FILE` entries are suppressed by default; enable
    /// them via [`with_local_symbols`] and [`with_file_symbols`] respectively.
    ///
    /// [`with_local_symbols`]: Self::with_local_symbols
    /// [`with_file_symbols`]: Self::with_file_symbols
    pub fn new() -> Self {
        ElfExtractor {
            verbose: false,
            include_local_symbols: false,
            include_file_symbols: false,
        }
    }

    /// Also emits symbols with local binding.
    pub fn with_local_symbols(mut self) -> Self {
        self.include_local_symbols = true;
        self
    }

    /// Also emits `STT_FILE` entries, which name compilation source files.
    pub fn with_file_symbols(mut self) -> Self {
        self.include_file_symbols = true;
        self
    }

    fn with_elf<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&Elf<'_>, &[u8]) -> T,
    ) -> Result<T, ExtractError> {
        let view = ByteView::open(path).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::NotFound,
                format!("cannot open {}", path.display()),
                err,
            )
        })?;

        let elf = Elf::parse(&view).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::Malformed,
                format!("cannot parse ELF file {}", path.display()),
                err,
            )
        })?;

        Ok(f(&elf, &view))
    }

    /// The CPU architecture declared in the ELF header.
    pub fn architecture(&self, path: &Path) -> Result<String, ExtractError> {
        self.with_elf(path, |elf, _| arch_name(elf.header.e_machine).to_string())
    }

    /// The role of the file, as declared by `e_type`.
    pub fn file_kind(&self, path: &Path) -> Result<FileKind, ExtractError> {
        self.with_elf(path, |elf, _| match elf.header.e_type {
            elf::header::ET_EXEC => FileKind::Executable,
            elf::header::ET_DYN => FileKind::SharedLibrary,
            elf::header::ET_REL => FileKind::Object,
            _ => FileKind::Unknown,
        })
    }

    /// Whether the file carries no `SHT_SYMTAB` symbol table.
    pub fn is_stripped(&self, path: &Path) -> Result<bool, ExtractError> {
        self.with_elf(path, |elf, _| elf.syms.is_empty())
    }

    /// The GNU build identifier as a lowercase hex string, if present.
    ///
    /// Searches the `.note.gnu.build-id` section first and falls back to the
    /// `PT_NOTE` program header entries, since compilers and linkers emit
    /// either or both.
    pub fn build_id(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        self.with_elf(path, |elf, data| {
            for header in &elf.section_headers {
                if elf.shdr_strtab.get_at(header.sh_name) != Some(".note.gnu.build-id") {
                    continue;
                }

                let offset = header.sh_offset as usize;
                let size = header.sh_size as usize;
                if let Some(section) = data.get(offset..offset.saturating_add(size)) {
                    if let Some(id) = parse_build_id_note(section, elf.little_endian) {
                        return Some(id);
                    }
                }
            }

            // Older toolchains only emit the PT_NOTE program header entry.
            for header in &elf.program_headers {
                if header.p_type != elf::program_header::PT_NOTE {
                    continue;
                }

                let offset = header.p_offset as usize;
                let size = header.p_filesz as usize;
                if let Some(segment) = data.get(offset..offset.saturating_add(size)) {
                    if let Some(id) = parse_build_id_note(segment, elf.little_endian) {
                        return Some(id);
                    }
                }
            }

            None
        })
    }
}

impl BinaryExtractor for ElfExtractor {
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        self.with_elf(path, |elf, _| {
            let mut symbols = Vec::new();
            let mut seen = HashSet::new();

            let tables = [
                (&elf.syms, &elf.strtab),
                (&elf.dynsyms, &elf.dynstrtab),
            ];

            for (table, strtab) in tables {
                for sym in table.iter() {
                    let name = match strtab.get_at(sym.st_name) {
                        Some(name) if !name.is_empty() => name,
                        _ => continue,
                    };

                    if sym.st_type() == elf::sym::STT_FILE && !self.include_file_symbols {
                        continue;
                    }

                    let bind = sym.st_bind();
                    if bind == elf::sym::STB_LOCAL && !self.include_local_symbols {
                        continue;
                    }

                    if !seen.insert((name.to_string(), sym.st_value)) {
                        continue;
                    }

                    let section = elf
                        .section_headers
                        .get(sym.st_shndx)
                        .and_then(|header| elf.shdr_strtab.get_at(header.sh_name))
                        .unwrap_or("")
                        .to_string();

                    symbols.push(SymbolInfo {
                        name: name.to_string(),
                        address: sym.st_value,
                        size: sym.st_size,
                        defined: sym.st_type() != elf::sym::STT_NOTYPE
                            && sym.st_shndx != elf::section_header::SHN_UNDEF as usize,
                        global: bind == elf::sym::STB_GLOBAL,
                        weak: bind == elf::sym::STB_WEAK,
                        section,
                    });
                }
            }

            if self.verbose {
                tracing::debug!(
                    path = %path.display(),
                    count = symbols.len(),
                    "extracted ELF symbols"
                );
            }

            symbols
        })
    }

    fn extract_sections(&self, path: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
        self.with_elf(path, |elf, _| {
            elf.section_headers
                .iter()
                .map(|header| SectionInfo {
                    name: elf
                        .shdr_strtab
                        .get_at(header.sh_name)
                        .unwrap_or("")
                        .to_string(),
                    kind: section_type_name(header.sh_type).to_string(),
                    address: header.sh_addr,
                    size: header.sh_size,
                    flags: header.sh_flags,
                })
                .collect()
        })
    }

    fn extract_version(&self, path: &Path) -> Result<String, ExtractError> {
        self.with_elf(path, |elf, _| {
            format!(
                "ELF{}-v{}-{}",
                if elf.is_64 { "64" } else { "32" },
                elf.header.e_ident[EI_VERSION],
                arch_name(elf.header.e_machine),
            )
        })
    }

    fn extract_dependencies(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        self.with_elf(path, |elf, _| {
            let mut seen = HashSet::new();
            elf.libraries
                .iter()
                .filter(|lib| seen.insert(**lib))
                .map(|lib| lib.to_string())
                .collect()
        })
    }

    fn can_handle(&self, path: &Path) -> bool {
        detect_format(path) == FileFormat::Elf
    }

    fn format_name(&self) -> &'static str {
        "ELF"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

/// Maps an `e_machine` value to a human-readable architecture name.
pub(crate) fn arch_name(machine: u16) -> &'static str {
    match machine {
        elf::header::EM_386 => "x86",
        elf::header::EM_X86_64 => "x86_64",
        elf::header::EM_ARM => "arm",
        elf::header::EM_AARCH64 => "aarch64",
        elf::header::EM_MIPS => "mips",
        elf::header::EM_PPC64 => "ppc64",
        elf::header::EM_S390 => "s390x",
        elf::header::EM_RISCV => "riscv64",
        _ => "unknown",
    }
}

fn section_type_name(sh_type: u32) -> &'static str {
    match sh_type {
        elf::section_header::SHT_NULL => "NULL",
        elf::section_header::SHT_PROGBITS => "PROGBITS",
        elf::section_header::SHT_SYMTAB => "SYMTAB",
        elf::section_header::SHT_STRTAB => "STRTAB",
        elf::section_header::SHT_RELA => "RELA",
        elf::section_header::SHT_HASH => "HASH",
        elf::section_header::SHT_DYNAMIC => "DYNAMIC",
        elf::section_header::SHT_NOTE => "NOTE",
        elf::section_header::SHT_NOBITS => "NOBITS",
        elf::section_header::SHT_REL => "REL",
        elf::section_header::SHT_SHLIB => "SHLIB",
        elf::section_header::SHT_DYNSYM => "DYNSYM",
        _ => "UNKNOWN",
    }
}

/// Parses a GNU build-id note from raw note-section data.
///
/// The layout is a 12-byte header of `namesz`, `descsz` and `type` words,
/// followed by the padded name and descriptor. Returns the descriptor as a
/// lowercase hex string when the note is an `NT_GNU_BUILD_ID`.
pub(crate) fn parse_build_id_note(data: &[u8], little_endian: bool) -> Option<String> {
    let ctx = if little_endian { scroll::LE } else { scroll::BE };

    let mut offset = 0;
    while offset + 12 <= data.len() {
        let namesz: u32 = data.pread_with(offset, ctx).ok()?;
        let descsz: u32 = data.pread_with(offset + 4, ctx).ok()?;
        let n_type: u32 = data.pread_with(offset + 8, ctx).ok()?;
        offset += 12;

        let name_end = offset.checked_add(namesz as usize)?;
        let desc_start = name_end.checked_add(name_end.wrapping_neg() & 3)?;
        let desc_end = desc_start.checked_add(descsz as usize)?;
        if desc_end > data.len() {
            return None;
        }

        let name = &data[offset..name_end];
        let desc = &data[desc_start..desc_end];

        if n_type == elf::note::NT_GNU_BUILD_ID && name == b"GNU\0" && !desc.is_empty() {
            return Some(CodeId::from_binary(desc).to_string());
        }

        // Notes are 4-byte aligned; continue with the next entry.
        offset = desc_end + (desc_end.wrapping_neg() & 3);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_arch_name() {
        assert_eq!(arch_name(elf::header::EM_X86_64), "x86_64");
        assert_eq!(arch_name(elf::header::EM_AARCH64), "aarch64");
        assert_eq!(arch_name(0xffff), "unknown");
    }

    #[test]
    fn test_section_type_name() {
        assert_eq!(section_type_name(elf::section_header::SHT_SYMTAB), "SYMTAB");
        assert_eq!(section_type_name(elf::section_header::SHT_DYNSYM), "DYNSYM");
        assert_eq!(section_type_name(0xdead_beef), "UNKNOWN");
    }

    #[test]
    fn test_parse_build_id_note() {
        // namesz=4, descsz=8, type=NT_GNU_BUILD_ID, "GNU\0", descriptor.
        let mut note = Vec::new();
        note.extend_from_slice(&4u32.to_le_bytes());
        note.extend_from_slice(&8u32.to_le_bytes());
        note.extend_from_slice(&3u32.to_le_bytes());
        note.extend_from_slice(b"GNU\0");
        note.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04]);

        assert_eq!(
            parse_build_id_note(&note, true).as_deref(),
            Some("deadbeef01020304")
        );
    }

    #[test]
    fn test_parse_build_id_note_skips_foreign_notes() {
        // An ABI-tag note (type 1) precedes the build id.
        let mut note = Vec::new();
        note.extend_from_slice(&4u32.to_le_bytes());
        note.extend_from_slice(&4u32.to_le_bytes());
        note.extend_from_slice(&1u32.to_le_bytes());
        note.extend_from_slice(b"GNU\0");
        note.extend_from_slice(&[0, 0, 0, 0]);

        note.extend_from_slice(&4u32.to_le_bytes());
        note.extend_from_slice(&2u32.to_le_bytes());
        note.extend_from_slice(&3u32.to_le_bytes());
        note.extend_from_slice(b"GNU\0");
        note.extend_from_slice(&[0xab, 0xcd, 0x00, 0x00]);

        assert_eq!(parse_build_id_note(&note, true).as_deref(), Some("abcd"));
    }

    #[test]
    fn test_parse_build_id_note_truncated() {
        let mut note = Vec::new();
        note.extend_from_slice(&4u32.to_le_bytes());
        note.extend_from_slice(&32u32.to_le_bytes());
        note.extend_from_slice(&3u32.to_le_bytes());
        note.extend_from_slice(b"GNU\0");
        // Descriptor cut short.
        note.extend_from_slice(&[0xab]);

        assert_eq!(parse_build_id_note(&note, true), None);
    }
}
