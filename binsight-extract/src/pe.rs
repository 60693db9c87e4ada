//! Support for Portable Executables, an extension of COFF used on Windows.

use std::collections::HashSet;
use std::path::Path;

use goblin::pe::PE;

use binsight_common::ByteView;

use crate::base::{
    ExtractError, ExtractErrorKind, FileFormat, FileKind, SectionInfo, SymbolInfo,
};
use crate::detector::detect_format;
use crate::extractor::BinaryExtractor;

const MACHINE_I386: u16 = 0x014C;
const MACHINE_AMD64: u16 = 0x8664;
const MACHINE_ARM: u16 = 0x01C0;
const MACHINE_ARMNT: u16 = 0x01C4;
const MACHINE_ARM64: u16 = 0xAA64;
const MACHINE_IA64: u16 = 0x0200;
const MACHINE_POWERPC: u16 = 0x01F0;
const MACHINE_POWERPCFP: u16 = 0x01F1;

const IMAGE_SYM_CLASS_EXTERNAL: u8 = 2;
const IMAGE_SYM_CLASS_WEAK_EXTERNAL: u8 = 105;

const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;
const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
const IMAGE_SCN_CNT_UNINITIALIZED_DATA: u32 = 0x0000_0080;

/// Extracts metadata from Portable Executables.
///
/// The DOS header and NT signature are validated by the underlying parser;
/// symbols come from the COFF symbol table and dependencies from the import
/// table. Version resources (`VS_VERSIONINFO`) are not parsed; the version is
/// reported as a `PE32{+}-<arch>` format descriptor instead.
pub struct PeExtractor {
    verbose: bool,
}

impl Default for PeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PeExtractor {
    /// Creates an extractor with default configuration.
    pub fn new() -> Self {
        PeExtractor { verbose: false }
    }

    fn with_pe<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&PE<'_>, &[u8]) -> T,
    ) -> Result<T, ExtractError> {
        let view = ByteView::open(path).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::NotFound,
                format!("cannot open {}", path.display()),
                err,
            )
        })?;

        let pe = PE::parse(&view).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::Malformed,
                format!("cannot parse PE file {}", path.display()),
                err,
            )
        })?;

        Ok(f(&pe, &view))
    }

    /// The CPU architecture declared in the COFF file header.
    pub fn architecture(&self, path: &Path) -> Result<String, ExtractError> {
        self.with_pe(path, |pe, _| {
            machine_name(pe.header.coff_header.machine).to_string()
        })
    }

    /// Whether the machine field declares a 64-bit architecture.
    pub fn is_64_bit(&self, path: &Path) -> Result<bool, ExtractError> {
        self.with_pe(path, |pe, _| {
            matches!(pe.header.coff_header.machine, MACHINE_AMD64 | MACHINE_ARM64)
        })
    }

    /// The role of the file: a DLL or an executable image.
    pub fn file_kind(&self, path: &Path) -> Result<FileKind, ExtractError> {
        self.with_pe(path, |pe, _| {
            if pe.is_lib {
                FileKind::SharedLibrary
            } else {
                FileKind::Executable
            }
        })
    }

    /// Whether the COFF symbol table is absent.
    pub fn is_stripped(&self, path: &Path) -> Result<bool, ExtractError> {
        self.with_pe(path, |pe, _| {
            pe.header.coff_header.number_of_symbol_table == 0
        })
    }
}

impl BinaryExtractor for PeExtractor {
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        self.with_pe(path, |pe, data| {
            let coff = &pe.header.coff_header;
            let symtab = match coff.symbols(data) {
                Ok(Some(symtab)) => symtab,
                Ok(None) | Err(_) => return Vec::new(),
            };
            let strtab = coff.strings(data).ok().flatten();

            let mut symbols = Vec::new();
            let mut seen = HashSet::new();

            for (_index, inline_name, symbol) in symtab.iter() {
                let name = match inline_name {
                    Some(name) => name.to_string(),
                    None => match (symbol.name_offset(), strtab.as_ref()) {
                        (Some(offset), Some(strtab)) => strtab
                            .get_at(offset as usize)
                            .unwrap_or("")
                            .to_string(),
                        _ => String::new(),
                    },
                };

                if name.is_empty() {
                    continue;
                }

                if !seen.insert((name.clone(), u64::from(symbol.value))) {
                    continue;
                }

                let section = if symbol.section_number > 0 {
                    pe.sections
                        .get(symbol.section_number as usize - 1)
                        .and_then(|section| section.name().ok())
                        .unwrap_or("")
                        .to_string()
                } else {
                    String::new()
                };

                symbols.push(SymbolInfo {
                    name,
                    address: u64::from(symbol.value),
                    size: 0,
                    defined: symbol.section_number > 0,
                    global: symbol.storage_class == IMAGE_SYM_CLASS_EXTERNAL,
                    weak: symbol.storage_class == IMAGE_SYM_CLASS_WEAK_EXTERNAL,
                    section,
                });
            }

            if self.verbose {
                tracing::debug!(
                    path = %path.display(),
                    count = symbols.len(),
                    "extracted COFF symbols"
                );
            }

            symbols
        })
    }

    fn extract_sections(&self, path: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
        self.with_pe(path, |pe, _| {
            pe.sections
                .iter()
                .map(|section| SectionInfo {
                    name: section.name().unwrap_or("").to_string(),
                    kind: section_type_name(section.characteristics).to_string(),
                    address: u64::from(section.virtual_address),
                    size: u64::from(section.virtual_size),
                    flags: u64::from(section.characteristics),
                })
                .collect()
        })
    }

    fn extract_version(&self, path: &Path) -> Result<String, ExtractError> {
        self.with_pe(path, |pe, _| {
            let machine = pe.header.coff_header.machine;
            let wide = if matches!(machine, MACHINE_AMD64 | MACHINE_ARM64) {
                "PE32+"
            } else {
                "PE32"
            };
            format!("{}-{}", wide, machine_name(machine))
        })
    }

    fn extract_dependencies(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        self.with_pe(path, |pe, _| {
            let mut seen = HashSet::new();
            pe.libraries
                .iter()
                .filter(|lib| seen.insert(**lib))
                .map(|lib| lib.to_string())
                .collect()
        })
    }

    fn can_handle(&self, path: &Path) -> bool {
        detect_format(path) == FileFormat::Pe
    }

    fn format_name(&self) -> &'static str {
        "PE"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

/// Maps a COFF machine value to a human-readable architecture name.
pub(crate) fn machine_name(machine: u16) -> &'static str {
    match machine {
        MACHINE_I386 => "x86",
        MACHINE_AMD64 => "x64",
        MACHINE_ARM | MACHINE_ARMNT => "ARM",
        MACHINE_ARM64 => "ARM64",
        MACHINE_IA64 => "IA64",
        MACHINE_POWERPC => "PowerPC",
        MACHINE_POWERPCFP => "PowerPC FP",
        _ => "Unknown",
    }
}

fn section_type_name(characteristics: u32) -> &'static str {
    if characteristics & IMAGE_SCN_CNT_CODE != 0 {
        "CODE"
    } else if characteristics & IMAGE_SCN_CNT_INITIALIZED_DATA != 0 {
        "DATA"
    } else if characteristics & IMAGE_SCN_CNT_UNINITIALIZED_DATA != 0 {
        "BSS"
    } else {
        "SECTION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_machine_name() {
        assert_eq!(machine_name(MACHINE_I386), "x86");
        assert_eq!(machine_name(MACHINE_AMD64), "x64");
        assert_eq!(machine_name(MACHINE_ARM64), "ARM64");
        assert_eq!(machine_name(MACHINE_POWERPCFP), "PowerPC FP");
        assert_eq!(machine_name(0x0000), "Unknown");
    }

    #[test]
    fn test_section_type_name() {
        assert_eq!(section_type_name(IMAGE_SCN_CNT_CODE), "CODE");
        assert_eq!(section_type_name(IMAGE_SCN_CNT_INITIALIZED_DATA), "DATA");
        assert_eq!(section_type_name(IMAGE_SCN_CNT_UNINITIALIZED_DATA), "BSS");
        assert_eq!(section_type_name(0), "SECTION");
    }
}
