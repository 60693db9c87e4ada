use std::path::Path;

use crate::base::{ExtractError, SectionInfo, SymbolInfo};

/// The capability contract shared by every binary extractor.
///
/// One implementation exists per container format (ELF, Mach-O, PE, archive,
/// Ada ALI) plus one for DWARF debug information. Extractors are stateless
/// apart from configuration flags; all operations take the file path and read
/// the file fresh, so results never depend on call order.
///
/// The debug-oriented methods default to empty results; only the DWARF
/// extractor is required to implement them.
pub trait BinaryExtractor: Send + Sync {
    /// Extracts all symbols from the file's symbol tables.
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError>;

    /// Extracts all sections of the file.
    fn extract_sections(&self, path: &Path) -> Result<Vec<SectionInfo>, ExtractError>;

    /// Extracts a version string, best-effort.
    ///
    /// When the format carries no semantic version this returns a format
    /// descriptor such as `ELF64-v1-x86_64`.
    fn extract_version(&self, path: &Path) -> Result<String, ExtractError>;

    /// Extracts the names of dynamic library dependencies.
    fn extract_dependencies(&self, path: &Path) -> Result<Vec<String>, ExtractError>;

    /// Extracts function names from debug information.
    fn extract_functions(&self, _path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(Vec::new())
    }

    /// Extracts compile unit names from debug information.
    fn extract_compile_units(&self, _path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(Vec::new())
    }

    /// Extracts source file paths from debug information.
    fn extract_source_files(&self, _path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(Vec::new())
    }

    /// Returns `true` if this extractor can process the given file.
    fn can_handle(&self, path: &Path) -> bool;

    /// The display name of the format this extractor handles.
    fn format_name(&self) -> &'static str;

    /// Rank used to order competing extractors; a lower rank is preferred.
    ///
    /// The DWARF extractor ranks behind every format-specific parser so that
    /// dispatch always selects a format parser as primary.
    fn priority(&self) -> i32;

    /// Enables or disables verbose diagnostics for this extractor.
    fn set_verbose(&mut self, _verbose: bool) {}
}
