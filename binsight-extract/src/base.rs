use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An error returned for unknown or invalid [`FileFormat`]s.
#[derive(Debug)]
pub struct UnknownFileFormatError;

impl fmt::Display for UnknownFileFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown file format")
    }
}

impl Error for UnknownFileFormatError {}

/// Represents the physical object file format.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Default)]
pub enum FileFormat {
    /// An unknown file format.
    #[default]
    Unknown,
    /// Executable and Linkable Format, used on Linux.
    Elf,
    /// Mach Objects, used on macOS and iOS derivatives.
    MachO,
    /// Portable Executable, an extension of COFF used on Windows.
    Pe,
    /// Unix `ar` archive, used for static libraries.
    Archive,
    /// Compiled Java class file.
    JavaClass,
    /// WASM container.
    Wasm,
}

impl FileFormat {
    /// Returns the name of the file format.
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Unknown => "unknown",
            FileFormat::Elf => "elf",
            FileFormat::MachO => "macho",
            FileFormat::Pe => "pe",
            FileFormat::Archive => "archive",
            FileFormat::JavaClass => "java",
            FileFormat::Wasm => "wasm",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileFormat {
    type Err = UnknownFileFormatError;

    fn from_str(string: &str) -> Result<FileFormat, UnknownFileFormatError> {
        Ok(match string {
            "elf" => FileFormat::Elf,
            "macho" => FileFormat::MachO,
            "pe" => FileFormat::Pe,
            "archive" => FileFormat::Archive,
            "java" => FileFormat::JavaClass,
            "wasm" => FileFormat::Wasm,
            _ => return Err(UnknownFileFormatError),
        })
    }
}

/// Classifies what role a file plays on disk, independent of its container format.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Default, Serialize, Deserialize)]
pub enum FileKind {
    /// The role could not be determined.
    #[default]
    Unknown,
    /// A standalone executable program.
    Executable,
    /// A dynamic shared library (`.so`, `.dylib`, `.dll`).
    SharedLibrary,
    /// A static library archive (`.a`, `.lib`).
    StaticLibrary,
    /// An intermediate relocatable object file.
    Object,
    /// A source-level artifact, such as an Ada library information file.
    Source,
}

impl FileKind {
    /// Returns the name of the file kind.
    pub fn name(self) -> &'static str {
        match self {
            FileKind::Unknown => "Unknown",
            FileKind::Executable => "Executable",
            FileKind::SharedLibrary => "SharedLibrary",
            FileKind::StaticLibrary => "StaticLibrary",
            FileKind::Object => "Object",
            FileKind::Source => "Source",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A symbol from a symbol table.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// The name of the symbol, generally mangled.
    pub name: String,
    /// The value of the symbol, usually its address within the image.
    pub address: u64,
    /// The size of this symbol, if known.
    pub size: u64,
    /// Whether the symbol is defined in this object, as opposed to imported.
    pub defined: bool,
    /// Whether the symbol has global binding.
    pub global: bool,
    /// Whether the symbol has weak binding.
    pub weak: bool,
    /// The name of the section the symbol lives in, if resolved.
    pub section: String,
}

impl fmt::Debug for SymbolInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolInfo")
            .field("name", &self.name)
            .field("address", &format_args!("{:#x}", self.address))
            .field("size", &format_args!("{:#x}", self.size))
            .field("defined", &self.defined)
            .field("global", &self.global)
            .field("weak", &self.weak)
            .field("section", &self.section)
            .finish()
    }
}

/// A section of an object file.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    /// The name of the section.
    pub name: String,
    /// A label describing the section type, such as `PROGBITS` or `archive_member`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Memory address of this section in virtual memory.
    pub address: u64,
    /// Size of the section in bytes.
    pub size: u64,
    /// Format-specific section flags.
    pub flags: u64,
}

impl fmt::Debug for SectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionInfo")
            .field("name", &self.name)
            .field("type", &self.kind)
            .field("address", &format_args!("{:#x}", self.address))
            .field("size", &format_args!("{:#x}", self.size))
            .field("flags", &format_args!("{:#x}", self.flags))
            .finish()
    }
}

/// One architecture slice of a fat Mach-O container.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureInfo {
    /// Human-readable architecture name, such as `x86_64` or `arm64`.
    pub name: String,
    /// Raw Mach-O CPU type.
    pub cpu_type: u32,
    /// Raw Mach-O CPU subtype.
    pub cpu_subtype: u32,
    /// File offset of the architecture's image within the container.
    pub offset: u64,
    /// Size of the architecture's image in bytes.
    pub size: u64,
    /// Alignment of the image as a power of two.
    pub align: u32,
}

/// Target platform facts recovered from an object file.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// CPU architecture of the primary image.
    pub architecture: String,
    /// Operating system or platform name, such as `macos`.
    pub platform: String,
    /// Minimum OS version the image declares, if any.
    pub min_version: String,
    /// SDK version the image was built against, if any.
    pub sdk_version: String,
    /// Whether the image targets a simulator environment.
    pub is_simulator: bool,
}

/// Build configuration facts recovered from an object file.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// The source version recorded by the build system.
    pub source_version: String,
    /// The build tool version recorded by the build system.
    pub build_version: String,
    /// The minimum OS version recorded by the build system.
    pub min_os_version: String,
}

/// The single output record produced for one input file.
///
/// A `ComponentInfo` is created by the caller with at least its `file_path`
/// set, handed to the aggregator for one extraction call, and owned by the
/// caller afterwards. Parsers never retain references to it across calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Component name derived from the file name.
    pub name: String,
    /// Component version; empty if unknown.
    pub version: String,
    /// Path of the input file; identifies the component.
    pub file_path: String,
    /// Size of the input file in bytes.
    pub file_size: u64,
    /// Role classification of the input file.
    pub file_type: FileKind,
    /// Symbols found in the file's symbol tables, in emission order.
    pub symbols: Vec<SymbolInfo>,
    /// Sections of the file, in header order.
    pub sections: Vec<SectionInfo>,
    /// Names of dynamic library dependencies, duplicates removed.
    pub dependencies: Vec<String>,
    /// Function names recovered from debug information.
    pub functions: Vec<String>,
    /// Compile unit names recovered from debug information.
    pub compile_units: Vec<String>,
    /// Source file paths recovered from debug information.
    pub source_files: Vec<String>,
    /// Free-form properties; insertion order is preserved for stable SBOM output.
    pub properties: IndexMap<String, String>,
    /// License expression or name, if detected.
    pub license: String,
    /// Supplier of the component, if known.
    pub supplier: String,
    /// Manufacturer of the component, if known.
    pub manufacturer: String,
    /// Logical grouping, usually derived from the parent directory.
    pub group: String,
    /// Package manager that owns the file, if detected.
    pub package_manager: String,
    /// Human-readable component description.
    pub description: String,
    /// Whether debug information was recovered from the file.
    pub contains_debug_info: bool,
    /// Whether the file has been stripped of its symbol table.
    pub is_stripped: bool,
    /// Platform facts for the primary image.
    pub platform_info: PlatformInfo,
    /// Build configuration facts for the primary image.
    pub build_config: BuildConfig,
    /// All architectures contained in the file; more than one for fat binaries.
    pub architectures: Vec<ArchitectureInfo>,
    /// Set once aggregation completes, on success or partial failure.
    pub processed: bool,
}

impl ComponentInfo {
    /// Creates a component record for the given file path.
    pub fn new(file_path: impl Into<String>) -> Self {
        ComponentInfo {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    /// Replaces the symbol list, dropping duplicates by name and address.
    pub fn set_symbols(&mut self, symbols: Vec<SymbolInfo>) {
        let mut seen = HashSet::new();
        self.symbols = symbols
            .into_iter()
            .filter(|sym| seen.insert((sym.name.clone(), sym.address)))
            .collect();
    }

    /// Replaces the section list, dropping duplicates by name.
    pub fn set_sections(&mut self, sections: Vec<SectionInfo>) {
        let mut seen = HashSet::new();
        self.sections = sections
            .into_iter()
            .filter(|section| seen.insert(section.name.clone()))
            .collect();
    }

    /// Replaces the dependency list, dropping duplicate names.
    pub fn set_dependencies(&mut self, dependencies: Vec<String>) {
        self.dependencies = dedup_strings(dependencies);
    }

    /// Replaces the function list, dropping duplicate names.
    pub fn set_functions(&mut self, functions: Vec<String>) {
        self.functions = dedup_strings(functions);
    }

    /// Replaces the compile unit list, dropping duplicate names.
    pub fn set_compile_units(&mut self, compile_units: Vec<String>) {
        self.compile_units = dedup_strings(compile_units);
    }

    /// Replaces the source file list, dropping duplicate paths.
    pub fn set_source_files(&mut self, source_files: Vec<String>) {
        self.source_files = dedup_strings(source_files);
    }

    /// Marks the component as processed.
    ///
    /// The flag transitions from `false` to `true` exactly once; repeated
    /// calls return `false` and leave the record untouched.
    pub fn mark_processed(&mut self) -> bool {
        if self.processed {
            return false;
        }
        self.processed = true;
        true
    }
}

/// Removes duplicate strings while keeping first-occurrence order.
pub(crate) fn dedup_strings(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// The error kind for [`ExtractError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// The path does not exist or cannot be opened.
    NotFound,
    /// No extractor accepts the file.
    NotSupported,
    /// A magic number matched but the internal structure is invalid.
    Malformed,
    /// A read past the end of the input occurred while parsing.
    Truncated,
    /// The input uses a construct the parser does not implement.
    UnsupportedFeature,
    /// A directory scan exceeded its time budget; partial results were returned.
    Timeout,
}

impl fmt::Display for ExtractErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::NotSupported => write!(f, "unsupported file format"),
            Self::Malformed => write!(f, "malformed input"),
            Self::Truncated => write!(f, "truncated input"),
            Self::UnsupportedFeature => write!(f, "unsupported feature"),
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

/// An error produced while extracting metadata from a file.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExtractError {
    kind: ExtractErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ExtractError {
    /// Creates a new error of the given kind with a message.
    pub fn new(kind: ExtractErrorKind, message: impl Into<String>) -> Self {
        ExtractError {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new error of the given kind wrapping an arbitrary error payload.
    pub fn with_source<E>(kind: ExtractErrorKind, message: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        ExtractError {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the corresponding [`ExtractErrorKind`] for this error.
    pub fn kind(&self) -> ExtractErrorKind {
        self.kind
    }

    /// Returns the error message without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_file_format_round_trip() {
        for format in [
            FileFormat::Elf,
            FileFormat::MachO,
            FileFormat::Pe,
            FileFormat::Archive,
            FileFormat::JavaClass,
            FileFormat::Wasm,
        ] {
            assert_eq!(format.name().parse::<FileFormat>().unwrap(), format);
        }
        assert!("unknown".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_symbol_dedup() {
        let mut component = ComponentInfo::new("/tmp/libfoo.so");
        component.set_symbols(vec![
            SymbolInfo {
                name: "foo".into(),
                address: 0x1000,
                ..Default::default()
            },
            SymbolInfo {
                name: "foo".into(),
                address: 0x1000,
                size: 4,
                ..Default::default()
            },
            SymbolInfo {
                name: "foo".into(),
                address: 0x2000,
                ..Default::default()
            },
        ]);

        // Same name at a different address is a distinct symbol.
        assert_eq!(component.symbols.len(), 2);
    }

    #[test]
    fn test_string_dedup_preserves_order() {
        let mut component = ComponentInfo::new("/tmp/a.out");
        component.set_dependencies(vec![
            "libssl.so.3".into(),
            "libc.so.6".into(),
            "libssl.so.3".into(),
        ]);
        assert_eq!(component.dependencies, vec!["libssl.so.3", "libc.so.6"]);
    }

    #[test]
    fn test_mark_processed_once() {
        let mut component = ComponentInfo::new("/tmp/a.out");
        assert!(!component.processed);
        assert!(component.mark_processed());
        assert!(!component.mark_processed());
        assert!(component.processed);
    }

    #[test]
    fn test_properties_keep_insertion_order() {
        let mut component = ComponentInfo::new("/tmp/a.out");
        component.properties.insert("zeta".into(), "1".into());
        component.properties.insert("alpha".into(), "2".into());

        let keys: Vec<_> = component.properties.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_extract_error_kind() {
        let err = ExtractError::new(ExtractErrorKind::Truncated, "section header past EOF");
        assert_eq!(err.kind(), ExtractErrorKind::Truncated);
        assert_eq!(err.to_string(), "truncated input: section header past EOF");
    }
}
