//! Maps file paths to the extractors that can process them.

use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::ada::AdaExtractor;
use crate::archive::ArchiveExtractor;
use crate::base::{ExtractError, ExtractErrorKind, FileFormat};
use crate::detector::detect_format;
use crate::dwarf::DwarfExtractor;
use crate::elf::ElfExtractor;
use crate::extractor::BinaryExtractor;
use crate::macho::MachOExtractor;
use crate::pe::PeExtractor;

/// Constructs a fresh extractor instance for a registered format.
pub type ExtractorConstructor = Box<dyn Fn() -> Box<dyn BinaryExtractor> + Send + Sync>;

struct RegisteredExtractor {
    name: String,
    constructor: ExtractorConstructor,
}

/// Custom extractors registered at runtime, guarded for concurrent use.
static REGISTERED: Lazy<Mutex<Vec<RegisteredExtractor>>> = Lazy::new(|| Mutex::new(Vec::new()));

const BUILTIN_FORMAT_NAMES: &[&str] = &["ELF", "Mach-O", "PE", "Archive", "Ada", "DWARF"];

/// Creates and orders the extractors that accept a given file.
///
/// The factory itself is stateless; only the registered-extractor list is
/// shared, and it is guarded by a mutex.
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Detects the container format of the file at `path`.
    pub fn detect_format(path: &Path) -> FileFormat {
        detect_format(path)
    }

    /// Creates the extractor matching the file's detected format.
    ///
    /// Java class files and WASM containers are detected but have no
    /// extractor; they yield `None` like unknown formats.
    pub fn create_extractor(path: &Path) -> Option<Box<dyn BinaryExtractor>> {
        match detect_format(path) {
            FileFormat::Elf => Some(Box::new(ElfExtractor::new())),
            FileFormat::MachO => Some(Box::new(MachOExtractor::new())),
            FileFormat::Pe => Some(Box::new(PeExtractor::new())),
            FileFormat::Archive => Some(Box::new(ArchiveExtractor::new())),
            FileFormat::JavaClass | FileFormat::Wasm | FileFormat::Unknown => None,
        }
    }

    /// Returns every extractor that accepts the file, most preferred first.
    ///
    /// All built-in extractors and every registered custom extractor are
    /// instantiated, filtered by [`BinaryExtractor::can_handle`], and sorted
    /// by their [`BinaryExtractor::priority`] rank. The DWARF extractor ranks
    /// behind all format parsers, so dispatch code can take the first
    /// non-DWARF entry as the primary parser.
    pub fn available_extractors(path: &Path) -> Vec<Box<dyn BinaryExtractor>> {
        let mut extractors: Vec<Box<dyn BinaryExtractor>> = vec![
            Box::new(ElfExtractor::new()),
            Box::new(MachOExtractor::new()),
            Box::new(PeExtractor::new()),
            Box::new(ArchiveExtractor::new()),
            Box::new(AdaExtractor::new()),
            Box::new(DwarfExtractor::new()),
        ];

        {
            let registered = REGISTERED.lock();
            for entry in registered.iter() {
                extractors.push((entry.constructor)());
            }
        }

        extractors.retain(|extractor| extractor.can_handle(path));
        extractors.sort_by_key(|extractor| extractor.priority());
        extractors
    }

    /// Registers a custom extractor under its format name.
    ///
    /// The constructor is invoked once per [`available_extractors`] call.
    /// Registration is refused when the name collides with a built-in format
    /// or an already registered one.
    ///
    /// [`available_extractors`]: Self::available_extractors
    pub fn register_extractor(
        name: impl Into<String>,
        constructor: ExtractorConstructor,
    ) -> Result<(), ExtractError> {
        let name = name.into();
        let mut registered = REGISTERED.lock();

        if BUILTIN_FORMAT_NAMES.contains(&name.as_str())
            || registered.iter().any(|entry| entry.name == name)
        {
            return Err(ExtractError::new(
                ExtractErrorKind::NotSupported,
                format!("an extractor for format {name:?} is already registered"),
            ));
        }

        registered.push(RegisteredExtractor { name, constructor });
        Ok(())
    }

    /// The format names of all registered custom extractors.
    pub fn registered_formats() -> Vec<String> {
        REGISTERED.lock().iter().map(|entry| entry.name.clone()).collect()
    }

    /// Removes all registered custom extractors.
    ///
    /// Intended for deterministic teardown in tests.
    pub fn clear_registered_extractors() {
        REGISTERED.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;

    use crate::base::{SectionInfo, SymbolInfo};

    /// Serializes the tests that mutate the global registry.
    static TEST_GUARD: Mutex<()> = Mutex::new(());

    struct NullExtractor;

    impl BinaryExtractor for NullExtractor {
        fn extract_symbols(&self, _: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
            Ok(Vec::new())
        }

        fn extract_sections(&self, _: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
            Ok(Vec::new())
        }

        fn extract_version(&self, _: &Path) -> Result<String, ExtractError> {
            Ok(String::new())
        }

        fn extract_dependencies(&self, _: &Path) -> Result<Vec<String>, ExtractError> {
            Ok(Vec::new())
        }

        fn can_handle(&self, _: &Path) -> bool {
            true
        }

        fn format_name(&self) -> &'static str {
            "Null"
        }

        fn priority(&self) -> i32 {
            90
        }
    }

    #[test]
    fn test_create_extractor_by_magic() {
        let _guard = TEST_GUARD.lock();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"!<arch>\n").unwrap();
        tmp.flush().unwrap();

        let extractor = ExtractorFactory::create_extractor(tmp.path()).unwrap();
        assert_eq!(extractor.format_name(), "Archive");
        assert!(extractor.can_handle(tmp.path()));
    }

    #[test]
    fn test_no_extractor_for_unknown() {
        let _guard = TEST_GUARD.lock();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert!(ExtractorFactory::create_extractor(tmp.path()).is_none());
        assert!(ExtractorFactory::available_extractors(tmp.path()).is_empty());
    }

    #[test]
    fn test_register_refuses_duplicates() {
        let _guard = TEST_GUARD.lock();
        ExtractorFactory::clear_registered_extractors();

        ExtractorFactory::register_extractor("Null", Box::new(|| Box::new(NullExtractor)))
            .unwrap();
        assert!(
            ExtractorFactory::register_extractor("Null", Box::new(|| Box::new(NullExtractor)))
                .is_err()
        );
        assert!(
            ExtractorFactory::register_extractor("ELF", Box::new(|| Box::new(NullExtractor)))
                .is_err()
        );
        assert_eq!(ExtractorFactory::registered_formats(), vec!["Null"]);

        ExtractorFactory::clear_registered_extractors();
        assert!(ExtractorFactory::registered_formats().is_empty());
    }

    #[test]
    fn test_available_extractors_ordering() {
        let _guard = TEST_GUARD.lock();
        ExtractorFactory::clear_registered_extractors();
        ExtractorFactory::register_extractor("Null", Box::new(|| Box::new(NullExtractor)))
            .unwrap();

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"!<arch>\n").unwrap();
        tmp.flush().unwrap();

        let extractors = ExtractorFactory::available_extractors(tmp.path());
        let names: Vec<_> = extractors.iter().map(|e| e.format_name()).collect();

        // The format parser leads; the catch-all custom extractor ranks behind it.
        assert_eq!(names.first(), Some(&"Archive"));
        assert!(names.contains(&"Null"));

        ExtractorFactory::clear_registered_extractors();
    }
}
