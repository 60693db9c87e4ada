//! The component aggregator: one call populates a [`ComponentInfo`] by
//! orchestrating format detection, the binary extractors, the DWARF
//! extractor, the symbol cache, the plist scraper and the external fact
//! detectors.
//!
//! The pipeline tolerates partial failure: every stage runs regardless of
//! prior stages, the component keeps whatever was collected, and the overall
//! result reports the success of the primary binary extraction.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ada::AdaExtractor;
use crate::base::{ComponentInfo, ExtractError, ExtractErrorKind, FileFormat, FileKind};
use crate::cache::SymbolCache;
use crate::detector::detect_format;
use crate::detectors::{LicenseDetect, PackageManagerDetect, VersionDetect};
use crate::elf::ElfExtractor;
use crate::factory::ExtractorFactory;
use crate::macho::MachOExtractor;
use crate::pe::PeExtractor;
use crate::plist::InfoPlist;

/// Default minimum confidence for adopting detector facts.
const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Orchestrates metadata extraction for single files and batches.
///
/// Configuration set through the `set_*` methods propagates to the injected
/// detectors at call time. The extractor owns a [`SymbolCache`] which fronts
/// all symbol enumeration.
pub struct MetadataExtractor {
    verbose: bool,
    extract_debug_info: bool,
    suppress_warnings: bool,
    confidence_threshold: f64,
    last_error: Option<String>,
    symbol_cache: SymbolCache,
    package_manager_detector: Option<Box<dyn PackageManagerDetect>>,
    license_detector: Option<Box<dyn LicenseDetect>>,
    version_detector: Option<Box<dyn VersionDetect>>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor {
    /// Creates an aggregator with default configuration and no detectors.
    pub fn new() -> Self {
        MetadataExtractor {
            verbose: false,
            extract_debug_info: true,
            suppress_warnings: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            last_error: None,
            symbol_cache: SymbolCache::new(),
            package_manager_detector: None,
            license_detector: None,
            version_detector: None,
        }
    }

    /// Injects the package manager detector.
    pub fn with_package_manager_detector(
        mut self,
        detector: Box<dyn PackageManagerDetect>,
    ) -> Self {
        self.package_manager_detector = Some(detector);
        self
    }

    /// Injects the license detector.
    pub fn with_license_detector(mut self, detector: Box<dyn LicenseDetect>) -> Self {
        self.license_detector = Some(detector);
        self
    }

    /// Injects the version detector.
    pub fn with_version_detector(mut self, detector: Box<dyn VersionDetect>) -> Self {
        self.version_detector = Some(detector);
        self
    }

    /// Enables or disables verbose diagnostics, propagated to detectors.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
        if let Some(detector) = self.package_manager_detector.as_mut() {
            detector.set_verbose(verbose);
        }
        if let Some(detector) = self.license_detector.as_mut() {
            detector.set_verbose(verbose);
        }
        if let Some(detector) = self.version_detector.as_mut() {
            detector.set_verbose(verbose);
        }
    }

    /// Enables or disables the debug extraction stage.
    pub fn set_extract_debug_info(&mut self, extract: bool) {
        self.extract_debug_info = extract;
    }

    /// Suppresses non-fatal diagnostics.
    pub fn set_suppress_warnings(&mut self, suppress: bool) {
        self.suppress_warnings = suppress;
    }

    /// Sets the confidence threshold for detector facts, clamped to `[0, 1]`.
    pub fn set_confidence_threshold(&mut self, threshold: f64) {
        let threshold = threshold.clamp(0.0, 1.0);
        self.confidence_threshold = threshold;
        if let Some(detector) = self.package_manager_detector.as_mut() {
            detector.set_confidence_threshold(threshold);
        }
        if let Some(detector) = self.license_detector.as_mut() {
            detector.set_confidence_threshold(threshold);
        }
        if let Some(detector) = self.version_detector.as_mut() {
            detector.set_confidence_threshold(threshold);
        }
    }

    /// The message of the most recent failure, if any.
    ///
    /// Only meaningful after a call reported failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The symbol cache fronting symbol extraction.
    pub fn symbol_cache(&self) -> &SymbolCache {
        &self.symbol_cache
    }

    /// Returns `true` if any extractor accepts the file.
    pub fn can_process_file(&self, path: &Path) -> bool {
        path.exists() && !ExtractorFactory::available_extractors(path).is_empty()
    }

    /// The container formats the aggregator fully supports.
    pub fn supported_formats(&self) -> Vec<&'static str> {
        vec!["ELF", "Mach-O", "PE", "Archive"]
    }

    /// Populates every field of `component` from its `file_path`.
    ///
    /// Returns the success of the primary binary extraction; later stages
    /// record their failures in [`last_error`] and keep going. The component
    /// is marked processed whenever the pipeline runs to its end, on success
    /// or partial failure.
    ///
    /// [`last_error`]: Self::last_error
    pub fn extract_metadata(&mut self, component: &mut ComponentInfo) -> Result<(), ExtractError> {
        self.last_error = None;
        let path = PathBuf::from(&component.file_path);

        // Stage 1: existence.
        if !path.exists() {
            let error = ExtractError::new(
                ExtractErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            );
            self.last_error = Some(error.to_string());
            return Err(error);
        }

        component.file_size = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);

        let format = detect_format(&path);
        let extractors = ExtractorFactory::available_extractors(&path);
        let primary = extractors
            .iter()
            .find(|extractor| extractor.format_name() != "DWARF");
        let debug = extractors
            .iter()
            .find(|extractor| extractor.format_name() == "DWARF");

        // Stage 2: primary binary extraction.
        let primary_result = match primary {
            Some(primary) => self.run_primary(component, &path, primary.as_ref()),
            None => {
                let error = ExtractError::new(
                    ExtractErrorKind::NotSupported,
                    format!("no extractor accepts {}", path.display()),
                );
                self.record_error(&error);
                Err(error)
            }
        };

        // Stage 3: debug information.
        if self.extract_debug_info {
            let debug_extractor = debug.or(primary);
            if let Some(extractor) = debug_extractor {
                self.run_debug(component, &path, extractor.as_ref());
            }
        }

        // Stage 4: path-based package manager detection.
        if let Some(primary) = primary {
            if primary.format_name() == "Ada" {
                component.package_manager = "GNAT".to_string();

                let ada = AdaExtractor::new();
                if let Ok(ali) = ada.parse_ali_file(&path) {
                    for (key, value) in ada.package_properties(&ali.package) {
                        component.properties.insert(key, value);
                    }
                }
            }
        }
        if component.package_manager.is_empty() {
            if let Some(detector) = self.package_manager_detector.as_ref() {
                let manager = detector.detect_for_path(&path);
                if !manager.is_empty() && manager != "unknown" {
                    component.package_manager = manager;
                }
            }
        }
        if !component.package_manager.is_empty() {
            component
                .properties
                .insert("package_manager".into(), component.package_manager.clone());
        }

        // Stage 5: manifest-based detection on the parent directory.
        self.run_manifest_detection(component, &path);

        // Stage 6: Mach-O enrichment.
        if format == FileFormat::MachO {
            self.run_macho_enrichment(component, &path);
        }

        // Stage 7: package enrichment.
        self.run_package_enrichment(component, &path);

        // Stage 8: evidence attachment.
        self.attach_evidence(component);

        // Stage 9: post-processing of derived fields.
        self.post_process(component, &path, format);

        // Stage 10: validation.
        if component.file_path.is_empty() {
            let error = ExtractError::new(
                ExtractErrorKind::NotSupported,
                "component has an empty file path",
            );
            self.last_error = Some(error.to_string());
            return Err(error);
        }

        // Stage 11: done.
        component.mark_processed();

        // The call reports the outcome of the primary binary extraction,
        // even though later stages ran regardless.
        primary_result
    }

    /// Runs the pipeline for every path and collects the successful records.
    ///
    /// Files that fail extraction are omitted from the result; the batch as a
    /// whole is successful iff [`last_error`] is `None` afterwards.
    ///
    /// [`last_error`]: Self::last_error
    pub fn extract_metadata_batched<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<ComponentInfo> {
        let mut components = Vec::with_capacity(paths.len());
        let mut first_error: Option<String> = None;

        for path in paths {
            let mut component = ComponentInfo::new(path.as_ref().to_string_lossy());
            match self.extract_metadata(&mut component) {
                Ok(()) => components.push(component),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error.to_string());
                    }
                }
            }
        }

        self.last_error = first_error;
        components
    }

    /// Generates a one-line human readable description for the component.
    pub fn generate_component_description(&self, component: &ComponentInfo) -> String {
        let kind = match component.file_type {
            FileKind::Executable => "executable",
            FileKind::SharedLibrary => "shared library",
            FileKind::StaticLibrary => "static library",
            FileKind::Object => "object file",
            FileKind::Source => "source artifact",
            FileKind::Unknown => "binary artifact",
        };

        let mut description = format!("{} {}", kind, component.name);
        if !component.version.is_empty() {
            description.push_str(&format!(" version {}", component.version));
        }
        if !component.dependencies.is_empty() {
            description.push_str(&format!(
                ", {} dynamic dependencies",
                component.dependencies.len()
            ));
        }
        description
    }

    /// Determines the SBOM scope for the component.
    pub fn determine_component_scope(&self, component: &ComponentInfo) -> &'static str {
        match component.file_type {
            FileKind::Executable | FileKind::SharedLibrary => "required",
            _ => "optional",
        }
    }

    /// Determines the MIME type for a file from its extension.
    pub fn determine_mime_type(&self, path: &Path) -> &'static str {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("so") => "application/x-sharedlib",
            Some("exe") => "application/x-executable",
            Some("dylib") => "application/x-mach-binary",
            Some("dll") => "application/x-msdownload",
            Some("a") => "application/x-archive",
            _ => "application/octet-stream",
        }
    }

    fn record_error(&mut self, error: &ExtractError) {
        if self.verbose && !self.suppress_warnings {
            tracing::warn!(error = %error, "extraction stage failed");
        }
        if self.last_error.is_none() {
            self.last_error = Some(error.to_string());
        }
    }

    fn run_primary(
        &mut self,
        component: &mut ComponentInfo,
        path: &Path,
        primary: &dyn crate::extractor::BinaryExtractor,
    ) -> Result<(), ExtractError> {
        let mut failure: Option<ExtractError> = None;

        match self
            .symbol_cache
            .extract_symbols_with(path, |path| primary.extract_symbols(path))
        {
            Ok(symbols) if !symbols.is_empty() => component.set_symbols(symbols),
            Ok(_) => (),
            Err(error) => {
                self.record_error(&error);
                failure = Some(error);
            }
        }

        match primary.extract_sections(path) {
            Ok(sections) if !sections.is_empty() => component.set_sections(sections),
            Ok(_) => (),
            Err(error) => {
                self.record_error(&error);
                failure.get_or_insert(error);
            }
        }

        self.apply_format_facts(component, path);

        match primary.extract_version(path) {
            Ok(version) if !version.is_empty() => {
                // A version that names the container format is a descriptor,
                // not a semantic version; executables drop it.
                let descriptor_only =
                    version.starts_with("ELF") && component.file_type == FileKind::Executable;
                if !descriptor_only && component.version.is_empty() {
                    component.version = version;
                }
            }
            Ok(_) => (),
            Err(error) => {
                self.record_error(&error);
                failure.get_or_insert(error);
            }
        }

        match primary.extract_dependencies(path) {
            Ok(dependencies) if !dependencies.is_empty() => {
                component.set_dependencies(dependencies)
            }
            Ok(_) => (),
            Err(error) => {
                self.record_error(&error);
                failure.get_or_insert(error);
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Adopts format-specific facts: file kind, strippedness, identifiers.
    fn apply_format_facts(&mut self, component: &mut ComponentInfo, path: &Path) {
        match detect_format(path) {
            FileFormat::Elf => {
                let elf = ElfExtractor::new();
                if let Ok(kind) = elf.file_kind(path) {
                    component.file_type = kind;
                }
                if let Ok(stripped) = elf.is_stripped(path) {
                    component.is_stripped = stripped;
                }
                if let Ok(arch) = elf.architecture(path) {
                    component.platform_info.architecture = arch;
                    component.platform_info.platform = "linux".into();
                }
                if let Ok(Some(build_id)) = elf.build_id(path) {
                    component.properties.insert("build_id".into(), build_id);
                }
            }
            FileFormat::MachO => {
                let macho = MachOExtractor::new();
                if let Ok(kind) = macho.file_kind(path) {
                    component.file_type = kind;
                }
                if let Ok(stripped) = macho.is_stripped(path) {
                    component.is_stripped = stripped;
                }
                if let Ok(Some(uuid)) = macho.uuid(path) {
                    component.properties.insert("uuid".into(), uuid);
                }
            }
            FileFormat::Pe => {
                let pe = PeExtractor::new();
                if let Ok(kind) = pe.file_kind(path) {
                    component.file_type = kind;
                }
                if let Ok(stripped) = pe.is_stripped(path) {
                    component.is_stripped = stripped;
                }
                if let Ok(arch) = pe.architecture(path) {
                    component.platform_info.architecture = arch;
                    component.platform_info.platform = "windows".into();
                }
            }
            FileFormat::Archive => {
                component.file_type = FileKind::StaticLibrary;
            }
            _ => (),
        }
    }

    fn run_debug(
        &mut self,
        component: &mut ComponentInfo,
        path: &Path,
        extractor: &dyn crate::extractor::BinaryExtractor,
    ) {
        match extractor.extract_functions(path) {
            Ok(functions) if !functions.is_empty() => {
                component.set_functions(functions);
                component.contains_debug_info = true;
            }
            Ok(_) => (),
            Err(error) => self.record_error(&error),
        }

        match extractor.extract_compile_units(path) {
            Ok(compile_units) if !compile_units.is_empty() => {
                component.set_compile_units(compile_units);
                component.contains_debug_info = true;
            }
            Ok(_) => (),
            Err(error) => self.record_error(&error),
        }

        match extractor.extract_source_files(path) {
            Ok(source_files) if !source_files.is_empty() => {
                component.set_source_files(source_files);
                component.contains_debug_info = true;
            }
            Ok(_) => (),
            Err(error) => self.record_error(&error),
        }
    }

    fn run_manifest_detection(&mut self, component: &mut ComponentInfo, path: &Path) {
        let Some(parent) = path.parent() else { return };

        if component.package_manager.is_empty() {
            if let Some(detector) = self.package_manager_detector.as_ref() {
                if let Some(info) = detector.detect(parent).into_iter().next() {
                    if !info.name.is_empty() {
                        component.package_manager = info.name.clone();
                        component
                            .properties
                            .insert("package_manager".into(), info.name);
                    }
                }
            }
        }

        if component.license.is_empty() {
            if let Some(detector) = self.license_detector.as_ref() {
                let license = detector
                    .detect(parent)
                    .into_iter()
                    .find(|info| info.confidence >= self.confidence_threshold);
                if let Some(license) = license {
                    component.license = if license.spdx_id.is_empty() {
                        license.name
                    } else {
                        license.spdx_id
                    };
                }
            }
        }

        if component.version.is_empty() {
            if let Some(detector) = self.version_detector.as_ref() {
                let version = detector
                    .detect(parent)
                    .into_iter()
                    .find(|info| info.confidence >= self.confidence_threshold);
                if let Some(version) = version {
                    component.version = version.full_version;
                }
            }
        }
    }

    fn run_macho_enrichment(&mut self, component: &mut ComponentInfo, path: &Path) {
        let macho = MachOExtractor::new();

        if let Ok(info) = macho.platform_info(path) {
            component.platform_info = info;
        }
        if let Ok(arches) = macho.architectures(path) {
            component.architectures = arches;
        }
        if let Ok(config) = macho.build_config(path) {
            component.build_config = config;
        }

        // Info.plist wins over anything recovered from the binary; the
        // build-config versions are fallbacks, minOSVersion a last resort.
        let mut plist_version = false;
        if let Some(plist) = InfoPlist::for_bundle_executable(path) {
            if let Some(version) = plist.short_version() {
                component.version = version.to_string();
                plist_version = true;
            }
            if let Some(name) = plist.bundle_name().or_else(|| plist.display_name()) {
                component.name = name.to_string();
            }
        }

        if !plist_version && component.version.is_empty() {
            if !component.build_config.source_version.is_empty() {
                component.version = component.build_config.source_version.clone();
            } else if !component.build_config.min_os_version.is_empty() {
                component.version = component.build_config.min_os_version.clone();
            }
        }
    }

    fn run_package_enrichment(&mut self, component: &mut ComponentInfo, path: &Path) {
        if component.supplier.is_empty() {
            let supplier = match component.package_manager.as_str() {
                "rpm" => Some("Red Hat Package Manager"),
                "deb" => Some("Debian Package Manager"),
                "conan" => Some("Conan Center"),
                "vcpkg" => Some("vcpkg"),
                "spack" => Some("Spack"),
                _ => None,
            };

            if let Some(supplier) = supplier {
                component.supplier = supplier.to_string();
            } else if path
                .file_name()
                .is_some_and(|name| name == "binsight-sbom")
            {
                component.supplier = "Binsight Project".to_string();
            }
        }

        if component.group.is_empty() {
            if let Some(parent_name) = path.parent().and_then(|p| p.file_name()) {
                component.group = parent_name.to_string_lossy().into_owned();
            }
        }

        if component.manufacturer.is_empty() && !component.supplier.is_empty() {
            component.manufacturer = component.supplier.clone();
        }
    }

    fn attach_evidence(&self, component: &mut ComponentInfo) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);

        let properties = &mut component.properties;
        properties.insert(
            "evidence_extractor_version".into(),
            env!("CARGO_PKG_VERSION").into(),
        );
        properties.insert("evidence_extraction_date".into(), now.to_string());
        properties.insert(
            "evidence_confidence_threshold".into(),
            format!("{:.2}", self.confidence_threshold),
        );
        properties.insert(
            "evidence:identity:symbols".into(),
            component.symbols.len().to_string(),
        );
        properties.insert(
            "evidence:identity:sections".into(),
            component.sections.len().to_string(),
        );
        properties.insert(
            "evidence:identity:hasDebugInfo".into(),
            component.contains_debug_info.to_string(),
        );
        properties.insert(
            "evidence:identity:isStripped".into(),
            component.is_stripped.to_string(),
        );
        properties.insert(
            "evidence:identity:fileType".into(),
            component.file_type.name().into(),
        );
        properties.insert(
            "evidence:occurrence:location".into(),
            component.file_path.clone(),
        );
        properties.insert(
            "evidence:occurrence:size".into(),
            component.file_size.to_string(),
        );
    }

    fn post_process(&self, component: &mut ComponentInfo, path: &Path, format: FileFormat) {
        if component.name.is_empty() {
            component.name = derive_component_name(&component.file_path);
        }

        if component.file_type == FileKind::Unknown {
            component.file_type = match path.extension().and_then(|ext| ext.to_str()) {
                Some("so") | Some("dylib") | Some("dll") => FileKind::SharedLibrary,
                Some("exe") | Some("app") => FileKind::Executable,
                Some("a") => FileKind::StaticLibrary,
                Some("o") | Some("obj") => FileKind::Object,
                Some("ali") => FileKind::Source,
                _ => match format {
                    FileFormat::Archive => FileKind::StaticLibrary,
                    _ => FileKind::Unknown,
                },
            };
        }

        if component.description.is_empty() {
            component.description = self.generate_component_description(component);
        }
    }
}

/// Derives a component name from a file path.
///
/// The `lib` prefix, binary extensions with trailing version chains
/// (`libssl.so.3`), explicit `-1.2.3` version suffixes and
/// `_debug`/`_release`/`_static`/`_shared` build suffixes are stripped. For
/// executables inside a macOS bundle, the `.app` base name wins.
pub(crate) fn derive_component_name(file_path: &str) -> String {
    if let Some(pos) = file_path.find(".app/Contents/MacOS/") {
        let bundle = &file_path[..pos];
        if let Some(base) = bundle.rsplit('/').next() {
            return base.to_string();
        }
    }

    let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let mut name = file_name.to_string();

    // Peel trailing numeric version components, then the extension itself,
    // so `libssl.so.3` reduces to `libssl`.
    loop {
        let Some((stem, ext)) = name.rsplit_once('.') else {
            break;
        };
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_digit()) {
            break;
        }
        name = stem.to_string();
    }
    if let Some((stem, _ext)) = name.rsplit_once('.') {
        if !stem.is_empty() {
            name = stem.to_string();
        }
    }

    if let Some(stripped) = name.strip_prefix("lib") {
        if !stripped.is_empty() {
            name = stripped.to_string();
        }
    }

    for suffix in ["_debug", "_release", "_static", "_shared"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                name = stripped.to_string();
            }
            break;
        }
    }

    if let Some((base, version)) = name.rsplit_once('-') {
        if !base.is_empty()
            && !version.is_empty()
            && version.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            name = base.to_string();
        }
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_derive_component_name() {
        assert_eq!(derive_component_name("/usr/lib/libssl.so.3"), "ssl");
        assert_eq!(derive_component_name("/usr/lib/libcrypto.so"), "crypto");
        assert_eq!(derive_component_name("/opt/tool/mytool-1.2.3"), "mytool");
        assert_eq!(derive_component_name("/build/engine_debug"), "engine");
        assert_eq!(derive_component_name("/build/render_static.a"), "render");
        assert_eq!(derive_component_name("plain"), "plain");
        assert_eq!(
            derive_component_name("/Applications/Calculator.app/Contents/MacOS/Calculator"),
            "Calculator"
        );
    }

    #[test]
    fn test_mime_type_table() {
        let extractor = MetadataExtractor::new();
        assert_eq!(
            extractor.determine_mime_type(Path::new("libfoo.so")),
            "application/x-sharedlib"
        );
        assert_eq!(
            extractor.determine_mime_type(Path::new("tool.exe")),
            "application/x-executable"
        );
        assert_eq!(
            extractor.determine_mime_type(Path::new("libfoo.dylib")),
            "application/x-mach-binary"
        );
        assert_eq!(
            extractor.determine_mime_type(Path::new("foo.dll")),
            "application/x-msdownload"
        );
        assert_eq!(
            extractor.determine_mime_type(Path::new("libfoo.a")),
            "application/x-archive"
        );
        assert_eq!(
            extractor.determine_mime_type(Path::new("README")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_scope() {
        let extractor = MetadataExtractor::new();
        let mut component = ComponentInfo::new("/tmp/a");

        component.file_type = FileKind::Executable;
        assert_eq!(extractor.determine_component_scope(&component), "required");

        component.file_type = FileKind::StaticLibrary;
        assert_eq!(extractor.determine_component_scope(&component), "optional");
    }

    #[test]
    fn test_missing_file_fails_without_processing() {
        let mut extractor = MetadataExtractor::new();
        let mut component = ComponentInfo::new("/nonexistent/binsight/file.so");

        let result = extractor.extract_metadata(&mut component);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            crate::base::ExtractErrorKind::NotFound
        );
        assert!(!component.processed);
        assert!(extractor.last_error().is_some());
    }

    #[test]
    fn test_supported_formats() {
        let extractor = MetadataExtractor::new();
        assert_eq!(
            extractor.supported_formats(),
            vec!["ELF", "Mach-O", "PE", "Archive"]
        );
    }

    #[test]
    fn test_confidence_threshold_clamped() {
        let mut extractor = MetadataExtractor::new();
        extractor.set_confidence_threshold(7.5);
        assert_eq!(extractor.confidence_threshold, 1.0);
        extractor.set_confidence_threshold(-1.0);
        assert_eq!(extractor.confidence_threshold, 0.0);
    }
}
