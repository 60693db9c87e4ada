//! Support for GNAT Ada library information (ALI) files.
//!
//! The GNAT compiler emits one ASCII ALI file per compilation unit. Each line
//! is keyed by a leading letter: `V` carries the compiler version, `A` and
//! `F` compilation flags, `W`/`Z` with-clause dependencies, `D` dependency
//! files with timestamps and checksums, `P` subprograms, `T` types, `X`
//! cross-reference sections and `I` file information.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use walkdir::WalkDir;

use crate::base::{ExtractError, ExtractErrorKind, SectionInfo, SymbolInfo};
use crate::extractor::BinaryExtractor;

/// Wall-clock budget for one directory scan.
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Root packages provided by the GNAT runtime.
///
/// Hierarchical names match on their root segment, so `ada.strings` is a
/// runtime package because `ada` is.
const RUNTIME_PACKAGES: &[&str] = &[
    "ada",
    "system",
    "interfaces",
    "text_io",
    "calendar",
    "direct_io",
    "sequential_io",
    "io_exceptions",
    "unchecked_conversion",
    "unchecked_deallocation",
    "machine_code",
    "gnat",
];

const SECURITY_FLAGS: &[&str] = &[
    "-fstack-protector",
    "-fstack-protector-strong",
    "-fstack-protector-all",
    "-fPIE",
    "-fPIC",
    "-Wl,-z,relro",
    "-Wl,-z,now",
    "-Wl,-z,noexecstack",
    "-D_FORTIFY_SOURCE=2",
];

const OPTIMIZATION_FLAGS: &[&str] = &["-O0", "-O1", "-O2", "-O3", "-Os", "-Og", "-flto"];

/// Information about one Ada package.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdaPackageInfo {
    /// Package name.
    pub name: String,
    /// Source file the package was compiled from (`.ads`/`.adb`).
    pub source_file: String,
    /// Path of the ALI file.
    pub ali_file: String,
    /// Checksum recorded for the source file.
    pub checksum: String,
    /// Timestamp recorded for the source file.
    pub timestamp: String,
    /// Subprogram names declared in the package.
    pub functions: Vec<String>,
    /// Variable names declared in the package.
    pub variables: Vec<String>,
    /// Type names declared in the package.
    pub types: Vec<String>,
    /// Packages this one depends on.
    pub dependencies: Vec<String>,
    /// Whether the unit is a specification (`.ads`) rather than a body.
    pub is_specification: bool,
    /// Whether the package belongs to the GNAT runtime.
    pub is_runtime: bool,
}

/// Information about one Ada subprogram.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdaFunctionInfo {
    /// Subprogram name.
    pub name: String,
    /// Package containing the subprogram.
    pub package: String,
    /// Signature with parameters, when recovered.
    pub signature: String,
    /// Return type; empty for procedures.
    pub return_type: String,
    /// Parameter types.
    pub parameters: Vec<String>,
    /// Whether the subprogram is publicly visible.
    pub is_public: bool,
    /// Whether the subprogram is a procedure (no return value).
    pub is_procedure: bool,
    /// Subprograms this one calls.
    pub calls: Vec<String>,
    /// Line number in the source file.
    pub line_number: String,
    /// Column number in the source file.
    pub column_number: String,
}

/// Build configuration recovered from ALI argument lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdaBuildInfo {
    /// GNAT compiler version from the `V` line.
    pub compiler_version: String,
    /// Runtime configuration flags.
    pub runtime_flags: Vec<String>,
    /// Compilation flags from `A`/`F` lines.
    pub compilation_flags: Vec<String>,
    /// Target architecture, when recorded.
    pub target_architecture: String,
    /// Build timestamp, when recorded.
    pub build_timestamp: String,
    /// Per-file timestamps from `D` lines.
    pub file_timestamps: Vec<(String, String)>,
    /// Per-file checksums from `D` lines.
    pub file_checksums: Vec<(String, String)>,
    /// Hardening flags found among the compilation flags.
    pub security_flags: Vec<String>,
    /// Optimization flags found among the compilation flags.
    pub optimization_flags: Vec<String>,
}

/// One caller → called relation from the cross-reference sections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdaCrossReference {
    /// Subprogram making the call.
    pub caller_function: String,
    /// Package containing the caller.
    pub caller_package: String,
    /// Subprogram being called.
    pub called_function: String,
    /// Package containing the callee.
    pub called_package: String,
    /// Line number of the call site.
    pub caller_line: String,
    /// Line number of the callee declaration.
    pub called_line: String,
    /// Relation kind; currently always `calls`.
    pub relationship: String,
}

/// Information about one Ada type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdaTypeInfo {
    /// Type name.
    pub name: String,
    /// Package declaring the type.
    pub package: String,
}

/// Everything recovered from one ALI file.
#[derive(Clone, Debug, Default)]
pub struct AliFile {
    /// The package the ALI file describes.
    pub package: AdaPackageInfo,
    /// Subprograms found in the file.
    pub functions: Vec<AdaFunctionInfo>,
    /// Types found in the file.
    pub types: Vec<AdaTypeInfo>,
    /// Cross references found in the file.
    pub cross_references: Vec<AdaCrossReference>,
    /// Build configuration facts.
    pub build_info: AdaBuildInfo,
    /// Source files referenced by with-clauses and dependency lines.
    pub source_files: Vec<String>,
}

/// Result of an ALI directory scan.
#[derive(Clone, Debug, Default)]
pub struct AliScan {
    /// The ALI files found, possibly partial on timeout.
    pub ali_files: Vec<PathBuf>,
    /// Whether the scan hit its time budget.
    pub timed_out: bool,
}

/// Extracts metadata from GNAT ALI files.
pub struct AdaExtractor {
    verbose: bool,
    exclude_runtime_packages: bool,
}

impl Default for AdaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaExtractor {
    /// Creates an extractor with default configuration.
    ///
    /// Runtime packages are included in dependency lists by default, matching
    /// the behavior of the binary extractors for system libraries.
    pub fn new() -> Self {
        AdaExtractor {
            verbose: false,
            exclude_runtime_packages: false,
        }
    }

    /// Omits GNAT runtime packages from dependency lists.
    pub fn exclude_runtime_packages(mut self) -> Self {
        self.exclude_runtime_packages = true;
        self
    }

    /// Returns `true` if the package belongs to the GNAT runtime.
    ///
    /// Hierarchical names match on their root segment.
    pub fn is_runtime_package(&self, name: &str) -> bool {
        let root = name.split('.').next().unwrap_or(name);
        RUNTIME_PACKAGES.contains(&name) || RUNTIME_PACKAGES.contains(&root)
    }

    /// Parses one ALI file.
    pub fn parse_ali_file(&self, path: &Path) -> Result<AliFile, ExtractError> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::NotFound,
                format!("cannot read {}", path.display()),
                err,
            )
        })?;

        let package_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut ali = AliFile {
            package: AdaPackageInfo {
                name: package_name.clone(),
                ali_file: path.to_string_lossy().into_owned(),
                is_runtime: self.is_runtime_package(&package_name),
                ..Default::default()
            },
            ..Default::default()
        };

        for line in content.lines() {
            let Some((key, rest)) = line.split_once(' ') else {
                continue;
            };
            let rest = rest.trim();

            match key {
                "V" => ali.build_info.compiler_version = rest.trim_matches('"').to_string(),
                "A" | "F" => self.parse_flag(rest, &mut ali.build_info),
                "U" => self.parse_unit(rest, &mut ali),
                "W" | "Z" => self.parse_with_clause(rest, &mut ali),
                "D" => self.parse_dependency_file(rest, &mut ali),
                "P" => {
                    if !rest.is_empty() {
                        ali.functions.push(AdaFunctionInfo {
                            name: rest.split_whitespace().next().unwrap_or(rest).to_string(),
                            package: package_name.clone(),
                            is_public: true,
                            ..Default::default()
                        });
                    }
                }
                "T" => {
                    if !rest.is_empty() {
                        ali.types.push(AdaTypeInfo {
                            name: rest.split_whitespace().next().unwrap_or(rest).to_string(),
                            package: package_name.clone(),
                        });
                    }
                }
                "X" => self.parse_cross_reference(rest, &package_name, &mut ali),
                _ => (),
            }
        }

        ali.package.functions = ali.functions.iter().map(|f| f.name.clone()).collect();
        ali.package.types = ali.types.iter().map(|t| t.name.clone()).collect();

        if self.verbose {
            tracing::debug!(
                path = %path.display(),
                dependencies = ali.package.dependencies.len(),
                functions = ali.functions.len(),
                "parsed ALI file"
            );
        }

        Ok(ali)
    }

    fn parse_flag(&self, flag: &str, build_info: &mut AdaBuildInfo) {
        if flag.is_empty() {
            return;
        }
        let flag = flag.to_string();
        if SECURITY_FLAGS.contains(&flag.as_str()) {
            build_info.security_flags.push(flag.clone());
        }
        if OPTIMIZATION_FLAGS.contains(&flag.as_str()) {
            build_info.optimization_flags.push(flag.clone());
        }
        if !build_info.compilation_flags.contains(&flag) {
            build_info.compilation_flags.push(flag);
        }
    }

    fn parse_unit(&self, rest: &str, ali: &mut AliFile) {
        let mut parts = rest.split_whitespace();
        let Some(unit) = parts.next() else { return };

        if let Some((name, kind)) = unit.split_once('%') {
            ali.package.name = name.to_string();
            ali.package.is_specification = kind == "s";
            ali.package.is_runtime = self.is_runtime_package(name);
        }
        if let Some(source) = parts.next() {
            ali.package.source_file = source.to_string();
        }
    }

    /// Parses a with-clause: `W unit%{s|b} source_file ali_file`.
    fn parse_with_clause(&self, rest: &str, ali: &mut AliFile) {
        let mut parts = rest.split_whitespace();
        let Some(unit) = parts.next() else { return };

        let package = unit.split('%').next().unwrap_or(unit).to_string();
        if package.is_empty() {
            return;
        }

        let excluded = self.exclude_runtime_packages && self.is_runtime_package(&package);
        if !excluded && !ali.package.dependencies.contains(&package) {
            ali.package.dependencies.push(package);
        }

        if let Some(source) = parts.next() {
            let name = Path::new(source)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.to_string());
            if !excluded && !ali.source_files.contains(&name) {
                ali.source_files.push(name);
            }
        }
    }

    /// Parses a dependency line: `D source_file timestamp checksum`.
    fn parse_dependency_file(&self, rest: &str, ali: &mut AliFile) {
        let mut parts = rest.split_whitespace();
        let Some(file) = parts.next() else { return };
        let file = file.to_string();

        if let Some(timestamp) = parts.next() {
            ali.build_info
                .file_timestamps
                .push((file.clone(), timestamp.to_string()));
            if ali.package.timestamp.is_empty() {
                ali.package.timestamp = timestamp.to_string();
            }
        }
        if let Some(checksum) = parts.next() {
            ali.build_info
                .file_checksums
                .push((file.clone(), checksum.to_string()));
            if ali.package.checksum.is_empty() {
                ali.package.checksum = checksum.to_string();
            }
        }

        if !ali.source_files.contains(&file) {
            ali.source_files.push(file);
        }
    }

    fn parse_cross_reference(&self, rest: &str, package: &str, ali: &mut AliFile) {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() < 2 {
            return;
        }

        ali.cross_references.push(AdaCrossReference {
            caller_function: tokens[0].to_string(),
            caller_package: package.to_string(),
            called_function: tokens[1].to_string(),
            called_package: package.to_string(),
            relationship: "calls".to_string(),
            ..Default::default()
        });
    }

    /// Finds all ALI files beneath `dir`.
    ///
    /// The walk is bounded by a 30-second wall-clock budget; on expiry the
    /// files found so far are returned with `timed_out` set.
    pub fn find_ali_files(&self, dir: &Path) -> AliScan {
        let started = Instant::now();
        let mut scan = AliScan::default();

        for entry in WalkDir::new(dir).follow_links(false).into_iter().flatten() {
            if started.elapsed() >= SCAN_TIMEOUT {
                scan.timed_out = true;
                tracing::warn!(
                    dir = %dir.display(),
                    found = scan.ali_files.len(),
                    "ALI scan timed out, returning partial results"
                );
                break;
            }

            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ali"))
            {
                scan.ali_files.push(path.to_path_buf());
            }
        }

        scan.ali_files.sort();
        scan
    }

    /// Renders the per-package property entries for a parsed package.
    ///
    /// Keys are prefixed `ada.package.<name>.`; the aggregator copies them
    /// into the component's property map.
    pub fn package_properties(&self, package: &AdaPackageInfo) -> Vec<(String, String)> {
        let prefix = format!("ada.package.{}", package.name);
        vec![
            (format!("{prefix}.source_file"), package.source_file.clone()),
            (format!("{prefix}.checksum"), package.checksum.clone()),
            (format!("{prefix}.timestamp"), package.timestamp.clone()),
            (
                format!("{prefix}.is_specification"),
                package.is_specification.to_string(),
            ),
            (
                format!("{prefix}.is_runtime"),
                package.is_runtime.to_string(),
            ),
        ]
    }

    /// Renders the cross references as a DOT call graph.
    pub fn call_graph(&self, cross_references: &[AdaCrossReference]) -> String {
        let mut graph = String::from("digraph CallGraph {\n");
        for xref in cross_references {
            graph.push_str(&format!(
                "  \"{}.{}\" -> \"{}.{}\";\n",
                xref.caller_package, xref.caller_function, xref.called_package, xref.called_function
            ));
        }
        graph.push_str("}\n");
        graph
    }
}

impl BinaryExtractor for AdaExtractor {
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        let ali = self.parse_ali_file(path)?;
        let package = ali.package.name.clone();
        Ok(ali
            .functions
            .into_iter()
            .map(|function| SymbolInfo {
                name: function.name,
                defined: true,
                global: function.is_public,
                section: package.clone(),
                ..Default::default()
            })
            .collect())
    }

    fn extract_sections(&self, _path: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
        Ok(Vec::new())
    }

    fn extract_version(&self, path: &Path) -> Result<String, ExtractError> {
        Ok(self.parse_ali_file(path)?.build_info.compiler_version)
    }

    fn extract_dependencies(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.parse_ali_file(path)?.package.dependencies)
    }

    fn extract_functions(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.parse_ali_file(path)?.package.functions)
    }

    fn extract_compile_units(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(vec![self.parse_ali_file(path)?.package.name])
    }

    fn extract_source_files(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.parse_ali_file(path)?.source_files)
    }

    fn can_handle(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ali")) && path.is_file()
    }

    fn format_name(&self) -> &'static str {
        "Ada"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;

    fn ali_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::Builder::new().suffix(".ali").tempfile().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_with_clause() {
        let tmp = ali_fixture("W my_package%b main.adb main.ali\n");
        let extractor = AdaExtractor::new();

        assert!(extractor.can_handle(tmp.path()));
        assert_eq!(
            extractor.extract_dependencies(tmp.path()).unwrap(),
            vec!["my_package"]
        );
        assert_eq!(
            extractor.extract_source_files(tmp.path()).unwrap(),
            vec!["main.adb"]
        );
    }

    #[test]
    fn test_runtime_packages_included_by_default() {
        let tmp = ali_fixture("W ada.strings%s a-string.ads a-string.ali\nW my_util%b my_util.adb my_util.ali\n");

        let extractor = AdaExtractor::new();
        assert_eq!(
            extractor.extract_dependencies(tmp.path()).unwrap(),
            vec!["ada.strings", "my_util"]
        );

        let excluding = AdaExtractor::new().exclude_runtime_packages();
        assert_eq!(
            excluding.extract_dependencies(tmp.path()).unwrap(),
            vec!["my_util"]
        );
    }

    #[test]
    fn test_runtime_root_segment_match() {
        let extractor = AdaExtractor::new();
        assert!(extractor.is_runtime_package("ada"));
        assert!(extractor.is_runtime_package("ada.strings.unbounded"));
        assert!(extractor.is_runtime_package("system.tasking"));
        assert!(!extractor.is_runtime_package("my_package"));
    }

    #[test]
    fn test_version_and_flags() {
        let tmp = ali_fixture("V \"GNAT Lib v12\"\nA -O2\nA -fstack-protector-strong\nA -gnatwa\n");
        let extractor = AdaExtractor::new();

        assert_eq!(extractor.extract_version(tmp.path()).unwrap(), "GNAT Lib v12");

        let ali = extractor.parse_ali_file(tmp.path()).unwrap();
        assert_eq!(ali.build_info.optimization_flags, vec!["-O2"]);
        assert_eq!(
            ali.build_info.security_flags,
            vec!["-fstack-protector-strong"]
        );
        assert_eq!(ali.build_info.compilation_flags.len(), 3);
    }

    #[test]
    fn test_unit_line() {
        let tmp = ali_fixture("U my_package%s my_package.ads 12ab34cd NE OO PK\n");
        let ali = AdaExtractor::new().parse_ali_file(tmp.path()).unwrap();

        assert_eq!(ali.package.name, "my_package");
        assert!(ali.package.is_specification);
        assert_eq!(ali.package.source_file, "my_package.ads");
    }

    #[test]
    fn test_dependency_files() {
        let tmp = ali_fixture("D main.adb 20250101120000 89abcdef\nD util.ads 20250101120001 00112233\n");
        let ali = AdaExtractor::new().parse_ali_file(tmp.path()).unwrap();

        assert_eq!(
            ali.source_files,
            vec!["main.adb".to_string(), "util.ads".to_string()]
        );
        assert_eq!(ali.package.timestamp, "20250101120000");
        assert_eq!(ali.package.checksum, "89abcdef");
        assert_eq!(ali.build_info.file_timestamps.len(), 2);
    }

    #[test]
    fn test_package_properties() {
        let tmp = ali_fixture(
            "U my_package%s my_package.ads 12ab34cd NE OO PK\nD my_package.ads 20250101120000 89abcdef\n",
        );
        let extractor = AdaExtractor::new();
        let ali = extractor.parse_ali_file(tmp.path()).unwrap();

        let properties = extractor.package_properties(&ali.package);
        let lookup = |key: &str| {
            properties
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(
            lookup("ada.package.my_package.source_file"),
            Some("my_package.ads")
        );
        assert_eq!(lookup("ada.package.my_package.checksum"), Some("89abcdef"));
        assert_eq!(
            lookup("ada.package.my_package.timestamp"),
            Some("20250101120000")
        );
        assert_eq!(
            lookup("ada.package.my_package.is_specification"),
            Some("true")
        );
        assert_eq!(lookup("ada.package.my_package.is_runtime"), Some("false"));
    }

    #[test]
    fn test_call_graph() {
        let extractor = AdaExtractor::new();
        let refs = vec![AdaCrossReference {
            caller_function: "main".into(),
            caller_package: "app".into(),
            called_function: "compute".into(),
            called_package: "app".into(),
            relationship: "calls".into(),
            ..Default::default()
        }];

        let graph = extractor.call_graph(&refs);
        assert!(graph.starts_with("digraph CallGraph {"));
        assert!(graph.contains("\"app.main\" -> \"app.compute\";"));
    }

    #[test]
    fn test_find_ali_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.ali"), "V \"GNAT Lib v12\"\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/two.ali"), "").unwrap();
        std::fs::write(dir.path().join("other.txt"), "").unwrap();

        let scan = AdaExtractor::new().find_ali_files(dir.path());
        assert!(!scan.timed_out);
        assert_eq!(scan.ali_files.len(), 2);
    }

    #[test]
    fn test_malformed_lines_ignored() {
        let tmp = ali_fixture("garbage\nW\nD\nX\n\nW solo%b\n");
        let ali = AdaExtractor::new().parse_ali_file(tmp.path()).unwrap();
        assert_eq!(ali.package.dependencies, vec!["solo"]);
    }
}
