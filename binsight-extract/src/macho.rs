//! Support for Mach Objects, used on macOS and iOS.

use std::collections::HashSet;
use std::path::Path;

use debugid::CodeId;
use goblin::mach::constants::cputype;
use goblin::mach::load_command::CommandVariant;
use goblin::mach::{self, Mach, MachO, SingleArch};
use scroll::Pread;

use binsight_common::ByteView;

use crate::base::{
    ArchitectureInfo, BuildConfig, ExtractError, ExtractErrorKind, FileFormat, FileKind,
    PlatformInfo, SectionInfo, SymbolInfo,
};
use crate::detector::detect_format;
use crate::extractor::BinaryExtractor;

const FAT_MAGIC: u32 = 0xCAFE_BABE;
const FAT_MAGIC_64: u32 = 0xCAFE_BABF;

/// Apple platform identifiers carried by `LC_BUILD_VERSION`.
const PLATFORM_MACOS: u32 = 1;
const PLATFORM_IOS: u32 = 2;
const PLATFORM_TVOS: u32 = 3;
const PLATFORM_WATCHOS: u32 = 4;
const PLATFORM_MACCATALYST: u32 = 6;
const PLATFORM_IOS_SIMULATOR: u32 = 7;
const PLATFORM_TVOS_SIMULATOR: u32 = 8;
const PLATFORM_WATCHOS_SIMULATOR: u32 = 9;

/// Extracts metadata from Mach-O images and fat containers.
///
/// Fat containers are transparently resolved to their first architecture for
/// symbol, section and dependency extraction; all sub-architectures are
/// reported through [`architectures`].
///
/// [`architectures`]: Self::architectures
pub struct MachOExtractor {
    verbose: bool,
}

impl Default for MachOExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MachOExtractor {
    /// Creates an extractor with default configuration.
    pub fn new() -> Self {
        MachOExtractor { verbose: false }
    }

    fn with_macho<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&MachO<'_>) -> T,
    ) -> Result<T, ExtractError> {
        let view = ByteView::open(path).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::NotFound,
                format!("cannot open {}", path.display()),
                err,
            )
        })?;

        let macho = match Mach::parse(&view).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::Malformed,
                format!("cannot parse Mach-O file {}", path.display()),
                err,
            )
        })? {
            Mach::Binary(macho) => macho,
            Mach::Fat(multi) => match multi.get(0).map_err(|err| {
                ExtractError::with_source(
                    ExtractErrorKind::Malformed,
                    format!("fat container without readable arch in {}", path.display()),
                    err,
                )
            })? {
                SingleArch::MachO(macho) => macho,
                SingleArch::Archive(_) => {
                    return Err(ExtractError::new(
                        ExtractErrorKind::Malformed,
                        format!("fat container without readable arch in {}", path.display()),
                    ))
                }
            },
        };

        Ok(f(&macho))
    }

    /// Enumerates all architectures contained in the file.
    ///
    /// For a fat container this yields one entry per `fat_arch` record; a
    /// single-arch image yields one entry covering the whole file.
    pub fn architectures(&self, path: &Path) -> Result<Vec<ArchitectureInfo>, ExtractError> {
        let view = ByteView::open(path).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::NotFound,
                format!("cannot open {}", path.display()),
                err,
            )
        })?;

        if let Some(arches) = parse_fat_header(&view) {
            return Ok(arches);
        }

        let size = view.len() as u64;
        self.with_macho(path, |macho| {
            vec![ArchitectureInfo {
                name: arch_name(macho.header.cputype()).to_string(),
                cpu_type: macho.header.cputype(),
                cpu_subtype: macho.header.cpusubtype(),
                offset: 0,
                size,
                align: 0,
            }]
        })
    }

    /// Platform facts from the primary image's version load commands.
    pub fn platform_info(&self, path: &Path) -> Result<PlatformInfo, ExtractError> {
        self.with_macho(path, |macho| {
            let mut info = PlatformInfo {
                architecture: arch_name(macho.header.cputype()).to_string(),
                platform: "macos".to_string(),
                ..Default::default()
            };

            for cmd in &macho.load_commands {
                match cmd.command {
                    CommandVariant::BuildVersion(ref build) => {
                        info.platform = platform_name(build.platform).to_string();
                        info.min_version = format_version32(build.minos);
                        info.sdk_version = format_version32(build.sdk);
                        info.is_simulator = matches!(
                            build.platform,
                            PLATFORM_IOS_SIMULATOR
                                | PLATFORM_TVOS_SIMULATOR
                                | PLATFORM_WATCHOS_SIMULATOR
                        );
                    }
                    CommandVariant::VersionMinMacosx(ref min) => {
                        info.min_version = format_version32(min.version);
                        info.sdk_version = format_version32(min.sdk);
                    }
                    CommandVariant::VersionMinIphoneos(ref min) => {
                        info.platform = "ios".to_string();
                        info.min_version = format_version32(min.version);
                        info.sdk_version = format_version32(min.sdk);
                    }
                    _ => (),
                }
            }

            info
        })
    }

    /// Build configuration facts from the version load commands.
    pub fn build_config(&self, path: &Path) -> Result<BuildConfig, ExtractError> {
        self.with_macho(path, |macho| {
            let mut config = BuildConfig::default();

            for cmd in &macho.load_commands {
                match cmd.command {
                    CommandVariant::SourceVersion(ref source) => {
                        config.source_version = format_source_version(source.version);
                    }
                    CommandVariant::BuildVersion(ref build) => {
                        config.build_version = format_version32(build.sdk);
                        config.min_os_version = format_version32(build.minos);
                    }
                    CommandVariant::VersionMinMacosx(ref min)
                    | CommandVariant::VersionMinIphoneos(ref min) => {
                        if config.min_os_version.is_empty() {
                            config.min_os_version = format_version32(min.version);
                        }
                    }
                    _ => (),
                }
            }

            config
        })
    }

    /// The role of the file, as declared in the Mach header.
    pub fn file_kind(&self, path: &Path) -> Result<FileKind, ExtractError> {
        self.with_macho(path, |macho| match macho.header.filetype {
            mach::header::MH_EXECUTE | mach::header::MH_PRELOAD => FileKind::Executable,
            mach::header::MH_DYLIB | mach::header::MH_BUNDLE => FileKind::SharedLibrary,
            mach::header::MH_OBJECT => FileKind::Object,
            _ => FileKind::Unknown,
        })
    }

    /// Whether the image has no `LC_SYMTAB` entries.
    pub fn is_stripped(&self, path: &Path) -> Result<bool, ExtractError> {
        self.with_macho(path, |macho| macho.symbols().next().is_none())
    }

    /// The image UUID from `LC_UUID` as a lowercase hex string, if present.
    pub fn uuid(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        self.with_macho(path, |macho| {
            macho.load_commands.iter().find_map(|cmd| match cmd.command {
                CommandVariant::Uuid(ref uuid) => {
                    Some(CodeId::from_binary(&uuid.uuid[..]).to_string())
                }
                _ => None,
            })
        })
    }
}

impl BinaryExtractor for MachOExtractor {
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        self.with_macho(path, |macho| {
            // Section names are referenced by 1-based index from nlist entries.
            let mut section_names = Vec::new();
            for segment in &macho.segments {
                for section in segment.into_iter().flatten() {
                    let (header, _data) = section;
                    section_names.push(header.name().unwrap_or("").to_string());
                }
            }

            let mut symbols = Vec::new();
            let mut seen = HashSet::new();

            for result in macho.symbols() {
                let (name, nlist) = match result {
                    Ok(entry) => entry,
                    Err(_) => continue,
                };

                if name.is_empty() || nlist.is_stab() {
                    continue;
                }

                if !seen.insert((name.to_string(), nlist.n_value)) {
                    continue;
                }

                let section = if nlist.n_sect > 0 {
                    section_names
                        .get(nlist.n_sect - 1)
                        .cloned()
                        .unwrap_or_default()
                } else {
                    String::new()
                };

                symbols.push(SymbolInfo {
                    name: name.to_string(),
                    address: nlist.n_value,
                    size: 0,
                    defined: !nlist.is_undefined(),
                    global: nlist.is_global(),
                    weak: nlist.is_weak(),
                    section,
                });
            }

            if self.verbose {
                tracing::debug!(
                    path = %path.display(),
                    count = symbols.len(),
                    "extracted Mach-O symbols"
                );
            }

            symbols
        })
    }

    fn extract_sections(&self, path: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
        self.with_macho(path, |macho| {
            let mut sections = Vec::new();
            for segment in &macho.segments {
                for section in segment.into_iter().flatten() {
                    let (header, _data) = section;
                    sections.push(SectionInfo {
                        name: header.name().unwrap_or("").to_string(),
                        kind: header.segname().unwrap_or("").to_string(),
                        address: header.addr,
                        size: header.size,
                        flags: u64::from(header.flags),
                    });
                }
            }
            sections
        })
    }

    fn extract_version(&self, path: &Path) -> Result<String, ExtractError> {
        self.with_macho(path, |macho| {
            macho
                .load_commands
                .iter()
                .find_map(|cmd| match cmd.command {
                    CommandVariant::SourceVersion(ref source) if source.version != 0 => {
                        Some(format_source_version(source.version))
                    }
                    _ => None,
                })
                .unwrap_or_default()
        })
    }

    fn extract_dependencies(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        self.with_macho(path, |macho| {
            let mut seen = HashSet::new();
            macho
                .libs
                .iter()
                .filter(|lib| **lib != "self")
                .map(|lib| lib.rsplit('/').next().unwrap_or(lib).to_string())
                .filter(|lib| seen.insert(lib.clone()))
                .collect()
        })
    }

    fn can_handle(&self, path: &Path) -> bool {
        detect_format(path) == FileFormat::MachO
    }

    fn format_name(&self) -> &'static str {
        "Mach-O"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

/// Maps a Mach-O CPU type to a human-readable architecture name.
pub(crate) fn arch_name(cputype: u32) -> &'static str {
    match cputype {
        cputype::CPU_TYPE_I386 => "i386",
        cputype::CPU_TYPE_X86_64 => "x86_64",
        cputype::CPU_TYPE_ARM => "arm",
        cputype::CPU_TYPE_ARM64 => "arm64",
        cputype::CPU_TYPE_POWERPC => "ppc",
        cputype::CPU_TYPE_POWERPC64 => "ppc64",
        _ => "unknown",
    }
}

fn platform_name(platform: u32) -> &'static str {
    match platform {
        PLATFORM_MACOS => "macos",
        PLATFORM_IOS | PLATFORM_IOS_SIMULATOR => "ios",
        PLATFORM_TVOS | PLATFORM_TVOS_SIMULATOR => "tvos",
        PLATFORM_WATCHOS | PLATFORM_WATCHOS_SIMULATOR => "watchos",
        PLATFORM_MACCATALYST => "maccatalyst",
        _ => "macos",
    }
}

/// Formats an `X.Y.Z` version packed into a u32 as nibbles `xxxx.yy.zz`.
fn format_version32(version: u32) -> String {
    if version == 0 {
        return String::new();
    }
    format!(
        "{}.{}.{}",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

/// Formats an `A.B.C.D.E` source version packed into a u64.
fn format_source_version(version: u64) -> String {
    format!(
        "{}.{}.{}.{}.{}",
        version >> 40,
        (version >> 30) & 0x3ff,
        (version >> 20) & 0x3ff,
        (version >> 10) & 0x3ff,
        version & 0x3ff
    )
}

/// Parses a fat header directly from the start of a buffer.
///
/// Fat headers are always big-endian, regardless of the host or the contained
/// images. Returns `None` when the buffer does not start with a fat magic; an
/// empty architecture list (`nfat_arch == 0`) is valid and yields `Some(vec![])`.
pub(crate) fn parse_fat_header(data: &[u8]) -> Option<Vec<ArchitectureInfo>> {
    let magic: u32 = data.pread_with(0, scroll::BE).ok()?;
    let is_64 = match magic {
        FAT_MAGIC => false,
        FAT_MAGIC_64 => true,
        _ => return None,
    };

    let nfat_arch: u32 = data.pread_with(4, scroll::BE).ok()?;
    let entry_size = if is_64 { 32 } else { 20 };

    let mut arches = Vec::new();
    for index in 0..nfat_arch as usize {
        let base = 8 + index * entry_size;
        let cpu_type: u32 = data.pread_with(base, scroll::BE).ok()?;
        let cpu_subtype: u32 = data.pread_with(base + 4, scroll::BE).ok()?;

        let (offset, size, align) = if is_64 {
            (
                data.pread_with::<u64>(base + 8, scroll::BE).ok()?,
                data.pread_with::<u64>(base + 16, scroll::BE).ok()?,
                data.pread_with::<u32>(base + 24, scroll::BE).ok()?,
            )
        } else {
            (
                u64::from(data.pread_with::<u32>(base + 8, scroll::BE).ok()?),
                u64::from(data.pread_with::<u32>(base + 12, scroll::BE).ok()?),
                data.pread_with::<u32>(base + 16, scroll::BE).ok()?,
            )
        };

        arches.push(ArchitectureInfo {
            name: arch_name(cpu_type).to_string(),
            cpu_type,
            cpu_subtype,
            offset,
            size,
            align,
        });
    }

    Some(arches)
}
