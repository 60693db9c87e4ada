//! Support for DWARF debugging information, common to ELF and MachO.
//!
//! Extraction runs through three layers. The primary path hands the debug
//! sections to `gimli` and walks compile units, subprogram DIEs and the line
//! program file tables. When the structured sections cannot be parsed, a
//! lightweight fallback reads `.debug_abbrev`/`.debug_info` and `.debug_line`
//! directly with hard bounds on every read. As a last resort, a raw scan over
//! the file recovers plausible source file names; its output is advisory.
//!
//! The underlying DWARF machinery is not re-entrant across threads, so all
//! structured extraction is serialized behind a process-wide mutex.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use flate2::{Decompress, FlushDecompress};
use gimli::{constants, EndianSlice, RunTimeEndian};
use goblin::elf::{self, Elf};
use goblin::mach::{Mach, MachO};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use binsight_common::{decode_sleb128, decode_uleb128, ByteView};

use crate::base::{ExtractError, ExtractErrorKind, SectionInfo, SymbolInfo};
use crate::extractor::BinaryExtractor;

/// Serializes all structured DWARF parsing within the process.
static DWARF_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Upper bound on how much of any DWARF section is read into memory.
const MAX_SECTION_BYTES: usize = 1024 * 1024;

/// Upper bound on string length in the line-program parser.
const MAX_LINE_STRING: usize = 1024;

/// Upper bound on string length in the raw-scan heuristic.
const MAX_HEURISTIC_STRING: usize = 512;

/// How much of the file head is scanned for debug section name literals.
const PROBE_BYTES: usize = 1024;

const SHF_COMPRESSED: u64 = elf::section_header::SHF_COMPRESSED as u64;

/// Extracts source files, compile units and function names from DWARF data.
///
/// Also acts as a `has_dwarf_info` probe through [`can_handle`]. This
/// extractor never competes with the format parsers for primary dispatch; its
/// [`priority`] ranks behind all of them and its non-debug operations return
/// empty results.
///
/// [`can_handle`]: BinaryExtractor::can_handle
/// [`priority`]: BinaryExtractor::priority
pub struct DwarfExtractor {
    verbose: bool,
}

impl Default for DwarfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned copies of the DWARF sections of one file.
#[derive(Debug, Default)]
struct DwarfSections {
    little_endian: bool,
    sections: BTreeMap<String, Vec<u8>>,
}

impl DwarfSections {
    fn get(&self, name: &str) -> &[u8] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn endian(&self) -> RunTimeEndian {
        if self.little_endian {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        }
    }
}

impl DwarfExtractor {
    /// Creates an extractor with default configuration.
    pub fn new() -> Self {
        DwarfExtractor { verbose: false }
    }

    /// Determines whether the file carries DWARF debug information.
    ///
    /// Walks the section headers for names beginning with `.debug_` or
    /// `.zdebug_` (`__debug_` for Mach-O), consults a sibling dSYM bundle on
    /// macOS layouts, and falls back to scanning the first KiB of the file
    /// for the section name literals.
    pub fn has_dwarf_info(&self, path: &Path) -> bool {
        let source = dwarf_source(path);
        let view = match ByteView::open(&source) {
            Ok(view) => view,
            Err(_) => return false,
        };

        if let Ok(elf) = Elf::parse(&view) {
            return elf.section_headers.iter().any(|header| {
                matches!(
                    elf.shdr_strtab.get_at(header.sh_name),
                    Some(name) if name.starts_with(".debug_") || name.starts_with(".zdebug_")
                )
            });
        }

        if let Ok(Mach::Binary(macho)) = Mach::parse(&view) {
            return macho_section_names(&macho)
                .iter()
                .any(|name| name.starts_with("__debug_"));
        }

        let probe = &view[..view.len().min(PROBE_BYTES)];
        contains_subslice(probe, b".debug_") || contains_subslice(probe, b".zdebug_")
    }

    fn load_sections(&self, path: &Path) -> Result<DwarfSections, ExtractError> {
        let source = dwarf_source(path);
        let view = ByteView::open(&source).map_err(|err| {
            ExtractError::with_source(
                ExtractErrorKind::NotFound,
                format!("cannot open {}", source.display()),
                err,
            )
        })?;

        if let Ok(elf) = Elf::parse(&view) {
            return Ok(elf_dwarf_sections(&elf, &view));
        }

        if let Ok(Mach::Binary(macho)) = Mach::parse(&view) {
            return Ok(macho_dwarf_sections(&macho));
        }

        Err(ExtractError::new(
            ExtractErrorKind::NotSupported,
            format!("{} carries no parseable debug sections", source.display()),
        ))
    }

    /// Runs the gimli-based extraction; `None` when no structured data exists.
    fn structured_facts(&self, sections: &DwarfSections) -> Option<DebugFacts> {
        if sections.get("debug_info").is_empty() {
            return None;
        }

        let _guard = DWARF_LOCK.lock();

        let dwarf = load_dwarf(sections).ok()?;
        let mut facts = DebugFacts::default();

        let mut headers = dwarf.units();
        // Malformed units end the walk; everything collected so far is kept.
        while let Ok(Some(header)) = headers.next() {
            let unit = match dwarf.unit(header) {
                Ok(unit) => unit,
                Err(_) => continue,
            };

            let mut entries = unit.entries();
            while let Ok(Some((_, entry))) = entries.next_dfs() {
                let tag = entry.tag();
                if tag != constants::DW_TAG_compile_unit && tag != constants::DW_TAG_subprogram {
                    continue;
                }

                let name = entry
                    .attr_value(constants::DW_AT_name)
                    .ok()
                    .flatten()
                    .or_else(|| {
                        entry
                            .attr_value(constants::DW_AT_linkage_name)
                            .ok()
                            .flatten()
                    })
                    .and_then(|value| dwarf.attr_string(&unit, value).ok())
                    .map(|slice| slice.to_string_lossy().into_owned());

                let Some(name) = name else { continue };

                if tag == constants::DW_TAG_compile_unit {
                    facts.compile_units.push(name);
                } else {
                    facts.functions.push(name);
                }
            }

            if let Some(program) = unit.line_program.clone() {
                let header = program.header();
                for file in header.file_names() {
                    let name = dwarf
                        .attr_string(&unit, file.path_name())
                        .ok()
                        .map(|slice| slice.to_string_lossy().into_owned());
                    if let Some(name) = name {
                        if !name.is_empty() {
                            facts.source_files.push(name);
                        }
                    }
                }
            }
        }

        if facts.is_empty() {
            None
        } else {
            Some(facts)
        }
    }

    /// Runs the lightweight fallback over raw section data.
    fn fallback_facts(&self, sections: &DwarfSections) -> DebugFacts {
        let mut facts = DebugFacts::default();
        let little = sections.little_endian;

        let (compile_units, functions) = parse_debug_info(
            sections.get("debug_info"),
            sections.get("debug_abbrev"),
            sections.get("debug_str"),
            little,
        );
        facts.compile_units = compile_units;
        facts.functions = functions;

        if let Some(files) = parse_debug_line(sections.get("debug_line"), little) {
            facts.source_files = files;
        }

        facts
    }

    fn facts(&self, path: &Path) -> DebugFacts {
        let mut facts = match self.load_sections(path) {
            Ok(sections) => self
                .structured_facts(&sections)
                .unwrap_or_else(|| self.fallback_facts(&sections)),
            Err(_) => DebugFacts::default(),
        };

        if facts.source_files.is_empty() && facts.compile_units.is_empty() {
            // Last resort; advisory only.
            if let Ok(view) = ByteView::open(dwarf_source(path)) {
                facts.source_files = scan_source_files(&view);
            }
        }

        if self.verbose {
            tracing::debug!(
                path = %path.display(),
                functions = facts.functions.len(),
                compile_units = facts.compile_units.len(),
                source_files = facts.source_files.len(),
                "extracted debug facts"
            );
        }

        facts.dedup();
        facts
    }
}

/// Debug facts recovered from one file.
#[derive(Debug, Default)]
struct DebugFacts {
    functions: Vec<String>,
    compile_units: Vec<String>,
    source_files: Vec<String>,
}

impl DebugFacts {
    fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.compile_units.is_empty() && self.source_files.is_empty()
    }

    fn dedup(&mut self) {
        for list in [
            &mut self.functions,
            &mut self.compile_units,
            &mut self.source_files,
        ] {
            let mut seen = std::collections::HashSet::new();
            list.retain(|item| seen.insert(item.clone()));
        }
    }
}

impl BinaryExtractor for DwarfExtractor {
    fn extract_symbols(&self, path: &Path) -> Result<Vec<SymbolInfo>, ExtractError> {
        Ok(self
            .facts(path)
            .functions
            .into_iter()
            .map(|name| SymbolInfo {
                name,
                defined: true,
                global: true,
                section: ".debug_info".to_string(),
                ..Default::default()
            })
            .collect())
    }

    fn extract_sections(&self, _path: &Path) -> Result<Vec<SectionInfo>, ExtractError> {
        Ok(Vec::new())
    }

    fn extract_version(&self, _path: &Path) -> Result<String, ExtractError> {
        Ok(String::new())
    }

    fn extract_dependencies(&self, _path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(Vec::new())
    }

    fn extract_functions(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.facts(path).functions)
    }

    fn extract_compile_units(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.facts(path).compile_units)
    }

    fn extract_source_files(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.facts(path).source_files)
    }

    fn can_handle(&self, path: &Path) -> bool {
        self.has_dwarf_info(path)
    }

    fn format_name(&self) -> &'static str {
        "DWARF"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

/// Builds a gimli session over the owned section copies.
fn load_dwarf(
    sections: &DwarfSections,
) -> Result<gimli::Dwarf<EndianSlice<'_, RunTimeEndian>>, gimli::Error> {
    let endian = sections.endian();
    gimli::Dwarf::load(|id| {
        let name = id.name().trim_start_matches('.');
        Ok(EndianSlice::new(sections.get(name), endian))
    })
}

/// Resolves the file that actually carries the DWARF data.
///
/// On macOS, debug information is moved into a sibling dSYM bundle by
/// `dsymutil`; when `<file>.dSYM/Contents/Resources/DWARF/<basename>` exists
/// it takes precedence over the binary itself.
fn dwarf_source(path: &Path) -> PathBuf {
    if let Some(basename) = path.file_name() {
        let mut bundle = path.as_os_str().to_owned();
        bundle.push(".dSYM");
        let candidate = PathBuf::from(bundle)
            .join("Contents/Resources/DWARF")
            .join(basename);
        if candidate.is_file() {
            return candidate;
        }
    }

    path.to_path_buf()
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

fn macho_section_names(macho: &MachO<'_>) -> Vec<String> {
    let mut names = Vec::new();
    for segment in &macho.segments {
        for section in segment.into_iter().flatten() {
            let (header, _data) = section;
            names.push(header.name().unwrap_or("").to_string());
        }
    }
    names
}

fn elf_dwarf_sections(elf: &Elf<'_>, data: &[u8]) -> DwarfSections {
    let mut sections = DwarfSections {
        little_endian: elf.little_endian,
        ..Default::default()
    };

    for header in &elf.section_headers {
        let Some(name) = elf.shdr_strtab.get_at(header.sh_name) else {
            continue;
        };

        let (compressed, canonical) = if let Some(stripped) = name.strip_prefix(".zdebug_") {
            (true, format!("debug_{stripped}"))
        } else if let Some(stripped) = name.strip_prefix(".debug_") {
            (
                header.sh_flags & SHF_COMPRESSED != 0,
                format!("debug_{stripped}"),
            )
        } else {
            continue;
        };

        let offset = header.sh_offset as usize;
        let size = header.sh_size as usize;
        let Some(raw) = data.get(offset..offset.saturating_add(size)) else {
            continue;
        };

        let mut bytes = if compressed {
            match decompress_section(raw, elf.little_endian) {
                Some(bytes) => bytes,
                None => continue,
            }
        } else {
            raw.to_vec()
        };

        bytes.truncate(MAX_SECTION_BYTES);
        sections.sections.insert(canonical, bytes);
    }

    sections
}

fn macho_dwarf_sections(macho: &MachO<'_>) -> DwarfSections {
    let mut sections = DwarfSections {
        little_endian: macho.little_endian,
        ..Default::default()
    };

    for segment in &macho.segments {
        for section in segment.into_iter().flatten() {
            let (header, data) = section;
            let Ok(name) = header.name() else { continue };
            let Some(stripped) = name.strip_prefix("__debug_") else {
                continue;
            };

            let mut bytes = data.to_vec();
            bytes.truncate(MAX_SECTION_BYTES);
            sections
                .sections
                .insert(format!("debug_{stripped}"), bytes);
        }
    }

    sections
}

/// Inflates a compressed debug section.
///
/// Handles both the GNU `ZLIB` magic prefix used by `.zdebug_*` sections and
/// the `SHF_COMPRESSED` layout, whose compression header is skipped by the
/// caller passing the payload only. Data beyond the section cap is dropped.
fn decompress_section(section_data: &[u8], little: bool) -> Option<Vec<u8>> {
    let (size, compressed) = if section_data.starts_with(b"ZLIB") {
        // 4 byte magic, followed by an 8-byte big-endian size prefix.
        if section_data.len() < 12 {
            return None;
        }

        let mut size_bytes = [0; 8];
        size_bytes.copy_from_slice(&section_data[4..12]);

        (u64::from_be_bytes(size_bytes), &section_data[12..])
    } else {
        // SHF_COMPRESSED: Elf64_Chdr is 24 bytes; ch_type must be ZLIB (1).
        if section_data.len() < 24 {
            return None;
        }
        let ch_type = read_u32(section_data, 0, little)?;
        if ch_type != 1 {
            return None;
        }
        let ch_size = read_u64(section_data, 8, little)?;
        (ch_size, &section_data[24..])
    };

    let capped = size.min(MAX_SECTION_BYTES as u64) as usize;
    let mut decompressed = Vec::with_capacity(capped);
    Decompress::new(true)
        .decompress_vec(compressed, &mut decompressed, FlushDecompress::Finish)
        .ok()?;

    decompressed.truncate(MAX_SECTION_BYTES);
    Some(decompressed)
}

/// One abbreviation declaration from `.debug_abbrev`.
#[derive(Debug)]
struct AbbrevDecl {
    tag: u64,
    attrs: Vec<(u64, u64)>,
}

/// Parses the abbreviation table at `offset` into a code → declaration map.
///
/// Abbreviation codes are not DIE tags; every DIE walk must resolve its code
/// through this table before the tag can be inspected.
fn parse_abbrev_table(data: &[u8], table_offset: usize) -> HashMap<u64, AbbrevDecl> {
    let mut table = HashMap::new();
    let mut offset = table_offset;

    loop {
        let Some(code) = decode_uleb128(data, &mut offset) else {
            break;
        };
        if code == 0 {
            break;
        }

        let Some(tag) = decode_uleb128(data, &mut offset) else {
            break;
        };
        // has_children flag.
        if offset >= data.len() {
            break;
        }
        offset += 1;

        let mut attrs = Vec::new();
        loop {
            let Some(attr) = decode_uleb128(data, &mut offset) else {
                return table;
            };
            let Some(form) = decode_uleb128(data, &mut offset) else {
                return table;
            };
            if attr == 0 && form == 0 {
                break;
            }
            // DW_FORM_implicit_const carries its value inline in the table.
            if form == constants::DW_FORM_implicit_const.0 as u64
                && decode_sleb128(data, &mut offset).is_none()
            {
                return table;
            }
            attrs.push((attr, form));
        }

        table.insert(code, AbbrevDecl { tag, attrs });
    }

    table
}

fn read_u16(data: &[u8], offset: usize, little: bool) -> Option<u16> {
    let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
    Some(if little {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    })
}

fn read_u32(data: &[u8], offset: usize, little: bool) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(if little {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    })
}

fn read_u64(data: &[u8], offset: usize, little: bool) -> Option<u64> {
    let bytes: [u8; 8] = data.get(offset..offset + 8)?.try_into().ok()?;
    Some(if little {
        u64::from_le_bytes(bytes)
    } else {
        u64::from_be_bytes(bytes)
    })
}

fn read_cstr(data: &[u8], offset: &mut usize, max_len: usize) -> Option<String> {
    let tail = data.get(*offset..)?;
    let end = tail.iter().take(max_len).position(|&b| b == 0)?;
    let value = String::from_utf8_lossy(&tail[..end]).into_owned();
    *offset += end + 1;
    Some(value)
}

/// Advances `offset` past one attribute value of the given form.
///
/// Returns `None` on forms the parser does not implement, which aborts the
/// enclosing unit while keeping earlier results.
fn skip_form(
    data: &[u8],
    offset: &mut usize,
    form: u64,
    address_size: usize,
    little: bool,
) -> Option<()> {
    use gimli::constants as c;

    let advance = |offset: &mut usize, by: usize| {
        if *offset + by <= data.len() {
            *offset += by;
            Some(())
        } else {
            None
        }
    };

    match form {
        f if f == c::DW_FORM_addr.0 as u64 => advance(offset, address_size),
        f if f == c::DW_FORM_data1.0 as u64
            || f == c::DW_FORM_ref1.0 as u64
            || f == c::DW_FORM_flag.0 as u64
            || f == c::DW_FORM_strx1.0 as u64
            || f == c::DW_FORM_addrx1.0 as u64 =>
        {
            advance(offset, 1)
        }
        f if f == c::DW_FORM_data2.0 as u64
            || f == c::DW_FORM_ref2.0 as u64
            || f == c::DW_FORM_strx2.0 as u64
            || f == c::DW_FORM_addrx2.0 as u64 =>
        {
            advance(offset, 2)
        }
        f if f == c::DW_FORM_strx3.0 as u64 || f == c::DW_FORM_addrx3.0 as u64 => {
            advance(offset, 3)
        }
        f if f == c::DW_FORM_data4.0 as u64
            || f == c::DW_FORM_ref4.0 as u64
            || f == c::DW_FORM_strp.0 as u64
            || f == c::DW_FORM_line_strp.0 as u64
            || f == c::DW_FORM_sec_offset.0 as u64
            || f == c::DW_FORM_ref_addr.0 as u64
            || f == c::DW_FORM_strx4.0 as u64
            || f == c::DW_FORM_addrx4.0 as u64 =>
        {
            advance(offset, 4)
        }
        f if f == c::DW_FORM_data8.0 as u64
            || f == c::DW_FORM_ref8.0 as u64
            || f == c::DW_FORM_ref_sig8.0 as u64 =>
        {
            advance(offset, 8)
        }
        f if f == c::DW_FORM_data16.0 as u64 => advance(offset, 16),
        f if f == c::DW_FORM_sdata.0 as u64 => decode_sleb128(data, offset).map(|_| ()),
        f if f == c::DW_FORM_udata.0 as u64
            || f == c::DW_FORM_ref_udata.0 as u64
            || f == c::DW_FORM_strx.0 as u64
            || f == c::DW_FORM_addrx.0 as u64
            || f == c::DW_FORM_loclistx.0 as u64
            || f == c::DW_FORM_rnglistx.0 as u64 =>
        {
            decode_uleb128(data, offset).map(|_| ())
        }
        f if f == c::DW_FORM_string.0 as u64 => {
            read_cstr(data, offset, MAX_LINE_STRING).map(|_| ())
        }
        f if f == c::DW_FORM_block1.0 as u64 => {
            let len = *data.get(*offset)? as usize;
            advance(offset, 1 + len)
        }
        f if f == c::DW_FORM_block2.0 as u64 => {
            let len = read_u16(data, *offset, little)? as usize;
            advance(offset, 2 + len)
        }
        f if f == c::DW_FORM_block4.0 as u64 => {
            let len = read_u32(data, *offset, little)? as usize;
            advance(offset, 4 + len)
        }
        f if f == c::DW_FORM_block.0 as u64 || f == c::DW_FORM_exprloc.0 as u64 => {
            let len = decode_uleb128(data, offset)? as usize;
            advance(offset, len)
        }
        f if f == c::DW_FORM_flag_present.0 as u64
            || f == c::DW_FORM_implicit_const.0 as u64 =>
        {
            Some(())
        }
        _ => None,
    }
}

/// Reads a string-valued attribute, resolving `DW_FORM_strp` into `.debug_str`.
fn read_string_form(
    data: &[u8],
    offset: &mut usize,
    form: u64,
    str_data: &[u8],
    little: bool,
) -> Option<String> {
    use gimli::constants as c;

    if form == c::DW_FORM_string.0 as u64 {
        return read_cstr(data, offset, MAX_LINE_STRING);
    }
    if form == c::DW_FORM_strp.0 as u64 {
        let strp = read_u32(data, *offset, little)? as usize;
        let mut str_offset = strp;
        // Only consume the attribute once the string resolves, so a failed
        // lookup leaves the cursor for the generic skip.
        let value = read_cstr(str_data, &mut str_offset, MAX_LINE_STRING)?;
        *offset += 4;
        return Some(value);
    }

    None
}

/// Walks `.debug_info` with abbreviations resolved from `.debug_abbrev`,
/// collecting compile unit and subprogram names.
///
/// DWARF versions 2 through 4 are handled; newer units and unknown forms end
/// the walk of the current unit, preserving earlier results.
fn parse_debug_info(
    info: &[u8],
    abbrev: &[u8],
    str_data: &[u8],
    little: bool,
) -> (Vec<String>, Vec<String>) {
    let info = &info[..info.len().min(MAX_SECTION_BYTES)];

    let mut compile_units = Vec::new();
    let mut functions = Vec::new();

    let mut unit_offset = 0usize;
    while unit_offset + 11 <= info.len() {
        let Some(unit_length) = read_u32(info, unit_offset, little) else {
            break;
        };
        // DWARF64 and reserved lengths are not handled.
        if unit_length == 0 || unit_length >= 0xffff_fff0 {
            break;
        }
        let unit_end = (unit_offset + 4 + unit_length as usize).min(info.len());

        let Some(version) = read_u16(info, unit_offset + 4, little) else {
            break;
        };
        if !(2..=4).contains(&version) {
            unit_offset = unit_end;
            continue;
        }

        let Some(abbrev_offset) = read_u32(info, unit_offset + 6, little) else {
            break;
        };
        let Some(&address_size) = info.get(unit_offset + 10) else {
            break;
        };

        let table = parse_abbrev_table(abbrev, abbrev_offset as usize);
        if table.is_empty() {
            unit_offset = unit_end;
            continue;
        }

        let mut offset = unit_offset + 11;
        'dies: while offset < unit_end {
            let Some(code) = decode_uleb128(info, &mut offset) else {
                break;
            };
            if code == 0 {
                continue;
            }

            let Some(decl) = table.get(&code) else {
                break;
            };

            let wants_name = decl.tag == constants::DW_TAG_compile_unit.0 as u64
                || decl.tag == constants::DW_TAG_subprogram.0 as u64;
            let mut name: Option<String> = None;

            for &(attr, form) in &decl.attrs {
                if wants_name && attr == constants::DW_AT_name.0 as u64 {
                    if let Some(value) =
                        read_string_form(info, &mut offset, form, str_data, little)
                    {
                        name = Some(value);
                        continue;
                    }
                }
                if skip_form(info, &mut offset, form, address_size as usize, little).is_none() {
                    break 'dies;
                }
            }

            if let Some(name) = name {
                if decl.tag == constants::DW_TAG_compile_unit.0 as u64 {
                    compile_units.push(name);
                } else {
                    functions.push(name);
                }
            }
        }

        unit_offset = unit_end;
    }

    (compile_units, functions)
}

/// Parses the `.debug_line` header file tables, collecting file names.
///
/// Returns `None` when the section is absent or nothing could be parsed; a
/// header with `opcode_base == 0` is rejected cleanly. A malformed unit ends
/// the walk while keeping files collected from earlier units.
fn parse_debug_line(data: &[u8], little: bool) -> Option<Vec<String>> {
    let data = &data[..data.len().min(MAX_SECTION_BYTES)];
    if data.is_empty() {
        return None;
    }

    let mut files = Vec::new();
    let mut unit_offset = 0usize;
    let mut parsed_any = false;

    while unit_offset + 10 <= data.len() {
        let Some(unit_length) = read_u32(data, unit_offset, little) else {
            break;
        };
        if unit_length == 0 || unit_length >= 0xffff_fff0 {
            break;
        }
        let unit_end = (unit_offset + 4 + unit_length as usize).min(data.len());

        let Some(version) = read_u16(data, unit_offset + 4, little) else {
            break;
        };
        if !(2..=4).contains(&version) {
            // DWARF5 line tables use a different header; skipped, not an error.
            unit_offset = unit_end;
            continue;
        }

        if parse_line_unit(data, unit_offset, version, little, &mut files).is_none() {
            break;
        }

        parsed_any = true;
        unit_offset = unit_end;
    }

    if parsed_any || !files.is_empty() {
        Some(files)
    } else {
        None
    }
}

/// Parses the header tables of one line-program unit into `files`.
fn parse_line_unit(
    data: &[u8],
    unit_offset: usize,
    version: u16,
    little: bool,
    files: &mut Vec<String>,
) -> Option<()> {
    // unit_length(4) version(2) header_length(4).
    let mut offset = unit_offset + 10;

    // min_inst_length, (v4: max_ops_per_inst), default_is_stmt, line_base,
    // line_range, opcode_base.
    let fixed = if version == 4 { 6 } else { 5 };
    let header_bytes = data.get(offset..offset + fixed)?;
    let opcode_base = header_bytes[fixed - 1];
    if opcode_base == 0 {
        return None;
    }
    offset += fixed;

    // Standard opcode lengths table.
    offset += opcode_base as usize - 1;
    if offset > data.len() {
        return None;
    }

    // Include directories: NUL-terminated strings until an empty entry.
    loop {
        let dir = read_cstr(data, &mut offset, MAX_LINE_STRING)?;
        if dir.is_empty() {
            break;
        }
    }

    // File name table: name, directory index, mtime, length.
    loop {
        let name = read_cstr(data, &mut offset, MAX_LINE_STRING)?;
        if name.is_empty() {
            break;
        }
        decode_uleb128(data, &mut offset)?;
        decode_uleb128(data, &mut offset)?;
        decode_uleb128(data, &mut offset)?;
        files.push(name);
    }

    Some(())
}

const SOURCE_EXTENSIONS: &[&str] = &[
    ".c", ".cpp", ".cc", ".cxx", ".h", ".hpp", ".hh", ".hxx",
];

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-' | b'+')
}

/// Scans raw file data for plausible source file names.
///
/// Matches the known C/C++ extensions, expands backwards to a token boundary
/// (whitespace, NUL or path separator), and discards degenerate results. The
/// output can contain substrings from unrelated data and is advisory only.
fn scan_source_files(data: &[u8]) -> Vec<String> {
    let mut results = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for ext in SOURCE_EXTENSIONS {
        let needle = ext.as_bytes();
        let mut search = 0usize;

        while let Some(found) = find_subslice(&data[search..], needle) {
            let pos = search + found;
            search = pos + 1;

            let end = pos + needle.len();
            // The extension must end the token.
            if data.get(end).copied().is_some_and(is_token_byte) {
                continue;
            }

            let mut start = pos;
            while start > 0
                && end - start < MAX_HEURISTIC_STRING
                && is_token_byte(data[start - 1])
            {
                start -= 1;
            }

            let candidate = String::from_utf8_lossy(&data[start..end]).into_owned();
            let stem = &candidate[..candidate.len() - ext.len()];
            if stem.is_empty() || candidate.len() > MAX_HEURISTIC_STRING {
                continue;
            }

            if seen.insert(candidate.clone()) {
                results.push(candidate);
            }
        }
    }

    results
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
