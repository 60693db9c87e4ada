use std::fs;

use similar_asserts::assert_eq;

use binsight_extract::dwarf::DwarfExtractor;
use binsight_extract::elf::ElfExtractor;
use binsight_extract::{BinaryExtractor, ComponentInfo, MetadataExtractor};

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHT_NOTE: u32 = 7;

struct SectionSpec {
    name: &'static str,
    sh_type: u32,
    data: Vec<u8>,
}

/// Assembles a 64-bit little-endian ELF (ET_DYN, x86_64) from section specs.
///
/// Section zero and the section header string table are added automatically.
fn build_elf(sections: Vec<SectionSpec>) -> Vec<u8> {
    let mut shstrtab = vec![0u8];
    let mut name_offsets = Vec::new();
    for section in &sections {
        name_offsets.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(section.name.as_bytes());
        shstrtab.push(0);
    }
    let shstrtab_name_offset = shstrtab.len() as u32;
    shstrtab.extend_from_slice(b".shstrtab\0");

    // Payloads are packed right after the ELF header.
    let mut payload = Vec::new();
    let mut offsets = Vec::new();
    for section in &sections {
        offsets.push(64 + payload.len() as u64);
        payload.extend_from_slice(&section.data);
    }
    let shstrtab_offset = 64 + payload.len() as u64;
    payload.extend_from_slice(&shstrtab);

    let e_shoff = 64 + payload.len() as u64;
    let shnum = sections.len() as u16 + 2;
    let shstrndx = shnum - 1;

    let mut elf = Vec::new();
    elf.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
    elf.extend_from_slice(&[0u8; 8]);
    elf.extend_from_slice(&3u16.to_le_bytes()); // ET_DYN
    elf.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    elf.extend_from_slice(&1u32.to_le_bytes());
    elf.extend_from_slice(&0u64.to_le_bytes()); // e_entry
    elf.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
    elf.extend_from_slice(&e_shoff.to_le_bytes());
    elf.extend_from_slice(&0u32.to_le_bytes());
    elf.extend_from_slice(&64u16.to_le_bytes());
    elf.extend_from_slice(&56u16.to_le_bytes());
    elf.extend_from_slice(&0u16.to_le_bytes());
    elf.extend_from_slice(&64u16.to_le_bytes());
    elf.extend_from_slice(&shnum.to_le_bytes());
    elf.extend_from_slice(&shstrndx.to_le_bytes());

    elf.extend_from_slice(&payload);

    let mut write_header =
        |elf: &mut Vec<u8>, name: u32, sh_type: u32, offset: u64, size: u64| {
            elf.extend_from_slice(&name.to_le_bytes());
            elf.extend_from_slice(&sh_type.to_le_bytes());
            elf.extend_from_slice(&0u64.to_le_bytes()); // sh_flags
            elf.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
            elf.extend_from_slice(&offset.to_le_bytes());
            elf.extend_from_slice(&size.to_le_bytes());
            elf.extend_from_slice(&0u32.to_le_bytes()); // sh_link
            elf.extend_from_slice(&0u32.to_le_bytes()); // sh_info
            elf.extend_from_slice(&1u64.to_le_bytes()); // sh_addralign
            elf.extend_from_slice(&0u64.to_le_bytes()); // sh_entsize
        };

    // Section 0: NULL.
    write_header(&mut elf, 0, 0, 0, 0);
    for (index, section) in sections.iter().enumerate() {
        write_header(
            &mut elf,
            name_offsets[index],
            section.sh_type,
            offsets[index],
            section.data.len() as u64,
        );
    }
    write_header(
        &mut elf,
        shstrtab_name_offset,
        SHT_STRTAB,
        shstrtab_offset,
        shstrtab.len() as u64,
    );

    elf
}

fn build_id_note() -> Vec<u8> {
    let mut note = Vec::new();
    note.extend_from_slice(&4u32.to_le_bytes());
    note.extend_from_slice(&8u32.to_le_bytes());
    note.extend_from_slice(&3u32.to_le_bytes()); // NT_GNU_BUILD_ID
    note.extend_from_slice(b"GNU\0");
    note.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]);
    note
}

/// A single DWARF4 compile unit `main.c` containing `main` and `helper`.
fn debug_abbrev() -> Vec<u8> {
    let mut abbrev = Vec::new();
    abbrev.push(0x01); // code 1
    abbrev.push(0x11); // DW_TAG_compile_unit
    abbrev.push(0x01); // has children
    abbrev.extend_from_slice(&[0x03, 0x08]); // DW_AT_name, DW_FORM_string
    abbrev.extend_from_slice(&[0x00, 0x00]);
    abbrev.push(0x02); // code 2
    abbrev.push(0x2e); // DW_TAG_subprogram
    abbrev.push(0x00); // no children
    abbrev.extend_from_slice(&[0x03, 0x08]);
    abbrev.extend_from_slice(&[0x00, 0x00]);
    abbrev.push(0x00);
    abbrev
}

fn debug_info() -> Vec<u8> {
    let mut dies = Vec::new();
    dies.push(0x01);
    dies.extend_from_slice(b"main.c\0");
    dies.push(0x02);
    dies.extend_from_slice(b"main\0");
    dies.push(0x02);
    dies.extend_from_slice(b"helper\0");
    dies.push(0x00);

    let mut info = Vec::new();
    info.extend_from_slice(&((7 + dies.len()) as u32).to_le_bytes());
    info.extend_from_slice(&4u16.to_le_bytes());
    info.extend_from_slice(&0u32.to_le_bytes());
    info.push(8);
    info.extend_from_slice(&dies);
    info
}

fn debug_elf() -> Vec<u8> {
    build_elf(vec![
        SectionSpec {
            name: ".note.gnu.build-id",
            sh_type: SHT_NOTE,
            data: build_id_note(),
        },
        SectionSpec {
            name: ".debug_info",
            sh_type: SHT_PROGBITS,
            data: debug_info(),
        },
        SectionSpec {
            name: ".debug_abbrev",
            sh_type: SHT_PROGBITS,
            data: debug_abbrev(),
        },
    ])
}

#[test]
fn test_build_id_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libtraced.so");
    fs::write(&path, debug_elf()).unwrap();

    let elf = ElfExtractor::new();
    assert!(elf.can_handle(&path));
    assert_eq!(
        elf.build_id(&path).unwrap().as_deref(),
        Some("deadbeef01020304")
    );
}

#[test]
fn test_sections_are_labeled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libtraced.so");
    fs::write(&path, debug_elf()).unwrap();

    let sections = ElfExtractor::new().extract_sections(&path).unwrap();
    let by_name: Vec<(&str, &str)> = sections
        .iter()
        .map(|s| (s.name.as_str(), s.kind.as_str()))
        .collect();

    assert!(by_name.contains(&(".note.gnu.build-id", "NOTE")));
    assert!(by_name.contains(&(".debug_info", "PROGBITS")));
    assert!(by_name.contains(&(".shstrtab", "STRTAB")));
    assert!(by_name.contains(&("", "NULL")));
}

#[test]
fn test_dwarf_probe_and_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libtraced.so");
    fs::write(&path, debug_elf()).unwrap();

    let dwarf = DwarfExtractor::new();
    assert!(dwarf.has_dwarf_info(&path));
    assert!(dwarf.can_handle(&path));

    let mut functions = dwarf.extract_functions(&path).unwrap();
    functions.sort();
    assert_eq!(functions, vec!["helper", "main"]);

    assert_eq!(dwarf.extract_compile_units(&path).unwrap(), vec!["main.c"]);

    // Non-DWARF operations intentionally return nothing.
    assert!(dwarf.extract_sections(&path).unwrap().is_empty());
    assert!(dwarf.extract_dependencies(&path).unwrap().is_empty());
    assert_eq!(dwarf.extract_version(&path).unwrap(), "");
}

#[test]
fn test_no_dwarf_in_plain_elf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libplain.so");
    fs::write(
        &path,
        build_elf(vec![SectionSpec {
            name: ".text",
            sh_type: SHT_PROGBITS,
            data: vec![0x90; 16],
        }]),
    )
    .unwrap();

    let dwarf = DwarfExtractor::new();
    assert!(!dwarf.has_dwarf_info(&path));
}

#[test]
fn test_pipeline_merges_debug_facts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libtraced.so");
    fs::write(&path, debug_elf()).unwrap();

    let mut extractor = MetadataExtractor::new();
    let mut component = ComponentInfo::new(path.to_string_lossy());
    extractor.extract_metadata(&mut component).unwrap();

    assert!(component.contains_debug_info);
    assert_eq!(component.compile_units, vec!["main.c"]);
    assert!(component.functions.contains(&"main".to_string()));
    assert_eq!(
        component.properties.get("build_id").map(String::as_str),
        Some("deadbeef01020304")
    );
    assert_eq!(
        component
            .properties
            .get("evidence:identity:hasDebugInfo")
            .map(String::as_str),
        Some("true")
    );
}

#[test]
fn test_debug_extraction_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libtraced.so");
    fs::write(&path, debug_elf()).unwrap();

    let mut extractor = MetadataExtractor::new();
    extractor.set_extract_debug_info(false);

    let mut component = ComponentInfo::new(path.to_string_lossy());
    extractor.extract_metadata(&mut component).unwrap();

    assert!(!component.contains_debug_info);
    assert!(component.functions.is_empty());
    assert!(component.compile_units.is_empty());
}

#[test]
fn test_truncated_elf_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stub.so");
    // Valid magic, payload cut off after the identification bytes.
    fs::write(&path, [0x7F, b'E', b'L', b'F', 2, 1, 1, 0]).unwrap();

    let elf = ElfExtractor::new();
    assert!(elf.can_handle(&path));
    // The header cannot be parsed; the error stays a value, never a panic.
    assert!(elf.extract_symbols(&path).is_err());
    assert!(elf.extract_sections(&path).is_err());
}
