use std::fs;

use similar_asserts::assert_eq;

use binsight_extract::{detect_format, ExtractorFactory, FileFormat};

#[test]
fn test_detection_implies_extractor_accepts() {
    let dir = tempfile::tempdir().unwrap();

    let inputs: Vec<(&str, Vec<u8>)> = vec![
        ("demo.so", vec![0x7F, b'E', b'L', b'F', 2, 1, 1, 0]),
        ("demo.a", b"!<arch>\n".to_vec()),
        ("demo.bin", vec![0xCF, 0xFA, 0xED, 0xFE, 0, 0, 0, 0]),
        ("demo.exe", b"MZ\x90\x00\x03\x00\x00\x00".to_vec()),
    ];

    for (name, bytes) in inputs {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();

        let format = detect_format(&path);
        assert_ne!(format, FileFormat::Unknown, "format of {name}");

        let extractor = ExtractorFactory::create_extractor(&path)
            .unwrap_or_else(|| panic!("no extractor for {name}"));
        assert!(extractor.can_handle(&path), "can_handle for {name}");
    }
}

#[test]
fn test_detection_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.so");
    fs::write(&path, [0x7F, b'E', b'L', b'F', 2, 1, 1, 0]).unwrap();

    let first = detect_format(&path);
    let second = detect_format(&path);
    assert_eq!(first, FileFormat::Elf);
    assert_eq!(first, second);
}

#[test]
fn test_detection_independent_of_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lib.so"), [0x7F, b'E', b'L', b'F', 2, 1, 1, 0]).unwrap();
    let path = dir.path().join("lib.so").canonicalize().unwrap();

    let before = detect_format(&path);

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let after = detect_format(&path);
    std::env::set_current_dir(original).unwrap();

    assert_eq!(before, after);
}

#[test]
fn test_fat_macho_vs_java_class() {
    let dir = tempfile::tempdir().unwrap();

    let class_path = dir.path().join("Main.class");
    fs::write(&class_path, [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]).unwrap();
    assert_eq!(detect_format(&class_path), FileFormat::JavaClass);

    let fat_path = dir.path().join("universal");
    fs::write(&fat_path, [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 2]).unwrap();
    assert_eq!(detect_format(&fat_path), FileFormat::MachO);
}

#[test]
fn test_unknown_inputs_yield_no_extractors() {
    let dir = tempfile::tempdir().unwrap();

    let empty = dir.path().join("empty.so");
    fs::write(&empty, b"").unwrap();
    assert_eq!(detect_format(&empty), FileFormat::Unknown);
    assert!(ExtractorFactory::available_extractors(&empty).is_empty());

    let text = dir.path().join("README.md");
    fs::write(&text, b"# readme\n").unwrap();
    assert_eq!(detect_format(&text), FileFormat::Unknown);
    assert!(ExtractorFactory::create_extractor(&text).is_none());
}
