//! File format detection from magic bytes, with an extension fallback.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use scroll::{Pread, BE, LE};

use crate::base::FileFormat;

const AR_MAGIC: &[u8; 8] = b"!<arch>\n";
const AR_THIN_MAGIC: &[u8; 8] = b"!<thin>\n";

const ELF_MAGIC: u32 = 0x7F45_4C46;
const JAVA_MAGIC: u32 = 0xCAFE_BABE;
const FAT_MAGIC_64: u32 = 0xCAFE_BABF;
const MH_MAGIC: u32 = 0xFEED_FACE;
const MH_MAGIC_64: u32 = 0xFEED_FACF;
const PE_NT_SIGNATURE: u32 = 0x0000_4550;
const WASM_MAGIC: u32 = 0x6D73_6100;
const DOS_MAGIC: u16 = 0x5A4D;

/// Tries to infer the file format from the start of the given buffer.
///
/// `extension` is the file's extension, if any; it breaks the tie between
/// Java class files and fat Mach-O containers, which share the `0xCAFEBABE`
/// magic, and acts as a last-resort fallback when no magic matches.
pub fn peek(data: &[u8], extension: Option<&str>) -> FileFormat {
    if data.len() >= 8 && (&data[..8] == AR_MAGIC || &data[..8] == AR_THIN_MAGIC) {
        return FileFormat::Archive;
    }

    if data.len() >= 4 {
        let be: u32 = data.pread_with(0, BE).unwrap_or(0);
        match be {
            ELF_MAGIC => return FileFormat::Elf,
            // Java class files and fat Mach-O containers share this magic.
            // Prefer Java when the extension says so, fat Mach-O otherwise.
            JAVA_MAGIC => {
                return if matches!(extension, Some("class") | Some("jar")) {
                    FileFormat::JavaClass
                } else {
                    FileFormat::MachO
                };
            }
            FAT_MAGIC_64 | MH_MAGIC | MH_MAGIC_64 => return FileFormat::MachO,
            _ => (),
        }

        let le: u32 = data.pread_with(0, LE).unwrap_or(0);
        match le {
            MH_MAGIC | MH_MAGIC_64 => return FileFormat::MachO,
            PE_NT_SIGNATURE => return FileFormat::Pe,
            WASM_MAGIC => return FileFormat::Wasm,
            _ => (),
        }
    }

    if data.len() >= 2 {
        let mz: u16 = data.pread_with(0, LE).unwrap_or(0);
        if mz == DOS_MAGIC {
            return FileFormat::Pe;
        }
    }

    match extension {
        Some("so") => FileFormat::Elf,
        Some("dylib") => FileFormat::MachO,
        Some("exe") | Some("dll") => FileFormat::Pe,
        Some("a") | Some("lib") => FileFormat::Archive,
        Some("class") | Some("jar") => FileFormat::JavaClass,
        Some("wasm") => FileFormat::Wasm,
        _ => FileFormat::Unknown,
    }
}

/// Detects the format of the file at `path`.
///
/// Unreadable and empty files are reported as [`FileFormat::Unknown`]. The
/// result depends only on the file's contents and name, never on the current
/// working directory.
pub fn detect_format<P: AsRef<Path>>(path: P) -> FileFormat {
    let path = path.as_ref();

    let mut header = [0u8; 8];
    let len = match File::open(path).and_then(|mut file| read_up_to(&mut file, &mut header)) {
        Ok(len) => len,
        Err(_) => return FileFormat::Unknown,
    };

    if len == 0 {
        return FileFormat::Unknown;
    }

    let extension = path.extension().and_then(|ext| ext.to_str());
    peek(&header[..len], extension)
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let read = file.read(&mut buf[total..])?;
        if read == 0 {
            break;
        }
        total += read;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;

    fn detect_bytes(bytes: &[u8], suffix: &str) -> FileFormat {
        let mut tmp = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        tmp.write_all(bytes).unwrap();
        tmp.flush().unwrap();
        detect_format(tmp.path())
    }

    #[test]
    fn test_detect_elf() {
        assert_eq!(detect_bytes(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0], ".bin"), FileFormat::Elf);
    }

    #[test]
    fn test_detect_archive() {
        assert_eq!(detect_bytes(b"!<arch>\n", ".a"), FileFormat::Archive);
        assert_eq!(detect_bytes(b"!<thin>\n", ".a"), FileFormat::Archive);
    }

    #[test]
    fn test_detect_macho() {
        // 64-bit little-endian Mach-O: magic stored in file byte order.
        assert_eq!(
            detect_bytes(&[0xCF, 0xFA, 0xED, 0xFE, 0, 0, 0, 0], ""),
            FileFormat::MachO
        );
        // Fat container: magic stored big-endian.
        assert_eq!(
            detect_bytes(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 2], ""),
            FileFormat::MachO
        );
    }

    #[test]
    fn test_cafebabe_tie_break() {
        // The same magic classifies as Java when the extension says so.
        assert_eq!(
            detect_bytes(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52], ".class"),
            FileFormat::JavaClass
        );
        assert_eq!(
            detect_bytes(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 2], ".dylib"),
            FileFormat::MachO
        );
    }

    #[test]
    fn test_detect_pe() {
        assert_eq!(detect_bytes(b"MZ\x90\x00\x03\x00\x00\x00", ".exe"), FileFormat::Pe);
        assert_eq!(detect_bytes(b"PE\x00\x00\x4c\x01\x02\x00", ""), FileFormat::Pe);
    }

    #[test]
    fn test_detect_wasm() {
        assert_eq!(detect_bytes(b"\0asm\x01\x00\x00\x00", ".wasm"), FileFormat::Wasm);
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(detect_bytes(b"garbage!", ".so"), FileFormat::Elf);
        assert_eq!(detect_bytes(b"garbage!", ".dll"), FileFormat::Pe);
        assert_eq!(detect_bytes(b"garbage!", ".txt"), FileFormat::Unknown);
    }

    #[test]
    fn test_empty_and_missing() {
        assert_eq!(detect_bytes(b"", ".so"), FileFormat::Unknown);
        assert_eq!(detect_format("/nonexistent/input.so"), FileFormat::Unknown);
    }
}
