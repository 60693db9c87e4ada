//! File system path helpers used across the extraction engine.
//!
//! These are thin, allocation-light wrappers over `std::path` and `std::fs`
//! plus a few purely lexical operations (normalization, splitting) that never
//! touch the file system. Directory enumeration is read-only.

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

/// Returns `true` if `path` exists on the file system.
pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

/// Returns `true` if `path` refers to a regular file.
pub fn is_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// Returns `true` if `path` refers to a directory.
pub fn is_dir<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_dir()
}

/// Returns `true` if `path` refers to an executable file.
///
/// On POSIX systems this checks the owner-execute bit. On Windows, where
/// execute permissions are a property of the file name, it matches the
/// conventional executable extensions instead.
#[cfg(unix)]
pub fn is_executable<P: AsRef<Path>>(path: P) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path.as_ref())
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o100 != 0)
        .unwrap_or(false)
}

/// Returns `true` if `path` refers to an executable file.
///
/// On POSIX systems this checks the owner-execute bit. On Windows, where
/// execute permissions are a property of the file name, it matches the
/// conventional executable extensions instead.
#[cfg(windows)]
pub fn is_executable<P: AsRef<Path>>(path: P) -> bool {
    is_file(path.as_ref()) && has_any_extension(path, &["exe", "bat", "cmd", "com"])
}

/// The size of the file at `path` in bytes.
pub fn file_size<P: AsRef<Path>>(path: P) -> io::Result<u64> {
    Ok(fs::metadata(path.as_ref())?.len())
}

/// The last modification time of the file at `path`.
pub fn modified_time<P: AsRef<Path>>(path: P) -> io::Result<SystemTime> {
    fs::metadata(path.as_ref())?.modified()
}

/// The extension of `path` without the leading dot, if any.
pub fn extension<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
}

/// The file name of `path` without its extension, if any.
pub fn file_stem<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// The final component of `path`, if any.
pub fn file_name<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// The parent directory of `path`, if any.
pub fn parent<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    path.as_ref().parent().map(Path::to_path_buf)
}

/// Makes `path` absolute by prepending the current working directory.
///
/// Unlike `fs::canonicalize` this does not resolve symlinks and does not
/// require the path to exist; the result is normalized lexically.
pub fn absolute<P: AsRef<Path>>(path: P) -> io::Result<PathBuf> {
    let path = path.as_ref();
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    Ok(normalize(joined))
}

/// Normalizes `path` lexically, resolving `.` and `..` components.
///
/// Parent components at the start of a relative path are preserved since they
/// cannot be resolved without consulting the file system.
pub fn normalize<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut result = PathBuf::new();
    let mut depth = 0usize;

    for component in path.as_ref().components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            Component::Normal(name) => {
                result.push(name);
                depth += 1;
            }
            other => result.push(other.as_os_str()),
        }
    }

    result
}

/// Joins two paths. An absolute right-hand side replaces the left-hand side.
pub fn join<B: AsRef<Path>, P: AsRef<Path>>(base: B, path: P) -> PathBuf {
    base.as_ref().join(path.as_ref())
}

/// Joins any number of path components left to right.
pub fn join_all<I, P>(parts: I) -> PathBuf
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut result = PathBuf::new();
    for part in parts {
        result.push(part.as_ref());
    }
    result
}

/// Splits `path` into its textual components.
pub fn split<P: AsRef<Path>>(path: P) -> Vec<String> {
    path.as_ref()
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::RootDir => Some("/".into()),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Creates the directory at `path` and all missing parents.
pub fn create_dir<P: AsRef<Path>>(path: P) -> io::Result<()> {
    fs::create_dir_all(path.as_ref())
}

/// Removes the file or directory at `path`.
///
/// Directories are removed recursively.
pub fn remove<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Copies the file at `from` to `to`, returning the number of bytes copied.
pub fn copy<F: AsRef<Path>, T: AsRef<Path>>(from: F, to: T) -> io::Result<u64> {
    fs::copy(from.as_ref(), to.as_ref())
}

/// Moves the file at `from` to `to`.
///
/// Falls back to copy-and-remove when a rename crosses file systems.
pub fn rename<F: AsRef<Path>, T: AsRef<Path>>(from: F, to: T) -> io::Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Lists the immediate entries of the directory at `path`.
pub fn list_dir<P: AsRef<Path>>(path: P) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path.as_ref())? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Lists all files beneath the directory at `path`, recursively.
///
/// Unreadable subdirectories are skipped rather than aborting the walk.
pub fn list_dir_recursive<P: AsRef<Path>>(path: P) -> Vec<PathBuf> {
    let mut entries: Vec<_> = WalkDir::new(path.as_ref())
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    entries.sort();
    entries
}

/// Returns `true` if `path` has the given extension, compared case-insensitively.
pub fn has_extension<P: AsRef<Path>>(path: P, ext: &str) -> bool {
    extension(path).is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Returns `true` if `path` has any of the given extensions.
pub fn has_any_extension<P: AsRef<Path>>(path: P, exts: &[&str]) -> bool {
    match extension(path) {
        Some(e) => exts.iter().any(|ext| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}
