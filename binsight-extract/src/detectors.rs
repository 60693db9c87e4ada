//! Contracts for the external fact detectors the aggregator consults.
//!
//! Package-manager, license and version detection operate on directories and
//! manifest files rather than binary structure, and live outside this crate.
//! The aggregator only depends on the traits below; implementations are
//! injected at construction time.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Facts about a package manager found near a file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManagerInfo {
    /// Package manager name, such as `npm`, `cargo` or `conan`.
    pub name: String,
    /// Version of the package manager, if known.
    pub version: String,
    /// Path of the manifest file that identified the manager.
    pub manifest_file: String,
    /// Path of the lock file, if present.
    pub lock_file: String,
    /// Names of packages listed in the manifest.
    pub packages: Vec<String>,
    /// Whether a lock file accompanies the manifest.
    pub has_lock_file: bool,
}

/// Facts about a license detected in a directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    /// Human-readable license name, such as `MIT License`.
    pub name: String,
    /// SPDX identifier, such as `MIT` or `Apache-2.0`.
    pub spdx_id: String,
    /// Full license text, if captured.
    pub text: String,
    /// Path of the license file.
    pub file_path: String,
    /// Copyright notice, if found.
    pub copyright: String,
    /// Author information, if found.
    pub author: String,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Facts about a version detected in a directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// The full version string.
    pub full_version: String,
    /// Major version component.
    pub major: String,
    /// Minor version component.
    pub minor: String,
    /// Patch version component.
    pub patch: String,
    /// Prerelease identifier, such as `alpha` or `rc.1`.
    pub prerelease: String,
    /// Build metadata.
    pub build: String,
    /// Where the version was found, such as `git-tag` or `manifest`.
    pub source: String,
    /// Git commit hash, if the source is a repository.
    pub commit_hash: String,
    /// Git branch name, if the source is a repository.
    pub branch: String,
    /// Git tag, if the source is a repository.
    pub tag: String,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Detects package managers from manifest and lock files.
pub trait PackageManagerDetect: Send + Sync {
    /// Detects package managers for the given directory, best match first.
    fn detect(&self, dir: &Path) -> Vec<PackageManagerInfo>;

    /// Quick path-keyed lookup: the owning manager's name, or `"unknown"`.
    ///
    /// This inspects the file path only (for instance `/usr/lib/rpm/` or
    /// `.conan/data/` segments) and never reads manifests.
    fn detect_for_path(&self, path: &Path) -> String;

    /// Enables or disables verbose diagnostics.
    fn set_verbose(&mut self, verbose: bool);

    /// Sets the minimum confidence for reported results, clamped to `[0, 1]`.
    fn set_confidence_threshold(&mut self, threshold: f64);

    /// The message of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;
}

/// Detects licenses from license files and headers.
pub trait LicenseDetect: Send + Sync {
    /// Detects licenses for the given directory, highest confidence first.
    fn detect(&self, dir: &Path) -> Vec<LicenseInfo>;

    /// Enables or disables verbose diagnostics.
    fn set_verbose(&mut self, verbose: bool);

    /// Sets the minimum confidence for reported results, clamped to `[0, 1]`.
    fn set_confidence_threshold(&mut self, threshold: f64);

    /// The message of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;
}

/// Detects versions from manifests, tags and version files.
pub trait VersionDetect: Send + Sync {
    /// Detects versions for the given directory, highest confidence first.
    fn detect(&self, dir: &Path) -> Vec<VersionInfo>;

    /// Enables or disables verbose diagnostics.
    fn set_verbose(&mut self, verbose: bool);

    /// Sets the minimum confidence for reported results, clamped to `[0, 1]`.
    fn set_confidence_threshold(&mut self, threshold: f64);

    /// The message of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;
}
