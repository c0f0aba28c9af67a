//! Analysis configuration
//!
//! Everything the analyzer needs to know about the installed toolkit: which
//! version projects should be at, where the game binaries and the toolkit
//! live, and which references and files the toolkit owns.

use crate::error::{UpgradeError, UpgradeResult};
use crate::migration::CURRENT_VERSION;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Game assemblies a script project references from the game's binaries
pub const DEFAULT_GAME_ASSEMBLIES: &[&str] = &[
    "Sandbox.Common",
    "Sandbox.Game",
    "Sandbox.Graphics",
    "SpaceEngineers.Game",
    "SpaceEngineers.ObjectBuilders",
    "VRage",
    "VRage.Audio",
    "VRage.Game",
    "VRage.Input",
    "VRage.Library",
    "VRage.Math",
    "VRage.Render",
    "VRage.Render11",
    "VRage.Scripting",
];

/// Toolkit assemblies referenced from the install directory
pub const DEFAULT_UTILITY_ASSEMBLIES: &[&str] = &["MDKUtilities"];

/// Toolkit files referenced from the install directory
pub const DEFAULT_UTILITY_FILES: &[&str] = &[r"Analyzers\MDKAnalyzer.dll"];

/// Default location of the game's binaries
pub const DEFAULT_GAME_BIN_PATH: &str =
    r"C:\Program Files (x86)\Steam\steamapps\common\SpaceEngineers\Bin64";

/// Configuration for one analysis call
///
/// Immutable for the duration of a call; analyses clone it into their
/// worker tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptUpgradeAnalysisOptions {
    /// Version every script project should be at after an upgrade
    pub target_version: Version,
    /// Game binaries used when a project has no manual override
    pub default_game_bin_path: PathBuf,
    /// Toolkit install directory
    pub install_path: PathBuf,
    /// Assembly names resolved against the game binaries
    pub game_assemblies: Vec<String>,
    /// Assembly names resolved against the install directory
    pub utility_assemblies: Vec<String>,
    /// File names (relative to the game binaries) owned by the game
    pub game_files: Vec<String>,
    /// File names (relative to the install directory) owned by the toolkit
    pub utility_files: Vec<String>,
    /// Maximum number of projects analyzed at once
    pub max_concurrency: usize,
}

impl ScriptUpgradeAnalysisOptions {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With install directory
    #[inline]
    #[must_use]
    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = path.into();
        self
    }

    /// With default game binaries directory
    #[inline]
    #[must_use]
    pub fn with_game_bin_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_game_bin_path = path.into();
        self
    }

    /// With target version
    #[inline]
    #[must_use]
    pub fn with_target_version(mut self, version: Version) -> Self {
        self.target_version = version;
        self
    }

    /// With concurrency bound for solution scans
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// With game-owned file names
    #[inline]
    #[must_use]
    pub fn with_game_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.game_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// With toolkit-owned file names
    #[inline]
    #[must_use]
    pub fn with_utility_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.utility_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// With game assembly names
    #[inline]
    #[must_use]
    pub fn with_game_assemblies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.game_assemblies = names.into_iter().map(Into::into).collect();
        self
    }

    /// Load configuration from a JSON file; missing fields keep their defaults
    ///
    /// # Errors
    /// - `UpgradeError::Io` if the file cannot be read
    /// - `UpgradeError::Config` if it is not valid configuration JSON
    pub fn from_json_file(path: impl AsRef<Path>) -> UpgradeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| UpgradeError::io_error(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| UpgradeError::Config(format!("{}: {e}", path.display())))
    }

    /// Check that the configuration can drive an analysis
    ///
    /// # Errors
    /// - `UpgradeError::Config` if the install path or game path is empty
    pub fn validate(&self) -> UpgradeResult<()> {
        if self.install_path.as_os_str().is_empty() {
            return Err(UpgradeError::Config("install path is not set".to_string()));
        }
        if self.default_game_bin_path.as_os_str().is_empty() {
            return Err(UpgradeError::Config("default game binaries path is not set".to_string()));
        }
        Ok(())
    }
}

impl Default for ScriptUpgradeAnalysisOptions {
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(ToString::to_string).collect() };
        Self {
            target_version: CURRENT_VERSION,
            default_game_bin_path: PathBuf::from(DEFAULT_GAME_BIN_PATH),
            install_path: PathBuf::new(),
            game_assemblies: owned(DEFAULT_GAME_ASSEMBLIES),
            utility_assemblies: owned(DEFAULT_UTILITY_ASSEMBLIES),
            game_files: Vec::new(),
            utility_files: owned(DEFAULT_UTILITY_FILES),
            max_concurrency: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
        }
    }
}
