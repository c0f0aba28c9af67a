//! Version-gated migrations of the options descriptor
//!
//! Each step declares the version it upgrades a project to. A chain runs, in
//! ascending order, every step whose target lies above the project's recorded
//! version, and advances the recorded version after each one. Running the
//! chain on an up-to-date project does nothing.

use crate::error::{MigrationError, UpgradeError, UpgradeResult};
use crate::options::ProjectOptions;
use semver::Version;
use std::fmt::Debug;
use std::sync::Arc;

/// Version projects are upgraded to by default
pub const CURRENT_VERSION: Version = Version::new(1, 2, 0);

/// One migration step
pub trait MigrationStep: Send + Sync + Debug {
    /// Version a project is at after this step
    fn version(&self) -> &Version;

    /// Short name for logs
    fn name(&self) -> &str;

    /// Apply the step to the in-memory options
    ///
    /// # Errors
    /// - `MigrationError` if the step cannot be applied; the chain stops
    fn apply(&self, options: &mut ProjectOptions) -> Result<(), MigrationError>;
}

/// Ordered set of migration steps
#[derive(Debug, Clone)]
pub struct MigrationChain {
    steps: Vec<Arc<dyn MigrationStep>>,
}

impl MigrationChain {
    /// Create a chain; steps are sorted by target version
    #[must_use]
    pub fn new(mut steps: Vec<Arc<dyn MigrationStep>>) -> Self {
        steps.sort_by(|a, b| a.version().cmp(b.version()));
        Self { steps }
    }

    /// Chain with the toolkit's own steps
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(EnsureDefaultIgnores::new()),
            Arc::new(DropStaleGameBinPath::new()),
        ])
    }

    /// Highest version any step reaches
    #[must_use]
    pub fn latest(&self) -> Option<&Version> {
        self.steps.last().map(|s| s.version())
    }

    /// Steps in the order they run
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Arc<dyn MigrationStep>] {
        &self.steps
    }

    /// Run every step above the recorded version
    ///
    /// The recorded version is compared before each step and advanced after
    /// it, so a failure leaves the options at the last completed step.
    ///
    /// # Returns
    /// Number of steps applied
    ///
    /// # Errors
    /// - `UpgradeError::Migration` naming the versions of the failed step
    pub fn run(&self, options: &mut ProjectOptions) -> UpgradeResult<usize> {
        let mut applied = 0;
        for step in &self.steps {
            let from = options.version().clone();
            let to = step.version();
            if from >= *to {
                continue;
            }
            tracing::debug!(project = options.name(), step = step.name(), %from, %to, "applying migration");
            step.apply(options)
                .map_err(|e| UpgradeError::migration(from, to.clone(), e))?;
            options.set_version(to.clone());
            applied += 1;
        }
        Ok(applied)
    }
}

impl Default for MigrationChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// Exclude build output folders from script builds
#[derive(Debug, Clone)]
pub struct EnsureDefaultIgnores {
    target: Version,
}

impl EnsureDefaultIgnores {
    /// Folders every script project ignores
    pub const FOLDERS: [&'static str; 2] = ["obj", "bin"];

    /// Create step
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: Version::new(1, 1, 0),
        }
    }
}

impl Default for EnsureDefaultIgnores {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationStep for EnsureDefaultIgnores {
    fn version(&self) -> &Version {
        &self.target
    }

    fn name(&self) -> &str {
        "ensure-default-ignores"
    }

    fn apply(&self, options: &mut ProjectOptions) -> Result<(), MigrationError> {
        for folder in Self::FOLDERS {
            options.ignore_folder(folder);
        }
        Ok(())
    }
}

/// Drop a manual game binaries path that is disabled or blank
#[derive(Debug, Clone)]
pub struct DropStaleGameBinPath {
    target: Version,
}

impl DropStaleGameBinPath {
    /// Create step
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: Version::new(1, 2, 0),
        }
    }
}

impl Default for DropStaleGameBinPath {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationStep for DropStaleGameBinPath {
    fn version(&self) -> &Version {
        &self.target
    }

    fn name(&self) -> &str {
        "drop-stale-game-bin-path"
    }

    fn apply(&self, options: &mut ProjectOptions) -> Result<(), MigrationError> {
        let blank = options
            .recorded_game_bin_path()
            .map_or(true, |p| p.trim().is_empty());
        if blank || !options.uses_manual_game_bin_path() {
            options.set_game_bin_path(None, false);
        }
        Ok(())
    }
}
