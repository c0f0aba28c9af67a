//! MDK Script Upgrades
//!
//! Detects script projects whose toolkit references have drifted from the
//! installed toolkit and game, and repairs them in place.
//!
//! # Core Operations
//!
//! - **Analyze**: load each project fresh, check toolkit-owned references,
//!   the whitelist cache and the recorded toolkit version
//! - **Repair**: rewrite bad references, restore the whitelist, sync the
//!   options version and run pending migrations
//!
//! # Architecture
//!
//! ```text
//! Solution → ScriptUpgrades::analyze_solution → ProjectAnalyzer ─┬→ ReferenceChecker
//!                                                                └→ WhitelistReference
//!          → SolutionAnalysisResult → ScriptUpgrades::upgrade → RepairEngine → MigrationChain
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mdk_upgrade::prelude::*;
//!
//! # async fn example(solution: &dyn Solution) -> UpgradeResult<()> {
//! let options = ScriptUpgradeAnalysisOptions::new()
//!     .with_install_path(r"C:\Program Files\MDK")
//!     .with_game_bin_path(r"D:\Steam\steamapps\common\SpaceEngineers\Bin64");
//!
//! let upgrades = ScriptUpgrades::new();
//! let analysis = upgrades.analyze_solution(solution, &options).await?;
//! if !analysis.is_empty() {
//!     upgrades.upgrade(analysis).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod analysis;
pub mod busy;
pub mod config;
pub mod error;
pub mod host;
pub mod migration;
pub mod options;
pub mod paths;
pub mod references;
pub mod repair;
pub mod service;
pub mod whitelist;

// Re-exports for convenience
pub use analysis::{ProjectAnalysisResult, ProjectAnalyzer, ScriptProjectAnalysis, SolutionAnalysisResult};
pub use busy::{BusyGuard, BusyState};
pub use config::ScriptUpgradeAnalysisOptions;
pub use error::{HostError, MigrationError, OptionsError, UpgradeError, UpgradeResult};
pub use host::{HostProject, Solution};
pub use migration::{MigrationChain, MigrationStep, CURRENT_VERSION};
pub use options::ProjectOptions;
pub use references::{BadReference, ReferenceChecker, ReferenceKind};
pub use repair::{RepairEngine, RepairReport};
pub use service::{ScriptUpgrades, UpgradedProject};
pub use whitelist::WhitelistReference;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for analyzing and upgrading script projects
    pub use crate::analysis::{ProjectAnalysisResult, ScriptProjectAnalysis, SolutionAnalysisResult};
    pub use crate::config::ScriptUpgradeAnalysisOptions;
    pub use crate::error::{UpgradeError, UpgradeResult};
    pub use crate::host::{HostProject, Solution};
    pub use crate::service::{ScriptUpgrades, UpgradedProject};
    pub use semver::Version;
}
