//! Host collaborators
//!
//! The IDE (or any other host) owns the project model. This crate only needs
//! to know where a project lives, whether it is loaded, and how to unload and
//! reload it around a repair.

use crate::error::HostError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// A project as seen by the host
#[async_trait]
pub trait HostProject: Send + Sync + Debug {
    /// Full path of the project file
    fn file_path(&self) -> &Path;

    /// Display name
    fn name(&self) -> &str;

    /// Whether the host currently has the project loaded
    fn is_loaded(&self) -> bool;

    /// Unload the project so its file can be rewritten
    async fn unload(&self) -> Result<(), HostError>;

    /// Reload the project after its file was rewritten
    ///
    /// # Returns
    /// Handle to the reloaded project
    async fn reload(&self) -> Result<Arc<dyn HostProject>, HostError>;
}

/// A set of projects analyzed together
pub trait Solution: Send + Sync {
    /// Every project in the solution, script or not
    fn projects(&self) -> Vec<Arc<dyn HostProject>>;
}

impl Solution for Vec<Arc<dyn HostProject>> {
    fn projects(&self) -> Vec<Arc<dyn HostProject>> {
        self.clone()
    }
}
