//! Filesystem host: a directory is a solution, every project file in it is a
//! loaded project.

use async_trait::async_trait;
use mdk_upgrade::{HostError, HostProject, Solution};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

const PROJECT_EXTENSION: &str = "csproj";
const SKIPPED_DIRS: [&str; 2] = ["bin", "obj"];

/// Project file on disk
#[derive(Debug)]
pub(crate) struct FsProject {
    path: PathBuf,
    name: String,
    loaded: AtomicBool,
}

impl FsProject {
    pub(crate) fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            loaded: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl HostProject for FsProject {
    fn file_path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    async fn unload(&self) -> Result<(), HostError> {
        self.loaded.store(false, Ordering::Release);
        Ok(())
    }

    async fn reload(&self) -> Result<Arc<dyn HostProject>, HostError> {
        if !self.path.is_file() {
            return Err(HostError::Reload {
                project: self.name.clone(),
                message: format!("{} no longer exists", self.path.display()),
            });
        }
        Ok(Arc::new(Self::new(self.path.clone())))
    }
}

/// Every project file below a directory
#[derive(Debug, Default)]
pub(crate) struct FsSolution {
    projects: Vec<Arc<dyn HostProject>>,
}

impl FsSolution {
    /// Walk `root` for project files, skipping build output folders
    ///
    /// A relative `root` is anchored at the working directory so every
    /// project carries a full path.
    ///
    /// # Errors
    /// - if the working directory or the tree cannot be read
    pub(crate) fn discover(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };

        let mut projects: Vec<Arc<dyn HostProject>> = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_build_output(e));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_project_file(entry.path()) {
                tracing::debug!(path = %entry.path().display(), "found project");
                projects.push(Arc::new(FsProject::new(entry.into_path())));
            }
        }
        Ok(Self { projects })
    }

    pub(crate) fn len(&self) -> usize {
        self.projects.len()
    }
}

impl Solution for FsSolution {
    fn projects(&self) -> Vec<Arc<dyn HostProject>> {
        self.projects.clone()
    }
}

fn is_build_output(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIPPED_DIRS
            .iter()
            .any(|d| entry.file_name().to_string_lossy().eq_ignore_ascii_case(d))
}

fn is_project_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(PROJECT_EXTENSION))
}
