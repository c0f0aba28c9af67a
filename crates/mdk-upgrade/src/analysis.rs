//! Project and solution analysis results
//!
//! [`ProjectAnalyzer`] loads a project fresh from disk and runs the reference
//! and whitelist checks over it. Results are immutable snapshots; the only
//! way to act on one is to hand it to the repair engine.

use crate::config::ScriptUpgradeAnalysisOptions;
use crate::error::{UpgradeError, UpgradeResult};
use crate::host::HostProject;
use crate::options::ProjectOptions;
use crate::paths;
use crate::references::{BadReference, ReferenceChecker};
use crate::whitelist::WhitelistReference;
use mdk_xml::Document;
use semver::Version;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of analyzing one project
#[derive(Debug, Clone)]
pub enum ProjectAnalysisResult {
    /// Not loaded, or has no usable options descriptor
    NotScriptProject,
    /// A script project, valid or not
    Script(Box<ScriptProjectAnalysis>),
}

impl ProjectAnalysisResult {
    /// Whether the project is a recognized script project
    #[inline]
    #[must_use]
    pub fn is_script_project(&self) -> bool {
        matches!(self, Self::Script(_))
    }

    /// Whether nothing needs repairing
    ///
    /// Projects that are not script projects have nothing to repair.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::NotScriptProject => true,
            Self::Script(analysis) => analysis.is_valid(),
        }
    }

    /// Script analysis, if any
    #[must_use]
    pub fn as_script(&self) -> Option<&ScriptProjectAnalysis> {
        match self {
            Self::NotScriptProject => None,
            Self::Script(analysis) => Some(analysis),
        }
    }

    /// Take the script analysis, if any
    #[must_use]
    pub fn into_script(self) -> Option<ScriptProjectAnalysis> {
        match self {
            Self::NotScriptProject => None,
            Self::Script(analysis) => Some(*analysis),
        }
    }
}

/// Analysis of one script project
#[derive(Clone)]
pub struct ScriptProjectAnalysis {
    project: Arc<dyn HostProject>,
    document: Document,
    options: ProjectOptions,
    whitelist: WhitelistReference,
    bad_references: Vec<BadReference>,
    target_version: Version,
    game_bin_path: PathBuf,
    install_path: PathBuf,
}

impl ScriptProjectAnalysis {
    /// Host project analyzed
    #[inline]
    #[must_use]
    pub fn project(&self) -> &Arc<dyn HostProject> {
        &self.project
    }

    /// Project document as loaded for the analysis
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Options descriptor as loaded for the analysis
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    /// Whitelist state
    #[inline]
    #[must_use]
    pub fn whitelist(&self) -> &WhitelistReference {
        &self.whitelist
    }

    /// Drifted references, assemblies first, in document order
    #[inline]
    #[must_use]
    pub fn bad_references(&self) -> &[BadReference] {
        &self.bad_references
    }

    /// Version the project should be at
    #[inline]
    #[must_use]
    pub fn target_version(&self) -> &Version {
        &self.target_version
    }

    /// Expected game binaries directory
    #[inline]
    #[must_use]
    pub fn game_bin_path(&self) -> &Path {
        &self.game_bin_path
    }

    /// Expected toolkit install directory
    #[inline]
    #[must_use]
    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    /// Whether the recorded version is at least the target
    #[inline]
    #[must_use]
    pub fn is_version_current(&self) -> bool {
        *self.options.version() >= self.target_version
    }

    /// No bad references, valid whitelist and a current version
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.bad_references.is_empty() && self.whitelist.is_valid() && self.is_version_current()
    }

    pub(crate) fn into_parts(self) -> AnalysisParts {
        AnalysisParts {
            project: self.project,
            document: self.document,
            options: self.options,
            whitelist: self.whitelist,
            bad_references: self.bad_references,
            target_version: self.target_version,
        }
    }
}

impl fmt::Debug for ScriptProjectAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptProjectAnalysis")
            .field("project", &self.project.name())
            .field("version", self.options.version())
            .field("target_version", &self.target_version)
            .field("bad_references", &self.bad_references.len())
            .field("whitelist_valid", &self.whitelist.is_valid())
            .finish_non_exhaustive()
    }
}

/// Owned pieces of an analysis handed to the repair engine
pub(crate) struct AnalysisParts {
    pub(crate) project: Arc<dyn HostProject>,
    pub(crate) document: Document,
    pub(crate) options: ProjectOptions,
    pub(crate) whitelist: WhitelistReference,
    pub(crate) bad_references: Vec<BadReference>,
    pub(crate) target_version: Version,
}

/// Outcome of analyzing a solution
#[derive(Debug, Clone, Default)]
pub struct SolutionAnalysisResult {
    has_script_projects: bool,
    bad_projects: Vec<ScriptProjectAnalysis>,
}

impl SolutionAnalysisResult {
    /// Result for a solution without script projects
    #[inline]
    #[must_use]
    pub const fn no_script_projects() -> Self {
        Self {
            has_script_projects: false,
            bad_projects: Vec::new(),
        }
    }

    /// Classify per-project results
    ///
    /// Keeps only invalid script projects. A solution whose script projects
    /// are all valid yields an empty result that still reports
    /// [`SolutionAnalysisResult::has_script_projects`].
    #[must_use]
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = ProjectAnalysisResult>,
    {
        let scripts: Vec<ScriptProjectAnalysis> = results
            .into_iter()
            .filter_map(ProjectAnalysisResult::into_script)
            .collect();
        if scripts.is_empty() {
            return Self::no_script_projects();
        }
        Self {
            has_script_projects: true,
            bad_projects: scripts.into_iter().filter(|s| !s.is_valid()).collect(),
        }
    }

    /// Whether any script project was found
    #[inline]
    #[must_use]
    pub fn has_script_projects(&self) -> bool {
        self.has_script_projects
    }

    /// Script projects that need repair
    #[inline]
    #[must_use]
    pub fn bad_projects(&self) -> &[ScriptProjectAnalysis] {
        &self.bad_projects
    }

    /// Take the projects that need repair
    #[inline]
    #[must_use]
    pub fn into_bad_projects(self) -> Vec<ScriptProjectAnalysis> {
        self.bad_projects
    }

    /// Whether nothing needs repair
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bad_projects.is_empty()
    }
}

/// Analyzes single projects
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectAnalyzer;

impl ProjectAnalyzer {
    /// Analyze a project
    ///
    /// Blocking: reads the options descriptor, the project file and the
    /// whitelist metadata.
    ///
    /// # Errors
    /// - `UpgradeError::Options` if the descriptor cannot be read for a
    ///   reason other than absence
    /// - `UpgradeError::Xml` if the project document cannot be loaded
    /// - `UpgradeError::Io` if a relative project path cannot be anchored
    #[tracing::instrument(skip_all, fields(project = project.name()))]
    pub fn analyze(
        project: Arc<dyn HostProject>,
        options: &ScriptUpgradeAnalysisOptions,
    ) -> UpgradeResult<ProjectAnalysisResult> {
        if !project.is_loaded() {
            tracing::debug!("project is not loaded");
            return Ok(ProjectAnalysisResult::NotScriptProject);
        }

        let file_path = absolute_file_path(project.file_path())?;
        let project_options = ProjectOptions::load(&file_path, project.name())?;
        if !project_options.is_valid() {
            tracing::debug!("no options descriptor");
            return Ok(ProjectAnalysisResult::NotScriptProject);
        }

        let project_dir = paths::normalize(file_path.parent().unwrap_or_else(|| Path::new("")));
        let game_bin_path = paths::resolve(
            &project_dir,
            project_options.game_bin_path(&options.default_game_bin_path),
        );
        let install_path = paths::resolve(&project_dir, &options.install_path);

        let document = Document::load(&file_path)?;
        let checker = ReferenceChecker::new(options, &project_dir, &game_bin_path, &install_path);
        let bad_references = checker.scan(document.root());
        let whitelist = WhitelistReference::verify(document.root(), &project_dir, &install_path);

        let analysis = ScriptProjectAnalysis {
            project,
            document,
            options: project_options,
            whitelist,
            bad_references,
            target_version: options.target_version.clone(),
            game_bin_path,
            install_path,
        };
        tracing::info!(
            bad_references = analysis.bad_references.len(),
            whitelist_valid = analysis.whitelist.is_valid(),
            version = %analysis.options.version(),
            valid = analysis.is_valid(),
            "analyzed script project"
        );
        Ok(ProjectAnalysisResult::Script(Box::new(analysis)))
    }
}

/// Anchor a host-supplied project path at the working directory
fn absolute_file_path(path: &Path) -> UpgradeResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| UpgradeError::io_error(path, e))?;
    Ok(paths::normalize(cwd.join(path)))
}
