//! Async service façade
//!
//! Analysis and repair are blocking filesystem work; every project runs on a
//! blocking worker so callers on the async runtime are never stalled.

use crate::analysis::{ProjectAnalysisResult, ProjectAnalyzer, ScriptProjectAnalysis, SolutionAnalysisResult};
use crate::busy::BusyState;
use crate::config::ScriptUpgradeAnalysisOptions;
use crate::error::{UpgradeError, UpgradeResult};
use crate::host::{HostProject, Solution};
use crate::migration::MigrationChain;
use crate::repair::{RepairEngine, RepairReport};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

/// A project after a successful repair
#[derive(Debug, Clone)]
pub struct UpgradedProject {
    /// Reloaded host project
    pub project: Arc<dyn HostProject>,
    /// What the repair changed
    pub report: RepairReport,
}

/// Entry point for analyzing and upgrading script projects
#[derive(Debug, Clone)]
pub struct ScriptUpgrades {
    chain: Arc<MigrationChain>,
    busy: Arc<BusyState>,
}

impl ScriptUpgrades {
    /// Create service with the standard migration chain
    #[must_use]
    pub fn new() -> Self {
        Self::with_chain(MigrationChain::standard())
    }

    /// Create service with a custom migration chain
    #[must_use]
    pub fn with_chain(chain: MigrationChain) -> Self {
        Self {
            chain: Arc::new(chain),
            busy: Arc::new(BusyState::new()),
        }
    }

    /// Share a busy state with other services
    #[must_use]
    pub fn with_busy_state(mut self, busy: Arc<BusyState>) -> Self {
        self.busy = busy;
        self
    }

    /// Busy state updated by every operation
    #[inline]
    #[must_use]
    pub fn busy(&self) -> &Arc<BusyState> {
        &self.busy
    }

    /// Subscribe to busy/idle transitions
    #[must_use]
    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    /// Migration chain run by repairs
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &MigrationChain {
        &self.chain
    }

    /// Analyze every project of a solution
    ///
    /// Projects are analyzed concurrently, at most
    /// `options.max_concurrency` at a time, and all of them finish before the
    /// results are classified.
    ///
    /// # Errors
    /// - `UpgradeError::Config` if the options are incomplete
    /// - the first analysis error, after every analysis has finished
    pub async fn analyze_solution(
        &self,
        solution: &dyn Solution,
        options: &ScriptUpgradeAnalysisOptions,
    ) -> UpgradeResult<SolutionAnalysisResult> {
        options.validate()?;
        let _busy = self.busy.begin();

        let projects = solution.projects();
        tracing::info!(projects = projects.len(), "analyzing solution");
        let options = Arc::new(options.clone());
        let results: Vec<UpgradeResult<ProjectAnalysisResult>> = stream::iter(projects)
            .map(|project| analyze_blocking(project, Arc::clone(&options)))
            .buffer_unordered(options.max_concurrency.max(1))
            .collect()
            .await;

        let results = results.into_iter().collect::<UpgradeResult<Vec<_>>>()?;
        let solution = SolutionAnalysisResult::from_results(results);
        tracing::info!(
            script_projects = solution.has_script_projects(),
            bad_projects = solution.bad_projects().len(),
            "solution analyzed"
        );
        Ok(solution)
    }

    /// Analyze a single project with the solution classification rules
    ///
    /// # Errors
    /// - `UpgradeError::Config` if the options are incomplete
    /// - any analysis error of the project
    pub async fn analyze_project(
        &self,
        project: Arc<dyn HostProject>,
        options: &ScriptUpgradeAnalysisOptions,
    ) -> UpgradeResult<SolutionAnalysisResult> {
        options.validate()?;
        let _busy = self.busy.begin();

        let result = analyze_blocking(project, Arc::new(options.clone())).await?;
        Ok(SolutionAnalysisResult::from_results([result]))
    }

    /// Repair every failing project of an analysis, one after another
    ///
    /// Stops at the first project that fails; use
    /// [`ScriptUpgrades::upgrade_project`] to continue past failures.
    ///
    /// # Errors
    /// - the first repair or host error
    pub async fn upgrade(&self, analysis: SolutionAnalysisResult) -> UpgradeResult<Vec<UpgradedProject>> {
        let _busy = self.busy.begin();

        let mut upgraded = Vec::new();
        for project in analysis.into_bad_projects() {
            upgraded.push(self.upgrade_project(project).await?);
        }
        Ok(upgraded)
    }

    /// Unload, repair and reload one project
    ///
    /// If the repair fails the project is still reloaded before the error
    /// is returned.
    ///
    /// # Errors
    /// - `UpgradeError::Host` if unloading or reloading fails
    /// - any repair error
    pub async fn upgrade_project(&self, analysis: ScriptProjectAnalysis) -> UpgradeResult<UpgradedProject> {
        let _busy = self.busy.begin();
        let project = Arc::clone(analysis.project());
        tracing::info!(project = project.name(), "upgrading project");

        project.unload().await?;

        let chain = Arc::clone(&self.chain);
        let repaired = tokio::task::spawn_blocking(move || RepairEngine::new(&chain).repair(analysis))
            .await
            .map_err(|e| UpgradeError::Worker(e.to_string()))
            .and_then(|r| r);

        match repaired {
            Ok(report) => {
                let project = project.reload().await?;
                Ok(UpgradedProject { project, report })
            }
            Err(e) => {
                if let Err(reload) = project.reload().await {
                    tracing::warn!(project = project.name(), error = %reload, "reload after failed repair failed");
                }
                Err(e)
            }
        }
    }
}

impl Default for ScriptUpgrades {
    fn default() -> Self {
        Self::new()
    }
}

async fn analyze_blocking(
    project: Arc<dyn HostProject>,
    options: Arc<ScriptUpgradeAnalysisOptions>,
) -> UpgradeResult<ProjectAnalysisResult> {
    tokio::task::spawn_blocking(move || ProjectAnalyzer::analyze(project, &options))
        .await
        .map_err(|e| UpgradeError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_solution_has_no_script_projects() {
        let service = ScriptUpgrades::new();
        let options = ScriptUpgradeAnalysisOptions::new().with_install_path("/opt/mdk");
        let solution: Vec<Arc<dyn HostProject>> = Vec::new();

        let result = service.analyze_solution(&solution, &options).await.unwrap();
        assert!(!result.has_script_projects());
        assert!(!service.busy().is_busy());
    }

    #[tokio::test]
    async fn invalid_options_fail_before_going_busy() {
        let service = ScriptUpgrades::new();
        let mut rx = service.subscribe_busy();
        let solution: Vec<Arc<dyn HostProject>> = Vec::new();

        let err = service
            .analyze_solution(&solution, &ScriptUpgradeAnalysisOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpgradeError::Config(_)));
        assert!(!rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn upgrading_nothing_is_a_noop() {
        let service = ScriptUpgrades::new();
        let upgraded = service
            .upgrade(SolutionAnalysisResult::no_script_projects())
            .await
            .unwrap();
        assert!(upgraded.is_empty());
    }
}
