//! Printable analysis and upgrade reports

use mdk_upgrade::{BadReference, ReferenceKind, RepairReport, ScriptProjectAnalysis, SolutionAnalysisResult};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Serialize)]
pub(crate) struct AnalysisReport {
    pub(crate) has_script_projects: bool,
    pub(crate) projects: Vec<ProjectReport>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectReport {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) version: String,
    pub(crate) target_version: String,
    pub(crate) whitelist_file_valid: bool,
    pub(crate) whitelist_element_valid: bool,
    pub(crate) bad_references: Vec<ReferenceReport>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReferenceReport {
    pub(crate) kind: ReferenceKind,
    pub(crate) element: String,
    pub(crate) current: Option<String>,
    pub(crate) expected: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpgradeEntry {
    pub(crate) name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) report: Option<RepairReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl AnalysisReport {
    pub(crate) fn new(result: &SolutionAnalysisResult) -> Self {
        Self {
            has_script_projects: result.has_script_projects(),
            projects: result.bad_projects().iter().map(ProjectReport::new).collect(),
        }
    }
}

impl ProjectReport {
    fn new(analysis: &ScriptProjectAnalysis) -> Self {
        Self {
            name: analysis.project().name().to_string(),
            path: analysis.project().file_path().display().to_string(),
            version: analysis.options().version().to_string(),
            target_version: analysis.target_version().to_string(),
            whitelist_file_valid: analysis.whitelist().has_valid_file(),
            whitelist_element_valid: analysis.whitelist().has_valid_element(),
            bad_references: analysis.bad_references().iter().map(ReferenceReport::new).collect(),
        }
    }
}

impl ReferenceReport {
    fn new(bad: &BadReference) -> Self {
        Self {
            kind: bad.kind(),
            element: bad.element().to_string(),
            current: bad.current().map(|p| p.display().to_string()),
            expected: bad.expected().display().to_string(),
        }
    }
}

impl Display for AnalysisReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.has_script_projects {
            return writeln!(f, "no script projects");
        }
        if self.projects.is_empty() {
            return writeln!(f, "all script projects are up to date");
        }
        for project in &self.projects {
            writeln!(f, "{} ({})", project.name, project.path)?;
            if project.version != project.target_version {
                writeln!(f, "  version {} -> {}", project.version, project.target_version)?;
            }
            if !project.whitelist_file_valid {
                writeln!(f, "  whitelist cache missing or stale")?;
            }
            if !project.whitelist_element_valid {
                writeln!(f, "  whitelist item not declared")?;
            }
            for reference in &project.bad_references {
                writeln!(
                    f,
                    "  {} reference: {} -> {}",
                    reference.kind,
                    reference.current.as_deref().unwrap_or("<none>"),
                    reference.expected
                )?;
            }
        }
        Ok(())
    }
}

impl Display for UpgradeEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.report, &self.error) {
            (_, Some(error)) => write!(f, "{}: failed: {error}", self.name),
            (Some(report), None) => write!(
                f,
                "{}: {} reference(s) fixed, whitelist file {}, whitelist item {}, {} migration(s)",
                self.name,
                report.references_fixed,
                if report.whitelist_file_restored { "restored" } else { "ok" },
                if report.whitelist_element_restored { "restored" } else { "ok" },
                report.migrations_applied
            ),
            (None, None) => write!(f, "{}: nothing to do", self.name),
        }
    }
}
