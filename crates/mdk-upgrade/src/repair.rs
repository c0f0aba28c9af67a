//! Repair engine
//!
//! Applies an analysis to disk in a fixed order: references, whitelist,
//! options version, migrations, then the project document itself. Reference
//! repair runs first because it only rewrites existing elements; the element
//! handles recorded by the analysis stay valid until the whitelist repair
//! starts inserting and removing items.

use crate::analysis::{AnalysisParts, ScriptProjectAnalysis};
use crate::error::{OptionsError, UpgradeError, UpgradeResult};
use crate::migration::MigrationChain;
use crate::options::OPTIONS_INCLUDE;
use crate::paths;
use crate::references::{BadReference, ReferenceKind};
use crate::whitelist::{refers_to_target, WhitelistReference, WHITELIST_ITEM, WHITELIST_TARGET};
use mdk_xml::{Document, Element};
use semver::Version;
use serde::Serialize;
use std::path::Path;

/// What a repair changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Bad references rewritten
    pub references_fixed: usize,
    /// Whitelist cache copied from the install directory
    pub whitelist_file_restored: bool,
    /// Whitelist item declared in the project
    pub whitelist_element_restored: bool,
    /// Descriptor version attribute set to the target version
    pub options_version_synced: bool,
    /// Migration steps applied
    pub migrations_applied: usize,
}

impl RepairReport {
    /// Whether anything was changed
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Rewrites one project according to its analysis
#[derive(Debug, Clone, Copy)]
pub struct RepairEngine<'a> {
    chain: &'a MigrationChain,
}

impl<'a> RepairEngine<'a> {
    /// Create engine running the given migration chain
    #[inline]
    #[must_use]
    pub fn new(chain: &'a MigrationChain) -> Self {
        Self { chain }
    }

    /// Repair a project
    ///
    /// Blocking. A failed migration step does not undo the repairs before
    /// it: the project document is still written and the error is returned
    /// afterwards.
    ///
    /// # Errors
    /// - `UpgradeError::StaleReference` if a recorded element is gone
    /// - `UpgradeError::MissingProjectRoot` if the document is not a project
    /// - `UpgradeError::Io` / `UpgradeError::Xml` on filesystem failures
    /// - `UpgradeError::Migration` if a migration step fails
    #[tracing::instrument(skip_all, fields(project = analysis.project().name()))]
    pub fn repair(&self, analysis: ScriptProjectAnalysis) -> UpgradeResult<RepairReport> {
        let AnalysisParts {
            project,
            mut document,
            options,
            whitelist,
            bad_references,
            target_version,
        } = analysis.into_parts();
        let references_fixed = repair_references(&mut document, bad_references)?;

        let whitelist_file_restored = !whitelist.has_valid_file();
        if whitelist_file_restored {
            restore_whitelist_file(&whitelist)?;
        }
        let whitelist_element_restored = !whitelist.has_valid_element();
        if whitelist_element_restored {
            restore_whitelist_element(&mut document, project.file_path())?;
        }

        let options_version_synced = sync_options_version(options.file_name(), &target_version)?;

        let mut migrated = options.clone();
        let migration = self.chain.run(&mut migrated);
        if migrated != options {
            migrated.save()?;
        }

        document.save(project.file_path())?;

        let report = RepairReport {
            references_fixed,
            whitelist_file_restored,
            whitelist_element_restored,
            options_version_synced,
            migrations_applied: migration?,
        };
        tracing::info!(
            references = report.references_fixed,
            whitelist_file = report.whitelist_file_restored,
            whitelist_element = report.whitelist_element_restored,
            migrations = report.migrations_applied,
            "repaired project"
        );
        Ok(report)
    }
}

fn repair_references(document: &mut Document, bad_references: Vec<BadReference>) -> UpgradeResult<usize> {
    let mut fixed = 0;
    for bad in bad_references {
        let element = document
            .element_mut(bad.element())
            .ok_or_else(|| UpgradeError::StaleReference {
                element: bad.element().to_string(),
            })?;
        match bad.kind() {
            ReferenceKind::File => {
                let like = element.attribute("Include").unwrap_or_default();
                let expected = paths::with_separators_of(bad.expected(), like);
                element.set_attribute("Include", expected);
            }
            ReferenceKind::Assembly => {
                let like = element.child_text("HintPath").unwrap_or_default();
                let expected = paths::with_separators_of(bad.expected(), &like);
                element.set_child_text("HintPath", expected);
            }
        }
        tracing::debug!(reference = %bad, "fixed reference");
        fixed += 1;
    }
    Ok(fixed)
}

fn restore_whitelist_file(whitelist: &WhitelistReference) -> UpgradeResult<()> {
    let target = whitelist.target();
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| UpgradeError::io_error(dir, e))?;
    }
    std::fs::copy(whitelist.source(), target).map_err(|e| UpgradeError::io_error(whitelist.source(), e))?;
    tracing::debug!(target = %target.display(), "restored whitelist cache");
    Ok(())
}

fn restore_whitelist_element(document: &mut Document, project_file: &Path) -> UpgradeResult<()> {
    let root = document.root_mut();
    if root.local_name() != "Project" {
        return Err(UpgradeError::MissingProjectRoot {
            path: project_file.to_path_buf(),
        });
    }

    for group in root.elements_mut() {
        if group.local_name() == "ItemGroup" {
            group.retain_elements(|item| !refers_to_target(item));
        }
    }

    let declares_options = |group: &Element| {
        group.elements().any(|(_, item)| {
            item.attribute("Include")
                .is_some_and(|include| paths::eq_ignore_case(include.trim(), OPTIONS_INCLUDE))
        })
    };
    let existing = root
        .elements()
        .find(|(_, e)| e.local_name() == "ItemGroup" && declares_options(*e))
        .map(|(i, _)| i);
    let index = match existing {
        Some(index) => index,
        None => root.push_element(Element::new("ItemGroup")),
    };

    let item = Element::new(WHITELIST_ITEM).with_attribute("Include", WHITELIST_TARGET);
    if let Some(group) = root.child_at_mut(index) {
        group.push_element(item);
    }
    tracing::debug!("declared whitelist item");
    Ok(())
}

/// Set the descriptor's version attribute, if it has one
fn sync_options_version(file_name: &Path, target: &Version) -> Result<bool, OptionsError> {
    let mut document = Document::load(file_name)?;
    let root = document.root_mut();
    if root.attribute("version").is_none() {
        return Ok(false);
    }
    root.set_attribute("version", target.to_string());
    document.save(file_name)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_xml::ElementPath;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const PROJECT: &str = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup>
    <Reference Include="VRage">
      <HintPath>C:\Wrong\VRage.dll</HintPath>
    </Reference>
    <Analyzer Include="C:\Wrong\MDKAnalyzer.dll" />
  </ItemGroup>
  <ItemGroup>
    <AdditionalFiles Include="MDK\MDK.options" />
    <None Include="Shared\whitelist.cache">
      <Link>MDK\whitelist.cache</Link>
    </None>
  </ItemGroup>
</Project>"#;

    fn whitelist_items(document: &Document) -> Vec<(usize, String)> {
        document
            .root()
            .elements()
            .flat_map(|(g, group)| {
                group
                    .elements()
                    .filter(|(_, item)| refers_to_target(item))
                    .map(move |(_, item)| (g, item.name().to_string()))
            })
            .collect()
    }

    #[test]
    fn references_are_rewritten_in_place() {
        let mut document = Document::parse(PROJECT).unwrap();
        let group = ElementPath::root().child(1);
        let bad = vec![
            BadReference::new(
                ReferenceKind::Assembly,
                group.child(1),
                None,
                PathBuf::from(r"C:\Game\Bin\VRage.dll"),
            ),
            BadReference::new(
                ReferenceKind::File,
                group.child(3),
                None,
                PathBuf::from(r"C:\Tools\MDKAnalyzer.dll"),
            ),
        ];

        assert_eq!(repair_references(&mut document, bad).unwrap(), 2);
        let group = document.root().child("ItemGroup").unwrap();
        assert_eq!(
            group.child("Reference").unwrap().child_text("HintPath").as_deref(),
            Some(r"C:\Game\Bin\VRage.dll")
        );
        assert_eq!(
            group.child("Analyzer").unwrap().attribute("Include"),
            Some(r"C:\Tools\MDKAnalyzer.dll")
        );
    }

    #[test]
    fn missing_element_is_a_stale_reference() {
        let mut document = Document::parse(PROJECT).unwrap();
        let bad = vec![BadReference::new(
            ReferenceKind::File,
            ElementPath::root().child(99),
            None,
            PathBuf::from("x.dll"),
        )];
        let err = repair_references(&mut document, bad).unwrap_err();
        assert!(err.is_corrupt_project());
    }

    #[test]
    fn whitelist_item_joins_the_options_group_once() {
        let mut document = Document::parse(PROJECT).unwrap();
        restore_whitelist_element(&mut document, Path::new("Script.csproj")).unwrap();

        let items = whitelist_items(&document);
        assert_eq!(items, vec![(3, WHITELIST_ITEM.to_string())]);

        let options_group = document.root().child_at(3).unwrap();
        assert!(options_group.child("None").is_none());
        assert_eq!(
            options_group.child(WHITELIST_ITEM).unwrap().namespace(),
            Some("http://schemas.microsoft.com/developer/msbuild/2003")
        );
    }

    #[test]
    fn whitelist_item_gets_a_new_group_without_options_declaration() {
        let mut document = Document::parse("<Project>\n  <ItemGroup />\n</Project>").unwrap();
        restore_whitelist_element(&mut document, Path::new("Script.csproj")).unwrap();

        let groups: Vec<_> = document
            .root()
            .elements()
            .filter(|(_, e)| e.local_name() == "ItemGroup")
            .collect();
        assert_eq!(groups.len(), 2);
        assert!(groups[1].1.child(WHITELIST_ITEM).is_some());
    }

    #[test]
    fn non_project_root_is_rejected() {
        let mut document = Document::parse("<Settings />").unwrap();
        let err = restore_whitelist_element(&mut document, Path::new("Odd.csproj")).unwrap_err();
        assert!(matches!(err, UpgradeError::MissingProjectRoot { .. }));
    }

    #[test]
    fn options_version_sync_requires_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let with = dir.path().join("with.options");
        let without = dir.path().join("without.options");
        std::fs::write(&with, r#"<mdk version="1.0"><trim>false</trim></mdk>"#).unwrap();
        std::fs::write(&without, "<mdk><trim>false</trim></mdk>").unwrap();

        let target = Version::new(1, 2, 0);
        assert!(sync_options_version(&with, &target).unwrap());
        assert!(!sync_options_version(&without, &target).unwrap());

        let synced = Document::load(&with).unwrap();
        assert_eq!(synced.root().attribute("version"), Some("1.2.0"));
        assert_eq!(
            std::fs::read_to_string(&without).unwrap(),
            "<mdk><trim>false</trim></mdk>"
        );
    }

    #[test]
    fn empty_report_is_noop() {
        assert!(RepairReport::default().is_noop());
        let report = RepairReport {
            migrations_applied: 1,
            ..RepairReport::default()
        };
        assert!(!report.is_noop());
    }
}
