//! Reference checks
//!
//! Only references the toolkit owns are checked: assemblies whose name is on
//! one of the known assembly lists, and items whose resolved include ends
//! with one of the known file names. Everything else in the project is left
//! alone.

use crate::config::ScriptUpgradeAnalysisOptions;
use crate::paths;
use mdk_xml::{Element, ElementPath};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Kind of a drifted reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceKind {
    /// `<Reference Include="Name"><HintPath>...</HintPath></Reference>`
    Assembly,
    /// Any item with an `Include` path
    File,
}

impl Display for ReferenceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assembly => f.write_str("assembly"),
            Self::File => f.write_str("file"),
        }
    }
}

/// A reference whose path differs from the one the toolkit expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadReference {
    kind: ReferenceKind,
    element: ElementPath,
    current: Option<PathBuf>,
    expected: PathBuf,
}

impl BadReference {
    /// Create bad reference record
    #[inline]
    #[must_use]
    pub fn new(kind: ReferenceKind, element: ElementPath, current: Option<PathBuf>, expected: PathBuf) -> Self {
        Self {
            kind,
            element,
            current,
            expected,
        }
    }

    /// Reference kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Handle to the offending element in the project document
    #[inline]
    #[must_use]
    pub fn element(&self) -> &ElementPath {
        &self.element
    }

    /// Path as found in the project; `None` when an assembly has no hint path
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Path the toolkit expects
    #[inline]
    #[must_use]
    pub fn expected(&self) -> &Path {
        &self.expected
    }
}

impl Display for BadReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let current = self
            .current
            .as_ref()
            .map_or_else(|| "<none>".into(), |p| p.to_string_lossy());
        write!(
            f,
            "{} reference at {}: {} (expected {})",
            self.kind,
            self.element,
            current,
            self.expected.display()
        )
    }
}

/// Checks the references of one project document
#[derive(Debug)]
pub struct ReferenceChecker<'a> {
    options: &'a ScriptUpgradeAnalysisOptions,
    project_dir: &'a Path,
    game_bin_path: &'a Path,
    install_path: &'a Path,
}

impl<'a> ReferenceChecker<'a> {
    /// Create checker
    ///
    /// # Arguments
    /// * `options` - Known assembly and file lists
    /// * `project_dir` - Directory relative paths are resolved against
    /// * `game_bin_path` - Expected root for game-owned references
    /// * `install_path` - Expected root for toolkit-owned references
    #[must_use]
    pub fn new(
        options: &'a ScriptUpgradeAnalysisOptions,
        project_dir: &'a Path,
        game_bin_path: &'a Path,
        install_path: &'a Path,
    ) -> Self {
        Self {
            options,
            project_dir,
            game_bin_path,
            install_path,
        }
    }

    /// Check every item under the project's item groups
    ///
    /// Assembly references are scanned first, then file items, each in
    /// document order.
    #[must_use]
    pub fn scan(&self, root: &Element) -> Vec<BadReference> {
        let items: Vec<(ElementPath, &Element)> = root
            .elements()
            .filter(|(_, group)| group.local_name() == "ItemGroup")
            .flat_map(|(g, group)| {
                group
                    .elements()
                    .map(move |(i, item)| (ElementPath::root().child(g).child(i), item))
            })
            .collect();

        let assemblies = items
            .iter()
            .filter(|(_, item)| item.local_name() == "Reference")
            .filter_map(|(path, item)| self.check_assembly(path, item));
        let files = items
            .iter()
            .filter(|(_, item)| item.local_name() != "Reference")
            .filter_map(|(path, item)| self.check_file(path, item));

        assemblies.chain(files).collect()
    }

    /// Check one `<Reference>` element
    ///
    /// # Returns
    /// A bad reference when the assembly is toolkit-owned and its hint path
    /// is missing or differs from `<root>/<name>.dll`
    #[must_use]
    pub fn check_assembly(&self, path: &ElementPath, element: &Element) -> Option<BadReference> {
        let name = assembly_name(element.attribute("Include")?);
        let root = if contains(&self.options.game_assemblies, name) {
            self.game_bin_path
        } else if contains(&self.options.utility_assemblies, name) {
            self.install_path
        } else {
            return None;
        };

        let expected = paths::resolve(root, format!("{name}.dll"));
        let current = element
            .child_text("HintPath")
            .map(|hint| hint.trim().to_string())
            .filter(|hint| !hint.is_empty())
            .map(|hint| paths::resolve(self.project_dir, hint));

        tracing::debug!(
            assembly = name,
            current = ?current,
            expected = %expected.display(),
            "checking assembly reference"
        );
        match &current {
            Some(found) if paths::eq_ignore_case(found, &expected) => None,
            _ => Some(BadReference::new(
                ReferenceKind::Assembly,
                path.clone(),
                current,
                expected,
            )),
        }
    }

    /// Check one item element with an `Include` path
    ///
    /// # Returns
    /// A bad reference when the include ends with a toolkit-owned file name
    /// but does not live under the expected root
    #[must_use]
    pub fn check_file(&self, path: &ElementPath, element: &Element) -> Option<BadReference> {
        let include = element.attribute("Include")?.trim();
        if include.is_empty() {
            return None;
        }
        let current = paths::resolve(self.project_dir, include);

        let (root, name) = find_suffix(&current, &self.options.game_files)
            .map(|name| (self.game_bin_path, name))
            .or_else(|| {
                find_suffix(&current, &self.options.utility_files).map(|name| (self.install_path, name))
            })?;

        let expected = paths::resolve(root, paths::trim_leading_separators(name));
        tracing::debug!(
            file = name,
            current = %current.display(),
            expected = %expected.display(),
            "checking file reference"
        );
        if paths::eq_ignore_case(&current, &expected) {
            return None;
        }
        Some(BadReference::new(
            ReferenceKind::File,
            path.clone(),
            Some(current),
            expected,
        ))
    }
}

/// Simple name of an assembly include (`Name, Version=..., Culture=...`)
fn assembly_name(include: &str) -> &str {
    include.split(',').next().unwrap_or_default().trim()
}

fn contains(list: &[String], name: &str) -> bool {
    list.iter().any(|entry| entry == name)
}

fn find_suffix<'n>(path: &Path, names: &'n [String]) -> Option<&'n str> {
    names
        .iter()
        .map(String::as_str)
        .find(|name| paths::ends_with_ignore_case(path, name))
}
