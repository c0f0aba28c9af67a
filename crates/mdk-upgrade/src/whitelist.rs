//! Whitelist cache verification
//!
//! The toolkit's analyzers read a whitelist cache that is copied from the
//! install directory into each project and declared as an `AdditionalFiles`
//! item.

use crate::paths;
use mdk_xml::Element;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Whitelist cache location relative to the install directory
pub const WHITELIST_SOURCE: &str = r"Analyzers\whitelist.cache";

/// Whitelist cache location relative to the project directory
pub const WHITELIST_TARGET: &str = r"MDK\whitelist.cache";

/// Item element declaring the whitelist
pub const WHITELIST_ITEM: &str = "AdditionalFiles";

/// State of a project's whitelist cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistReference {
    has_valid_element: bool,
    has_valid_file: bool,
    source: PathBuf,
    target: PathBuf,
}

impl WhitelistReference {
    /// Inspect a project document and the cache files on disk
    ///
    /// Never mutates anything.
    ///
    /// # Arguments
    /// * `root` - Project document root element
    /// * `project_dir` - Directory of the project file
    /// * `install_path` - Toolkit install directory
    #[must_use]
    pub fn verify(root: &Element, project_dir: &Path, install_path: &Path) -> Self {
        let source = paths::resolve(install_path, WHITELIST_SOURCE);
        let target = paths::resolve(project_dir, WHITELIST_TARGET);

        let has_valid_element = declares_whitelist(root);
        let has_valid_file = is_up_to_date(&source, &target);
        tracing::debug!(
            element = has_valid_element,
            file = has_valid_file,
            target = %target.display(),
            "verified whitelist"
        );

        Self {
            has_valid_element,
            has_valid_file,
            source,
            target,
        }
    }

    /// Whether the project declares the whitelist item
    #[inline]
    #[must_use]
    pub fn has_valid_element(&self) -> bool {
        self.has_valid_element
    }

    /// Whether the project's copy exists and is not older than the source
    #[inline]
    #[must_use]
    pub fn has_valid_file(&self) -> bool {
        self.has_valid_file
    }

    /// Both the declaration and the file are valid
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.has_valid_element && self.has_valid_file
    }

    /// Cache under the install directory
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Cache under the project directory
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }
}

/// Whether an item refers to the whitelist target by include or by link
pub(crate) fn refers_to_target(item: &Element) -> bool {
    let by_include = item
        .attribute("Include")
        .is_some_and(|include| paths::eq_ignore_case(include.trim(), WHITELIST_TARGET));
    let by_link = item
        .child_text("Link")
        .is_some_and(|link| paths::eq_ignore_case(link.trim(), WHITELIST_TARGET));
    by_include || by_link
}

fn declares_whitelist(root: &Element) -> bool {
    root.elements()
        .filter(|(_, group)| group.local_name() == "ItemGroup")
        .flat_map(|(_, group)| group.elements())
        .any(|(_, item)| {
            item.local_name() == WHITELIST_ITEM
                && item
                    .attribute("Include")
                    .is_some_and(|include| paths::eq_ignore_case(include.trim(), WHITELIST_TARGET))
        })
}

fn is_up_to_date(source: &Path, target: &Path) -> bool {
    match (modified(source), modified(target)) {
        (Some(source), Some(target)) => source <= target,
        _ => false,
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
