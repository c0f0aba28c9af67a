//! Per-project toolkit options (`MDK\MDK.options`)
//!
//! The descriptor marks a project as a script project. Its `version`
//! attribute records the toolkit version the project was last upgraded to.

use crate::error::OptionsError;
use crate::paths;
use mdk_xml::{Document, Element, XmlError};
use semver::Version;
use std::path::{Path, PathBuf};

/// Descriptor location relative to the project directory
pub const OPTIONS_INCLUDE: &str = r"MDK\MDK.options";

const ROOT: &str = "mdk";

/// Options loaded from a project's descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOptions {
    file_name: PathBuf,
    name: String,
    version: Version,
    is_valid: bool,
    trim_types: bool,
    minify: bool,
    game_bin_path: Option<String>,
    use_manual_game_bin_path: bool,
    output_path: Option<String>,
    use_manual_output_path: bool,
    ignored_folders: Vec<String>,
    ignored_files: Vec<String>,
}

impl ProjectOptions {
    /// Descriptor path for a project file
    #[must_use]
    pub fn path_for(project_file: impl AsRef<Path>) -> PathBuf {
        let dir = project_file.as_ref().parent().unwrap_or_else(|| Path::new(""));
        paths::resolve(dir, OPTIONS_INCLUDE)
    }

    /// Load the descriptor belonging to a project file
    ///
    /// A missing or unreadable descriptor yields options with
    /// [`ProjectOptions::is_valid`] false; that is a classification, not an
    /// error.
    ///
    /// # Errors
    /// - `OptionsError::Xml` for io failures other than a missing file
    pub fn load(project_file: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, OptionsError> {
        let file_name = Self::path_for(project_file);
        let name = name.into();

        let document = match Document::load(&file_name) {
            Ok(document) => document,
            Err(e) if e.is_not_found() => return Ok(Self::invalid(file_name, name)),
            Err(e @ XmlError::Io { .. }) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(path = %file_name.display(), error = %e, "options descriptor is not well-formed");
                return Ok(Self::invalid(file_name, name));
            }
        };

        Ok(Self::from_document(file_name, name, &document))
    }

    /// Build options from an already parsed descriptor
    #[must_use]
    pub fn from_document(file_name: PathBuf, name: String, document: &Document) -> Self {
        let root = document.root();
        if root.local_name() != ROOT {
            tracing::warn!(path = %file_name.display(), root = root.name(), "not an options descriptor");
            return Self::invalid(file_name, name);
        }
        let Some(version) = root.attribute("version").and_then(parse_version) else {
            tracing::warn!(path = %file_name.display(), "options descriptor has no usable version");
            return Self::invalid(file_name, name);
        };

        let (game_bin_path, use_manual_game_bin_path) = read_path(root, "gamebinpath");
        let (output_path, use_manual_output_path) = read_path(root, "outputpath");
        let ignore = root.child("ignore");

        Self {
            file_name,
            name,
            version,
            is_valid: true,
            trim_types: read_flag(root, "trim"),
            minify: read_flag(root, "minify"),
            game_bin_path,
            use_manual_game_bin_path,
            output_path,
            use_manual_output_path,
            ignored_folders: ignore.map(|i| read_list(i, "folder")).unwrap_or_default(),
            ignored_files: ignore.map(|i| read_list(i, "file")).unwrap_or_default(),
        }
    }

    fn invalid(file_name: PathBuf, name: String) -> Self {
        Self {
            file_name,
            name,
            version: Version::new(0, 0, 0),
            is_valid: false,
            trim_types: false,
            minify: false,
            game_bin_path: None,
            use_manual_game_bin_path: false,
            output_path: None,
            use_manual_output_path: false,
            ignored_folders: Vec::new(),
            ignored_files: Vec::new(),
        }
    }

    /// Persist settings back to the descriptor
    ///
    /// Elements this type does not know about are kept. The `version`
    /// attribute of an existing descriptor is left alone; it is only written
    /// when the descriptor is created.
    ///
    /// # Errors
    /// - `OptionsError::Io` if the directory cannot be created
    /// - `OptionsError::Xml` if the descriptor cannot be read or written
    pub fn save(&self) -> Result<(), OptionsError> {
        let mut document = match Document::load(&self.file_name) {
            Ok(document) => document,
            Err(e) if e.is_not_found() => Document::new(Element::new(ROOT)),
            Err(e) => return Err(e.into()),
        };

        let root = document.root_mut();
        if root.attribute("version").is_none() {
            root.set_attribute("version", self.version.to_string());
        }
        root.set_child_text("trim", self.trim_types.to_string());
        root.set_child_text("minify", self.minify.to_string());
        write_path(root, "gamebinpath", self.game_bin_path.as_deref(), self.use_manual_game_bin_path);
        write_path(root, "outputpath", self.output_path.as_deref(), self.use_manual_output_path);

        if root.child("ignore").is_none() {
            root.push_element(Element::new("ignore"));
        }
        if let Some(ignore) = root.child_mut("ignore") {
            write_list(ignore, "folder", &self.ignored_folders);
            write_list(ignore, "file", &self.ignored_files);
        }

        if let Some(dir) = self.file_name.parent() {
            std::fs::create_dir_all(dir).map_err(|e| OptionsError::io_error(dir, e))?;
        }
        document.save(&self.file_name)?;
        Ok(())
    }

    /// Descriptor path
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Project display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recorded toolkit version
    #[inline]
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Advance the recorded version
    #[inline]
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Whether the descriptor was found and understood
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Game binaries this project builds against
    ///
    /// The manual path when enabled, otherwise `default`.
    #[must_use]
    pub fn game_bin_path(&self, default: impl AsRef<Path>) -> PathBuf {
        match (&self.game_bin_path, self.use_manual_game_bin_path) {
            (Some(path), true) if !path.trim().is_empty() => paths::normalize(path.trim()),
            _ => paths::normalize(default),
        }
    }

    /// Manual game binaries path as recorded, whether enabled or not
    #[inline]
    #[must_use]
    pub fn recorded_game_bin_path(&self) -> Option<&str> {
        self.game_bin_path.as_deref()
    }

    /// Record a manual game binaries path
    pub fn set_game_bin_path(&mut self, path: Option<String>, enabled: bool) {
        self.game_bin_path = path;
        self.use_manual_game_bin_path = enabled;
    }

    /// Whether the manual game binaries path is in use
    #[inline]
    #[must_use]
    pub fn uses_manual_game_bin_path(&self) -> bool {
        self.use_manual_game_bin_path
    }

    /// Manual output path, if enabled
    #[must_use]
    pub fn output_path(&self) -> Option<&str> {
        self.output_path
            .as_deref()
            .filter(|_| self.use_manual_output_path)
    }

    /// Whether type trimming is enabled
    #[inline]
    #[must_use]
    pub fn trim_types(&self) -> bool {
        self.trim_types
    }

    /// Whether minification is enabled
    #[inline]
    #[must_use]
    pub fn minify(&self) -> bool {
        self.minify
    }

    /// Folders excluded from script builds
    #[inline]
    #[must_use]
    pub fn ignored_folders(&self) -> &[String] {
        &self.ignored_folders
    }

    /// Files excluded from script builds
    #[inline]
    #[must_use]
    pub fn ignored_files(&self) -> &[String] {
        &self.ignored_files
    }

    /// Exclude a folder, ignoring case-insensitive duplicates
    ///
    /// # Returns
    /// True if the folder was added
    pub fn ignore_folder(&mut self, folder: impl Into<String>) -> bool {
        let folder = folder.into();
        if self.ignored_folders.iter().any(|f| f.eq_ignore_ascii_case(&folder)) {
            return false;
        }
        self.ignored_folders.push(folder);
        true
    }
}

/// Parse a toolkit version
///
/// Accepts full semantic versions and the shorter forms used by older
/// descriptors (`1`, `1.1`, `1.1.14.0`; a fourth component is dropped).
#[must_use]
pub fn parse_version(text: &str) -> Option<Version> {
    let text = text.trim();
    if let Ok(version) = Version::parse(text) {
        return Some(version);
    }
    let parts: Vec<u64> = text
        .split('.')
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        [major, minor, patch] | [major, minor, patch, _] => Some(Version::new(*major, *minor, *patch)),
        _ => None,
    }
}

fn read_flag(root: &Element, name: &str) -> bool {
    root.child_text(name)
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("true"))
}

fn read_path(root: &Element, name: &str) -> (Option<String>, bool) {
    let Some(element) = root.child(name) else {
        return (None, false);
    };
    let text = element.text().trim().to_string();
    let enabled = element
        .attribute("enabled")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    ((!text.is_empty()).then_some(text), enabled)
}

fn read_list(parent: &Element, name: &str) -> Vec<String> {
    parent
        .elements()
        .map(|(_, e)| e)
        .filter(|e| e.local_name() == name)
        .map(|e| e.text().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn write_path(root: &mut Element, name: &str, path: Option<&str>, enabled: bool) {
    let Some(path) = path else {
        root.retain_elements(|e| e.local_name() != name);
        return;
    };
    root.set_child_text(name, path);
    if let Some(element) = root.child_mut(name) {
        element.set_attribute("enabled", enabled.to_string());
    }
}

fn write_list(parent: &mut Element, name: &str, wanted: &[String]) {
    parent.retain_elements(|e| {
        e.local_name() != name || wanted.iter().any(|w| w == e.text().trim())
    });
    for entry in wanted {
        let present = parent
            .elements()
            .any(|(_, e)| e.local_name() == name && e.text().trim() == entry);
        if !present {
            parent.push_element(Element::new(name).with_text(entry.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<mdk version="1.1">
  <trim>true</trim>
  <minify>false</minify>
  <gamebinpath enabled="true">D:\SE\Bin64\</gamebinpath>
  <ignore>
    <folder>obj</folder>
    <file>Notes.cs</file>
  </ignore>
  <custom>kept</custom>
</mdk>"#;

    fn project_with_descriptor(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let mdk = dir.path().join("MDK");
        std::fs::create_dir_all(&mdk).unwrap();
        std::fs::write(mdk.join("MDK.options"), content).unwrap();
        let project = dir.path().join("Script.csproj");
        (dir, project)
    }

    #[test]
    fn parse_version_accepts_short_forms() {
        assert_eq!(parse_version("1.1"), Some(Version::new(1, 1, 0)));
        assert_eq!(parse_version("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_version(" 1.1.14.0 "), Some(Version::new(1, 1, 14)));
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("latest"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn load_reads_descriptor() {
        let (_dir, project) = project_with_descriptor(DESCRIPTOR);
        let options = ProjectOptions::load(&project, "Script").unwrap();

        assert!(options.is_valid());
        assert_eq!(options.name(), "Script");
        assert_eq!(options.version(), &Version::new(1, 1, 0));
        assert!(options.trim_types());
        assert!(!options.minify());
        assert_eq!(options.ignored_folders(), ["obj".to_string()]);
        assert_eq!(options.ignored_files(), ["Notes.cs".to_string()]);
        assert_eq!(
            options.game_bin_path("/default"),
            paths::normalize(r"D:\SE\Bin64")
        );
    }

    #[test]
    fn disabled_manual_path_falls_back_to_default() {
        let content = DESCRIPTOR.replace(r#"enabled="true""#, r#"enabled="false""#);
        let (_dir, project) = project_with_descriptor(&content);
        let options = ProjectOptions::load(&project, "Script").unwrap();

        assert_eq!(options.recorded_game_bin_path(), Some(r"D:\SE\Bin64\"));
        assert_eq!(options.game_bin_path("/games/se/"), paths::normalize("/games/se"));
    }

    #[test]
    fn missing_descriptor_is_invalid_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProjectOptions::load(dir.path().join("Plain.csproj"), "Plain").unwrap();
        assert!(!options.is_valid());
    }

    #[test]
    fn malformed_or_foreign_descriptor_is_invalid() {
        let (_dir, project) = project_with_descriptor("<mdk version=\"1.0\">");
        assert!(!ProjectOptions::load(&project, "Script").unwrap().is_valid());

        let (_dir, project) = project_with_descriptor("<settings version=\"1.0\" />");
        assert!(!ProjectOptions::load(&project, "Script").unwrap().is_valid());

        let (_dir, project) = project_with_descriptor("<mdk />");
        assert!(!ProjectOptions::load(&project, "Script").unwrap().is_valid());
    }

    #[test]
    fn save_keeps_unknown_elements_and_version() {
        let (_dir, project) = project_with_descriptor(DESCRIPTOR);
        let mut options = ProjectOptions::load(&project, "Script").unwrap();

        options.set_version(Version::new(9, 9, 9));
        assert!(options.ignore_folder("bin"));
        assert!(!options.ignore_folder("OBJ"));
        options.set_game_bin_path(None, false);
        options.save().unwrap();

        let document = Document::load(options.file_name()).unwrap();
        let root = document.root();
        assert_eq!(root.attribute("version"), Some("1.1"));
        assert_eq!(root.child_text("custom").as_deref(), Some("kept"));
        assert!(root.child("gamebinpath").is_none());

        let reloaded = ProjectOptions::load(&project, "Script").unwrap();
        assert_eq!(
            reloaded.ignored_folders(),
            ["obj".to_string(), "bin".to_string()]
        );
        assert_eq!(reloaded.ignored_files(), ["Notes.cs".to_string()]);
    }

    #[test]
    fn save_creates_missing_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("Script.csproj");
        let mut options = ProjectOptions::load(&project, "Script").unwrap();
        options.set_version(Version::new(1, 2, 0));
        options.save().unwrap();

        let reloaded = ProjectOptions::load(&project, "Script").unwrap();
        assert!(reloaded.is_valid());
        assert_eq!(reloaded.version(), &Version::new(1, 2, 0));
    }
}
