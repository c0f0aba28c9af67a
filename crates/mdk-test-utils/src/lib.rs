//! Testing utilities for MDK workspace
//!
//! Shared fixtures: a temporary tree with a toolkit install, game binaries
//! and script projects, plus in-memory host projects.

#![allow(missing_docs)]

use async_trait::async_trait;
use mdk_upgrade::{HostError, HostProject, ScriptUpgradeAnalysisOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const MSBUILD_NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

/// Game assemblies the fixture installs and its projects reference
pub const GAME_ASSEMBLIES: [&str; 2] = ["Sandbox.Game", "VRage"];

/// Host project backed by a file; loaded until unloaded
#[derive(Debug)]
pub struct TestProject {
    path: PathBuf,
    name: String,
    loaded: AtomicBool,
    fail_reload: bool,
    unloads: Arc<AtomicUsize>,
    reloads: Arc<AtomicUsize>,
}

impl TestProject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            loaded: AtomicBool::new(true),
            fail_reload: false,
            unloads: Arc::new(AtomicUsize::new(0)),
            reloads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unloaded(self) -> Self {
        self.loaded.store(false, Ordering::SeqCst);
        self
    }

    pub fn failing_reload(mut self) -> Self {
        self.fail_reload = true;
        self
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostProject for TestProject {
    fn file_path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn unload(&self) -> Result<(), HostError> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn reload(&self) -> Result<Arc<dyn HostProject>, HostError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reload {
            return Err(HostError::Reload {
                project: self.name.clone(),
                message: "host refused".to_string(),
            });
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(Arc::new(Self {
            path: self.path.clone(),
            name: self.name.clone(),
            loaded: AtomicBool::new(true),
            fail_reload: false,
            unloads: Arc::clone(&self.unloads),
            reloads: Arc::clone(&self.reloads),
        }))
    }
}

/// Temporary toolkit install, game binaries and project directories
pub struct ProjectFixture {
    dir: TempDir,
    install: PathBuf,
    game_bin: PathBuf,
}

impl ProjectFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("MDK");
        let game_bin = dir.path().join("SpaceEngineers").join("Bin64");

        write(&install.join("Analyzers").join("whitelist.cache"), "Sandbox.Game.Entities\n");
        write(&install.join("Analyzers").join("MDKAnalyzer.dll"), "analyzer");
        write(&install.join("MDKUtilities.dll"), "utilities");
        for name in GAME_ASSEMBLIES {
            write(&game_bin.join(format!("{name}.dll")), name);
        }

        Self { dir, install, game_bin }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn install_path(&self) -> &Path {
        &self.install
    }

    pub fn game_bin_path(&self) -> &Path {
        &self.game_bin
    }

    pub fn analysis_options(&self) -> ScriptUpgradeAnalysisOptions {
        ScriptUpgradeAnalysisOptions::new()
            .with_install_path(&self.install)
            .with_game_bin_path(&self.game_bin)
            .with_max_concurrency(2)
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn project_file(&self, name: &str) -> PathBuf {
        self.project_dir(name).join(format!("{name}.csproj"))
    }

    pub fn options_file(&self, name: &str) -> PathBuf {
        self.project_dir(name).join("MDK").join("MDK.options")
    }

    pub fn whitelist_file(&self, name: &str) -> PathBuf {
        self.project_dir(name).join("MDK").join("whitelist.cache")
    }

    /// Write a project file
    pub fn add_project(&self, name: &str, content: &str) -> PathBuf {
        let path = self.project_file(name);
        write(&path, content);
        path
    }

    /// Write an options descriptor with the given version
    pub fn add_options(&self, name: &str, version: &str) {
        write(&self.options_file(name), &options_xml(version));
    }

    /// Copy the install's whitelist cache into the project
    pub fn add_whitelist(&self, name: &str) {
        let target = self.whitelist_file(name);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::copy(self.install.join("Analyzers").join("whitelist.cache"), target).unwrap();
    }

    /// A script project with nothing to repair
    pub fn add_valid_script_project(&self, name: &str, version: &str) -> PathBuf {
        let path = self.add_project(name, &script_csproj(&self.game_bin, &self.install, true));
        self.add_options(name, version);
        self.add_whitelist(name);
        path
    }

    /// A script project whose references point at an old install and game
    pub fn add_drifted_script_project(&self, name: &str, version: &str) -> PathBuf {
        let old_game = self.dir.path().join("OldGame").join("Bin64");
        let old_install = self.dir.path().join("OldMDK");
        let path = self.add_project(name, &script_csproj(&old_game, &old_install, false));
        self.add_options(name, version);
        path
    }

    /// A project without an options descriptor
    pub fn add_plain_project(&self, name: &str) -> PathBuf {
        self.add_project(
            name,
            &format!(
                r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="{MSBUILD_NS}">
  <ItemGroup>
    <Compile Include="Program.cs" />
  </ItemGroup>
</Project>
"#
            ),
        )
    }

    pub fn host_project(&self, name: &str) -> TestProject {
        TestProject::new(self.project_file(name))
    }

    pub fn project(&self, name: &str) -> Arc<dyn HostProject> {
        Arc::new(self.host_project(name))
    }

    pub fn solution(&self, names: &[&str]) -> Vec<Arc<dyn HostProject>> {
        names.iter().map(|name| self.project(name)).collect()
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Options descriptor content
pub fn options_xml(version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<mdk version="{version}">
  <trim>false</trim>
  <minify>false</minify>
  <ignore>
    <folder>obj</folder>
  </ignore>
</mdk>
"#
    )
}

/// Script project file referencing the game and toolkit under the given roots
///
/// With `declare_whitelist` the whitelist item sits next to the options item.
pub fn script_csproj(game_bin: &Path, install: &Path, declare_whitelist: bool) -> String {
    let references: String = GAME_ASSEMBLIES
        .iter()
        .map(|name| {
            format!(
                "    <Reference Include=\"{name}\">\n      <HintPath>{}</HintPath>\n    </Reference>\n",
                game_bin.join(format!("{name}.dll")).display()
            )
        })
        .collect();
    let whitelist = if declare_whitelist {
        "    <AdditionalFiles Include=\"MDK\\whitelist.cache\" />\n"
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="{MSBUILD_NS}">
  <PropertyGroup>
    <OutputType>Library</OutputType>
  </PropertyGroup>
  <ItemGroup>
{references}    <Reference Include="MDKUtilities">
      <HintPath>{utilities}</HintPath>
    </Reference>
    <Reference Include="System" />
  </ItemGroup>
  <ItemGroup>
    <Compile Include="Program.cs" />
    <Analyzer Include="{analyzer}" />
  </ItemGroup>
  <ItemGroup>
    <AdditionalFiles Include="MDK\MDK.options" />
{whitelist}  </ItemGroup>
</Project>
"#,
        utilities = install.join("MDKUtilities.dll").display(),
        analyzer = install.join("Analyzers").join("MDKAnalyzer.dll").display(),
    )
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}
