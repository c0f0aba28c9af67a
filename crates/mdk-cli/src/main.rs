//! `mdk-upgrade`: analyze and repair the script projects below a directory

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod fs_host;
mod report;

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fs_host::FsSolution;
use mdk_upgrade::options::parse_version;
use mdk_upgrade::{ScriptUpgradeAnalysisOptions, ScriptUpgrades};
use report::{AnalysisReport, UpgradeEntry};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let dir = Arg::new("dir")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Directory containing the solution's projects");
    let json = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON");

    Command::new("mdk-upgrade")
        .version(mdk_upgrade::VERSION)
        .about("Detect and repair drifted toolkit references in script projects")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON configuration file"),
        )
        .arg(
            Arg::new("game-bin")
                .long("game-bin")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Default game binaries directory"),
        )
        .arg(
            Arg::new("install")
                .long("install")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Toolkit install directory"),
        )
        .arg(
            Arg::new("target-version")
                .long("target-version")
                .global(true)
                .help("Version projects are upgraded to"),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Projects analyzed at once"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Raise log level (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Write logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Report script projects that need repair")
                .arg(dir.clone())
                .arg(json.clone()),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Repair every script project that needs it")
                .arg(dir)
                .arg(json),
        )
}

fn init_tracing(matches: &ArgMatches) {
    let level = match matches.get_count("verbose") {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if matches.get_flag("log-json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn analysis_options(matches: &ArgMatches) -> anyhow::Result<ScriptUpgradeAnalysisOptions> {
    let mut options = match matches.get_one::<PathBuf>("config") {
        Some(path) => ScriptUpgradeAnalysisOptions::from_json_file(path)?,
        None => ScriptUpgradeAnalysisOptions::new(),
    };

    if let Some(path) = matches.get_one::<PathBuf>("game-bin") {
        options = options.with_game_bin_path(path);
    }
    if let Some(path) = matches.get_one::<PathBuf>("install") {
        options = options.with_install_path(path);
    }
    if let Some(text) = matches.get_one::<String>("target-version") {
        let version = parse_version(text).with_context(|| format!("invalid target version '{text}'"))?;
        options = options.with_target_version(version);
    }
    if let Some(jobs) = matches.get_one::<usize>("jobs") {
        options = options.with_max_concurrency(*jobs);
    }
    if options.install_path.as_os_str().is_empty() {
        bail!("no toolkit install directory; pass --install or set install_path in --config");
    }
    Ok(options)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_analysis(report: &AnalysisReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    print!("{report}");
    Ok(())
}

async fn analyze(dir: &Path, json: bool, options: &ScriptUpgradeAnalysisOptions) -> anyhow::Result<()> {
    let solution = FsSolution::discover(dir).with_context(|| format!("cannot scan {}", dir.display()))?;
    tracing::info!(projects = solution.len(), dir = %dir.display(), "discovered projects");

    let result = ScriptUpgrades::new().analyze_solution(&solution, options).await?;
    print_analysis(&AnalysisReport::new(&result), json)
}

async fn upgrade(dir: &Path, json: bool, options: &ScriptUpgradeAnalysisOptions) -> anyhow::Result<()> {
    let solution = FsSolution::discover(dir).with_context(|| format!("cannot scan {}", dir.display()))?;
    let upgrades = ScriptUpgrades::new();
    let result = upgrades.analyze_solution(&solution, options).await?;

    if !result.has_script_projects() || result.is_empty() {
        return print_analysis(&AnalysisReport::new(&result), json);
    }

    let mut entries = Vec::new();
    for analysis in result.into_bad_projects() {
        let name = analysis.project().name().to_string();
        let entry = match upgrades.upgrade_project(analysis).await {
            Ok(upgraded) => UpgradeEntry {
                name,
                report: Some(upgraded.report),
                error: None,
            },
            Err(e) => {
                tracing::error!(project = %name, error = %e, "upgrade failed");
                UpgradeEntry {
                    name,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        };
        if !json {
            println!("{entry}");
        }
        entries.push(entry);
    }
    if json {
        print_json(&entries)?;
    }

    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    if failed > 0 {
        bail!("{failed} project(s) could not be upgraded");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(&matches);

    let options = analysis_options(&matches)?;
    match matches.subcommand() {
        Some(("analyze", args)) => {
            let dir = args.get_one::<PathBuf>("dir").context("missing directory")?;
            analyze(dir, args.get_flag("json"), &options).await
        }
        Some(("upgrade", args)) => {
            let dir = args.get_one::<PathBuf>("dir").context("missing directory")?;
            upgrade(dir, args.get_flag("json"), &options).await
        }
        _ => bail!("unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdk_test_utils::ProjectFixture;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("mdk.json");
        std::fs::write(&config, r#"{ "install_path": "/opt/mdk", "max_concurrency": 8 }"#).unwrap();

        let matches = cli().get_matches_from([
            "mdk-upgrade",
            "--config",
            config.to_str().unwrap(),
            "--jobs",
            "3",
            "--target-version",
            "1.1",
            "analyze",
            "/src",
        ]);
        let options = analysis_options(&matches).unwrap();
        assert_eq!(options.install_path, PathBuf::from("/opt/mdk"));
        assert_eq!(options.max_concurrency, 3);
        assert_eq!(options.target_version, mdk_upgrade::prelude::Version::new(1, 1, 0));
    }

    #[test]
    fn install_directory_is_required() {
        let matches = cli().get_matches_from(["mdk-upgrade", "analyze", "/src"]);
        assert!(analysis_options(&matches).is_err());

        let matches = cli().get_matches_from([
            "mdk-upgrade",
            "--install",
            "/opt/mdk",
            "--target-version",
            "x",
            "analyze",
            "/src",
        ]);
        assert!(analysis_options(&matches).is_err());
    }

    #[tokio::test]
    async fn upgrade_command_repairs_the_tree() {
        let fixture = ProjectFixture::new();
        fixture.add_drifted_script_project("Script", "1.0");
        fixture.add_plain_project("Library");
        let options = fixture.analysis_options();
        let root = fixture.root().to_path_buf();

        upgrade(&root, true, &options).await.unwrap();

        let solution = FsSolution::discover(&root).unwrap();
        let result = ScriptUpgrades::new().analyze_solution(&solution, &options).await.unwrap();
        assert!(result.has_script_projects());
        assert!(result.is_empty());
    }
}
