//! Solution-wide analysis, upgrade flow and busy notifications

use mdk_test_utils::{ProjectFixture, TestProject};
use mdk_upgrade::prelude::*;
use mdk_upgrade::{BusyState, CURRENT_VERSION};
use std::sync::Arc;

#[tokio::test]
async fn solution_keeps_only_failing_script_projects() {
    let fixture = ProjectFixture::new();
    fixture.add_plain_project("Library");
    fixture.add_valid_script_project("Good", &CURRENT_VERSION.to_string());
    fixture.add_drifted_script_project("Bad", "1.0");
    let solution = fixture.solution(&["Library", "Good", "Bad"]);

    let result = ScriptUpgrades::new()
        .analyze_solution(&solution, &fixture.analysis_options())
        .await
        .unwrap();

    assert!(result.has_script_projects());
    let names: Vec<&str> = result.bad_projects().iter().map(|p| p.project().name()).collect();
    assert_eq!(names, vec!["Bad"]);
}

#[tokio::test]
async fn all_valid_solution_is_empty_but_has_script_projects() {
    let fixture = ProjectFixture::new();
    fixture.add_valid_script_project("One", &CURRENT_VERSION.to_string());
    fixture.add_valid_script_project("Two", &CURRENT_VERSION.to_string());
    let solution = fixture.solution(&["One", "Two"]);

    let result = ScriptUpgrades::new()
        .analyze_solution(&solution, &fixture.analysis_options())
        .await
        .unwrap();

    assert!(result.has_script_projects());
    assert!(result.is_empty());
}

#[tokio::test]
async fn solution_without_script_projects() {
    let fixture = ProjectFixture::new();
    fixture.add_plain_project("Library");
    fixture.add_plain_project("Tests");
    let solution = fixture.solution(&["Library", "Tests"]);

    let result = ScriptUpgrades::new()
        .analyze_solution(&solution, &fixture.analysis_options())
        .await
        .unwrap();

    assert!(!result.has_script_projects());
    assert!(result.is_empty());
}

#[tokio::test]
async fn single_project_uses_solution_rules() {
    let fixture = ProjectFixture::new();
    fixture.add_valid_script_project("Script", &CURRENT_VERSION.to_string());
    let service = ScriptUpgrades::new();

    let result = service
        .analyze_project(fixture.project("Script"), &fixture.analysis_options())
        .await
        .unwrap();
    assert!(result.has_script_projects());
    assert!(result.is_empty());
}

#[tokio::test]
async fn one_broken_project_fails_the_scan() {
    let fixture = ProjectFixture::new();
    fixture.add_valid_script_project("Good", &CURRENT_VERSION.to_string());
    fixture.add_options("Broken", "1.0");
    let solution = fixture.solution(&["Good", "Broken"]);
    let service = ScriptUpgrades::new();

    let err = service
        .analyze_solution(&solution, &fixture.analysis_options())
        .await
        .unwrap_err();
    assert!(matches!(err, UpgradeError::Xml(_)));
    assert!(!service.busy().is_busy());
}

#[tokio::test]
async fn busy_flag_toggles_only_at_the_outermost_operation() {
    let fixture = ProjectFixture::new();
    fixture.add_drifted_script_project("Script", "1.0");
    let busy = Arc::new(BusyState::new());
    let service = ScriptUpgrades::new().with_busy_state(Arc::clone(&busy));
    let mut rx = service.subscribe_busy();

    let outer = busy.begin();
    assert!(rx.has_changed().unwrap());
    assert!(*rx.borrow_and_update());

    let analysis = service
        .analyze_solution(&fixture.solution(&["Script"]), &fixture.analysis_options())
        .await
        .unwrap();
    service.upgrade(analysis).await.unwrap();
    assert!(!rx.has_changed().unwrap());
    assert_eq!(busy.depth(), 1);

    drop(outer);
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());
}

#[tokio::test]
async fn upgrade_unloads_repairs_and_reloads() {
    let fixture = ProjectFixture::new();
    fixture.add_drifted_script_project("Script", "1.0");
    let project = Arc::new(TestProject::new(fixture.project_file("Script")));
    let service = ScriptUpgrades::new();
    let options = fixture.analysis_options();

    let analysis = service.analyze_project(project.clone(), &options).await.unwrap();
    let upgraded = service.upgrade(analysis).await.unwrap();

    assert_eq!(upgraded.len(), 1);
    assert_eq!(upgraded[0].report.references_fixed, 4);
    assert!(upgraded[0].project.is_loaded());
    assert_eq!(project.unloads(), 1);
    assert_eq!(project.reloads(), 1);

    let again = service
        .analyze_project(Arc::clone(&upgraded[0].project), &options)
        .await
        .unwrap();
    assert!(again.has_script_projects());
    assert!(again.is_empty());
}

#[tokio::test]
async fn failed_repair_still_reloads_project() {
    let fixture = ProjectFixture::new();
    fixture.add_drifted_script_project("Script", "1.0");
    let project = Arc::new(TestProject::new(fixture.project_file("Script")));
    let service = ScriptUpgrades::new();

    let analysis = service
        .analyze_project(project.clone(), &fixture.analysis_options())
        .await
        .unwrap();
    std::fs::remove_file(fixture.install_path().join("Analyzers").join("whitelist.cache")).unwrap();

    let err = service.upgrade(analysis).await.unwrap_err();
    assert!(matches!(err, UpgradeError::Io { .. }));
    assert_eq!(project.unloads(), 1);
    assert_eq!(project.reloads(), 1);
    assert!(!service.busy().is_busy());
}

#[tokio::test]
async fn reload_failure_is_reported() {
    let fixture = ProjectFixture::new();
    fixture.add_drifted_script_project("Script", "1.0");
    let project: Arc<dyn HostProject> =
        Arc::new(TestProject::new(fixture.project_file("Script")).failing_reload());
    let service = ScriptUpgrades::new();

    let analysis = service
        .analyze_project(project, &fixture.analysis_options())
        .await
        .unwrap();
    let err = service.upgrade(analysis).await.unwrap_err();
    assert!(matches!(err, UpgradeError::Host(_)));
}

#[tokio::test]
async fn upgrade_project_allows_continuing_past_failures() {
    let fixture = ProjectFixture::new();
    fixture.add_project("Broken", "<Settings>\n  <ItemGroup />\n</Settings>\n");
    fixture.add_options("Broken", "1.0");
    fixture.add_drifted_script_project("Fine", "1.0");
    let service = ScriptUpgrades::new();

    let analysis = service
        .analyze_solution(&fixture.solution(&["Broken", "Fine"]), &fixture.analysis_options())
        .await
        .unwrap();
    assert_eq!(analysis.bad_projects().len(), 2);

    let mut failed = Vec::new();
    let mut upgraded = Vec::new();
    for project in analysis.into_bad_projects() {
        let name = project.project().name().to_string();
        match service.upgrade_project(project).await {
            Ok(done) => upgraded.push(done.project.name().to_string()),
            Err(e) => {
                assert!(e.is_corrupt_project());
                failed.push(name);
            }
        }
    }

    assert_eq!(failed, vec!["Broken".to_string()]);
    assert_eq!(upgraded, vec!["Fine".to_string()]);
}
