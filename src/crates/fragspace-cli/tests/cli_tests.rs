//! Command handlers driven from a configuration file

use fragspace_checkpoint::CheckpointFormat;
use fragspace_cli::{commands, ConfigLoader, RunOverrides};
use fragspace_core::{BuildingBlock, InMemoryLibrary, LibraryRules, ShutdownCoordinator, Termination};
use std::path::Path;
use tempfile::TempDir;

fn write_library(dir: &Path) -> std::path::PathBuf {
    let mut rules = LibraryRules::default();
    rules.compatibility.insert("A".to_string(), vec!["f1".to_string(), "f2".to_string()]);
    rules.compatibility.insert("B".to_string(), vec!["f3".to_string()]);
    rules.forbidden_ends.insert("A".to_string());
    rules.forbidden_ends.insert("B".to_string());
    let library = InMemoryLibrary::new()
        .with_scaffold(BuildingBlock::new("R0", &["A", "B"]))
        .with_fragment(BuildingBlock::new("F1", &["f1"]))
        .with_fragment(BuildingBlock::new("F2", &["f2"]))
        .with_fragment(BuildingBlock::new("F3", &["f3"]))
        .with_rules(rules);

    let path = dir.join("library.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&library).unwrap()).expect("Failed to write library");
    path
}

fn loader(dir: &Path) -> ConfigLoader {
    ConfigLoader::new()
        .with_user_path(None)
        .with_project_path(dir.join("missing.toml"))
}

#[tokio::test]
async fn test_run_from_config_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let library = write_library(dir.path());
    let work_dir = dir.path().join("run");
    let config_path = dir.path().join("fragspace.toml");
    std::fs::write(
        &config_path,
        format!(
            "[explorer]\nwork_dir = {:?}\nmax_level = 1\nworkers = 2\nqueue_capacity = 2\ncheckpoint_interval = 2\n\n[library]\npath = {:?}\n",
            work_dir.display().to_string(),
            library.display().to_string()
        ),
    )
    .expect("Failed to write config");

    let config = loader(dir.path())
        .with_explicit(&config_path)
        .load()
        .await
        .expect("Failed to load config");
    let summary = commands::run(config, ShutdownCoordinator::new())
        .await
        .expect("Run failed");

    assert_eq!(summary.candidates_per_level.get(&0), Some(&2));
    assert_eq!(summary.termination, Termination::MaxLevelReached);
    assert!(commands::render_summary(&summary).contains("MaxLevelReached"));

    let counts = commands::level_counts(&work_dir).await.expect("Failed to count levels");
    // Level 1 had nothing to grow, so no directory was created for it
    assert_eq!(summary.candidates_per_level.get(&1), Some(&0));
    assert_eq!(counts, vec![(-1, 1), (0, 2)]);

    let chk = commands::load_checkpoint(&work_dir.join("fragspace.chk"), CheckpointFormat::Json)
        .await
        .expect("Failed to load checkpoint");
    assert_eq!(chk.level, 0);
    assert_eq!(chk.next_cursor, vec![2, 0]);
}

#[tokio::test]
async fn test_flags_override_config() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let library = write_library(dir.path());
    let work_dir = dir.path().join("flags");

    let mut config = loader(dir.path()).load().await.expect("Failed to load config");
    RunOverrides {
        library: Some(library),
        work_dir: Some(work_dir.clone()),
        max_level: Some(0),
        ..Default::default()
    }
    .apply(&mut config);

    let summary = commands::run(config, ShutdownCoordinator::new())
        .await
        .expect("Run failed");
    assert_eq!(summary.last_level(), Some(0));
    assert_eq!(commands::level_counts(&work_dir).await.unwrap(), vec![(-1, 1), (0, 2)]);
}

#[tokio::test]
async fn test_levels_of_empty_directory() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    assert!(commands::level_counts(dir.path()).await.unwrap().is_empty());
}
