mod common;

use common::folder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use syncwatch::SyncWatchError;
use syncwatch::config::{ClientConfig, FolderConfig, FolderFilter, WatchConfig, expand_tilde};
use tempfile::TempDir;

#[test]
fn defaults_match_documented_values() {
    let config = WatchConfig::default();
    assert_eq!(config.debounce, Duration::from_millis(500));
    assert_eq!(config.remote_settle, Duration::from_millis(600));
    assert_eq!(config.dir_vs_files, 256);
    assert_eq!(config.max_tracked, 5000);
    assert_eq!(config.reminder_every(), Some(Duration::from_secs(3240)));
}

#[test]
fn zero_delay_disables_reminder() {
    let config = WatchConfig {
        delay_scan: Some(Duration::ZERO),
        ..WatchConfig::default()
    };
    assert_eq!(config.reminder_every(), None);
}

#[test]
fn folder_config_parses_syncthing_json() {
    let json = r#"{
        "id": "abcd-1234",
        "label": "Photos",
        "path": "~/Photos",
        "readOnly": true,
        "rescanIntervalS": 60
    }"#;

    let folder: FolderConfig = serde_json::from_str(json).unwrap();
    assert_eq!(folder.id, "abcd-1234");
    assert_eq!(folder.path, "~/Photos");
    assert!(folder.read_only);
    assert_eq!(folder.rescan_interval_s, 60);
}

#[test]
fn missing_optional_fields_default() {
    let folder: FolderConfig = serde_json::from_str(r#"{"id": "x", "path": "/x"}"#).unwrap();
    assert!(!folder.read_only);
    assert_eq!(folder.rescan_interval_s, 0);
}

#[test]
fn tilde_expands_to_home() {
    let home = dirs::home_dir().expect("home directory");

    assert_eq!(expand_tilde("~").unwrap(), home);
    assert_eq!(expand_tilde("~/Sync/a").unwrap(), home.join("Sync/a"));
    assert_eq!(expand_tilde("/abs/path").unwrap(), PathBuf::from("/abs/path"));
    assert_eq!(expand_tilde("~other").unwrap(), PathBuf::from("~other"));
}

#[test]
fn same_watch_compares_id_and_path() {
    let a = folder("a", Path::new("/one"));
    let mut moved = a.clone();
    moved.path = "/two".to_string();
    let mut rescanned = a.clone();
    rescanned.rescan_interval_s = 10;

    assert!(a.same_watch(&rescanned));
    assert!(!a.same_watch(&moved));
}

#[test]
fn folder_filter_selection() {
    let all = vec![
        folder("a", Path::new("/a")),
        folder("b", Path::new("/b")),
        folder("c", Path::new("/c")),
    ];
    let ids = |folders: Vec<FolderConfig>| folders.into_iter().map(|f| f.id).collect::<Vec<_>>();

    assert_eq!(ids(FolderFilter::All.apply(all.clone())), vec!["a", "b", "c"]);

    let only = FolderFilter::from_lists(vec!["b".into()], vec![]).unwrap();
    assert_eq!(ids(only.apply(all.clone())), vec!["b"]);

    let skip = FolderFilter::from_lists(vec![], vec!["b".into()]).unwrap();
    assert_eq!(ids(skip.apply(all)), vec!["a", "c"]);
}

#[test]
fn folder_filter_rejects_both_lists() {
    let result = FolderFilter::from_lists(vec!["a".into()], vec!["b".into()]);
    assert!(matches!(result, Err(SyncWatchError::Config(_))));
}

#[test]
fn client_target_gets_scheme() {
    assert_eq!(
        ClientConfig::default().with_target("localhost:8384").target,
        "http://localhost:8384"
    );
    assert_eq!(
        ClientConfig::default().with_target("https://host:8384/").target,
        "https://host:8384"
    );
}

#[test]
fn csrf_token_is_last_line_of_file() -> Result<(), SyncWatchError> {
    let dir = TempDir::new()?;
    let file = dir.path().join("csrftokens.txt");
    std::fs::write(&file, "old-token\nnew-token\n\n")?;

    let config = ClientConfig::default().with_csrf_file(&file)?;
    assert_eq!(config.csrf_token.as_deref(), Some("new-token"));
    Ok(())
}
