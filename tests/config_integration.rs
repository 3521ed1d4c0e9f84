use pensieve::config::{AppConfig, EmbeddingBackend, EmbeddingModelKind};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("PENSIEVE_CONFIG_FILE");
        env::remove_var("PENSIEVE_SNAPSHOT_PATH");
        env::remove_var("PENSIEVE_CRYSTALLIZE_INTERVAL");
        env::remove_var("PENSIEVE_EMBEDDING_PROVIDER");
        env::remove_var("PENSIEVE_LOG_JSON");
        env::remove_var("PENSIEVE_STORE__MAX_MEMORIES");
        env::remove_var("PENSIEVE_STORE__MAX_TOPICS");
        env::remove_var("PENSIEVE_EMBEDDING__TOPIC_MODEL");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(["pensieve"]).expect("defaults should load");
    assert_eq!(
        config.store.snapshot_path,
        PathBuf::from("pensieve_memories.json")
    );
    assert_eq!(config.store.crystallize_interval_secs, 60);
    assert_eq!(config.store.max_memories, 10);
    assert_eq!(config.store.max_topics, 2);
    assert_eq!(config.store.max_unsaved_memories, 5);
    assert_eq!(config.embedding.provider, EmbeddingBackend::FastEmbed);
    assert_eq!(config.embedding.title_model, EmbeddingModelKind::BgeSmallEnV15);
    assert_eq!(config.embedding.topic_model, EmbeddingModelKind::AllMiniLmL6V2);
    assert_eq!(config.embedding.hashing_dimension, 256);
    assert!(!config.logging.json);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("PENSIEVE_STORE__MAX_MEMORIES", "25");
        env::set_var("PENSIEVE_EMBEDDING__TOPIC_MODEL", "bge-base-en-v1.5");
    }

    let config = AppConfig::load_from_args(["pensieve"]).expect("Failed to load config");
    assert_eq!(config.store.max_memories, 25);
    assert_eq!(config.embedding.topic_model, EmbeddingModelKind::BgeBaseEnV15);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_flags_win_over_env() {
    clear_env_vars();
    unsafe {
        env::set_var("PENSIEVE_EMBEDDING_PROVIDER", "fastembed");
    }

    let config = AppConfig::load_from_args([
        "pensieve",
        "--embedding-provider",
        "hashing",
        "--crystallize-interval",
        "5",
        "--snapshot-path",
        "elsewhere.json",
    ])
    .expect("Failed to load config");

    assert_eq!(config.embedding.provider, EmbeddingBackend::Hashing);
    assert_eq!(config.store.crystallize_interval_secs, 5);
    assert_eq!(config.store.snapshot_path, PathBuf::from("elsewhere.json"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("custom.yaml");
    fs::write(
        &file_path,
        r#"
store:
  max_topics: 3
  snapshot_path: /tmp/pensieve-test.json
logging:
  json: true
"#,
    )
    .expect("Failed to write temp config");

    unsafe {
        env::set_var("PENSIEVE_CONFIG_FILE", &file_path);
    }

    let config = AppConfig::load_from_args(["pensieve"]).expect("Failed to load config from file");
    assert_eq!(config.store.max_topics, 3);
    assert_eq!(
        config.store.snapshot_path,
        PathBuf::from("/tmp/pensieve-test.json")
    );
    assert!(config.logging.json);
    assert_eq!(config.store.max_memories, 10);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let cwd_path = "pensieve.yaml";
    fs::write(cwd_path, "store:\n  max_unsaved_memories: 9\n")
        .expect("Failed to write ./pensieve.yaml");

    let config = AppConfig::load_from_args(["pensieve"]);
    fs::remove_file(cwd_path).unwrap();

    assert_eq!(config.expect("Failed to load config").store.max_unsaved_memories, 9);
}

#[test]
#[serial]
fn test_zero_interval_fails_validation() {
    clear_env_vars();

    let config = AppConfig::load_from_args(["pensieve", "--crystallize-interval", "0"])
        .expect("Failed to load config");
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("store.crystallize_interval_secs"));
}
