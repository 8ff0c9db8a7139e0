use schemock::adapters::scenario::Scenario;
use schemock::config::{load_schema, Settings};
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_load_full_config() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    let schema_yaml = r#"
title: Blog Posts
type: object
required: [id, title]
properties:
  id:
    type: string
    format: uuid
  title:
    type: string
    minLength: 3
"#;
    let schema_path = root.join("posts.yaml");
    fs::write(&schema_path, schema_yaml)?;

    let config_toml = format!(
        r#"
log_level = "debug"
watch = true
scenario = "sad-path"

[server]
host = "0.0.0.0"
port = 8081

[schema]
path = "{}"
strict = true
base_path = "/v1"

[generator]
seed = 99

[generator.cache]
capacity = 10
ttl_seconds = 5
"#,
        schema_path.display()
    );
    let config_path = root.join("schemock.toml");
    fs::write(&config_path, config_toml)?;

    let settings = Settings::from_file(&config_path)?;
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8081);
    assert_eq!(settings.scenario, Scenario::SadPath);
    assert_eq!(settings.log_level, "debug");
    assert!(settings.watch);
    assert!(settings.schema.strict);
    assert_eq!(settings.schema.base_path, "/v1");
    assert_eq!(settings.generator.seed, Some(99));
    assert!(settings.generator.cache.enabled);
    assert_eq!(settings.generator.cache.capacity, 10);
    assert_eq!(settings.generator.cache.ttl_seconds, 5);

    let schema = load_schema(settings.schema.path.as_ref().unwrap())?;
    assert_eq!(schema["properties"]["title"]["minLength"], 3);

    let state = schemock::build_state(&settings, schema)?;
    let table = state.current_routes().await;
    assert!(table.resource("blog-posts").is_some());
    assert!(table
        .list()
        .iter()
        .any(|route| route.path == "/v1/blog-posts/:id"));

    Ok(())
}

#[test]
fn test_missing_config_file_uses_defaults() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = Settings::from_file(&temp_dir.path().join("absent.toml"))?;

    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 3000);
    assert_eq!(settings.scenario, Scenario::Normal);
    assert_eq!(settings.schema.base_path, "/api");
    assert!(settings.generator.cache.enabled);
    assert_eq!(settings.generator.cache.capacity, 100);
    assert_eq!(settings.generator.cache.ttl_seconds, 60);
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("schemock.toml");
    fs::write(
        &config_path,
        r#"
[schema]
resource_name = "nested/name"
base_path = "api"

[generator.cache]
capacity = 0
"#,
    )?;

    let err = Settings::from_file(&config_path).unwrap_err().to_string();
    assert!(err.contains("Configuration validation failed"));
    assert!(err.contains("resource_name"));
    assert!(err.contains("base_path"));
    assert!(err.contains("capacity"));
    Ok(())
}

#[test]
fn test_missing_schema_file_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("schemock.toml");
    fs::write(
        &config_path,
        format!(
            "[schema]\npath = \"{}\"\n",
            temp_dir.path().join("gone.json").display()
        ),
    )?;

    assert!(Settings::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_unknown_scenario_fails_to_deserialize() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("schemock.toml");
    fs::write(&config_path, "scenario = \"chaos\"\n")?;

    assert!(Settings::from_file(&config_path).is_err());
    Ok(())
}
