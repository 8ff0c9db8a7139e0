use anyhow::Context;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub mod validator;
pub mod watcher;

use crate::adapters::routes::{RouteOptions, DEFAULT_BASE_PATH};
use crate::adapters::scenario::Scenario;
use crate::cli::Cli;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub schema: SchemaSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub scenario: Scenario,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Reload the schema file when it changes
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaSettings {
    /// JSON or YAML schema document
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Overrides the resource name derived from the schema title
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            path: None,
            resource_name: None,
            strict: false,
            base_path: default_base_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeneratorSettings {
    /// Fixed seed for reproducible output
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_file(Path::new("schemock.toml"))
    }

    /// Create settings from CLI arguments (includes config file and CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::load(&cli.config)?;

        // Apply CLI overrides (CLI > env vars > config file)
        settings.apply_cli_overrides(cli);

        settings.validate()?;
        Ok(settings)
    }

    /// Defaults, then the optional file, then `SCHEMOCK__*` variables
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("SCHEMOCK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(s.try_deserialize()?)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(path) = &cli.schema {
            self.schema.path = Some(path.clone());
        }
        if let Some(resource) = &cli.resource {
            self.schema.resource_name = Some(resource.clone());
        }
        if cli.strict {
            self.schema.strict = true;
        }
        if let Some(scenario) = cli.scenario {
            self.scenario = scenario;
        }
        if let Some(seed) = cli.seed {
            self.generator.seed = Some(seed);
        }
        if cli.no_cache {
            self.generator.cache.enabled = false;
        }
        if cli.watch {
            self.watch = true;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
    }

    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            resource_name: self.schema.resource_name.clone(),
            base_path: self.schema.base_path.clone(),
        }
    }
}

/// Read a schema document, picking YAML or JSON by extension
pub fn load_schema(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let value = match extension.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
    };
    Ok(value)
}
