use clap::Parser;
use std::path::PathBuf;

use crate::adapters::scenario::Scenario;

/// Schema-driven mock REST server
#[derive(Parser, Debug, Clone)]
#[command(name = "schemock", version, about, long_about = None)]
pub struct Cli {
    /// JSON or YAML schema document to serve
    #[arg(env = "SCHEMOCK_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long, env = "SCHEMOCK_CONFIG", default_value = "schemock.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "SCHEMOCK_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, env = "SCHEMOCK_PORT")]
    pub port: Option<u16>,

    /// Latency and error injection profile
    #[arg(long, value_enum, env = "SCHEMOCK_SCENARIO")]
    pub scenario: Option<Scenario>,

    /// Tighter defaults and optional properties may be omitted
    #[arg(long)]
    pub strict: bool,

    /// Resource name for the conventional CRUD routes
    #[arg(short, long, env = "SCHEMOCK_RESOURCE")]
    pub resource: Option<String>,

    /// Seed for reproducible output
    #[arg(long, env = "SCHEMOCK_SEED")]
    pub seed: Option<u64>,

    /// Disable the synthesis cache
    #[arg(long)]
    pub no_cache: bool,

    /// Reload the schema when the file changes
    #[arg(short, long)]
    pub watch: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "SCHEMOCK_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["schemock"]);
        assert_eq!(cli.config, PathBuf::from("schemock.toml"));
        assert!(cli.schema.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.scenario.is_none());
        assert!(!cli.strict);
        assert!(!cli.no_cache);
    }

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "schemock",
            "users.yaml",
            "--config",
            "custom.toml",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--scenario",
            "sad-path",
            "--strict",
            "--resource",
            "people",
            "--seed",
            "42",
            "--no-cache",
            "--watch",
        ]);
        assert_eq!(cli.schema, Some(PathBuf::from("users.yaml")));
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.host, Some("0.0.0.0".to_string()));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.scenario, Some(Scenario::SadPath));
        assert!(cli.strict);
        assert_eq!(cli.resource.as_deref(), Some("people"));
        assert_eq!(cli.seed, Some(42));
        assert!(cli.no_cache);
        assert!(cli.watch);
    }

    #[test]
    fn test_rejects_unknown_scenario() {
        assert!(Cli::try_parse_from(["schemock", "--scenario", "chaos"]).is_err());
    }
}
