use thiserror::Error;

use crate::config::{GeneratorSettings, SchemaSettings, ServerSettings, Settings};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_server(&settings.server) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_schema(&settings.schema) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_generator(&settings.generator) {
            errors.extend(e);
        }

        if !LOG_LEVELS.contains(&settings.log_level.to_ascii_lowercase().as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "log_level".to_string(),
                reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }

        if settings.watch && settings.schema.path.is_none() {
            errors.push(ValidationError::InvalidValue {
                field: "watch".to_string(),
                reason: "watching requires schema.path".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_schema(schema: &SchemaSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(name) = &schema.resource_name {
            if name.trim().is_empty() {
                errors.push(ValidationError::MissingField("schema.resource_name".to_string()));
            } else if name.contains('/') || name.chars().any(char::is_whitespace) {
                errors.push(ValidationError::InvalidValue {
                    field: "schema.resource_name".to_string(),
                    reason: "must be a single path segment".to_string(),
                });
            }
        }

        if !schema.base_path.starts_with('/') {
            errors.push(ValidationError::InvalidValue {
                field: "schema.base_path".to_string(),
                reason: "must start with '/'".to_string(),
            });
        }

        if let Some(path) = &schema.path {
            if !path.exists() {
                errors.push(ValidationError::InvalidValue {
                    field: "schema.path".to_string(),
                    reason: format!("{} does not exist", path.display()),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_generator(generator: &GeneratorSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if generator.cache.enabled && generator.cache.capacity == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "generator.cache.capacity".to_string(),
                reason: "Capacity must be greater than 0 when the cache is enabled".to_string(),
            });
        }

        if generator.cache.enabled && generator.cache.ttl_seconds == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "generator.cache.ttl_seconds".to_string(),
                reason: "TTL must be greater than 0 when the cache is enabled".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
