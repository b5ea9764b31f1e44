use std::env;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

const DEFAULT_VERIFY_BASE_URL: &str = "http://localhost:8080/certificates/verify";

/// Platform switches the award engine consults. Injected, never read from globals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub badges_enabled: bool,
    pub certificates_enabled: bool,
    pub certificate_verify_base_url: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            badges_enabled: true,
            certificates_enabled: true,
            certificate_verify_base_url: DEFAULT_VERIFY_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: SecretString,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub engine: EngineSettings,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongo_conn_string: SecretString::from(
                env::var("MONGO_CONN_STRING")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            ),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "tutorly-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            engine: EngineSettings {
                badges_enabled: env_flag("BADGES_ENABLED", true),
                certificates_enabled: env_flag("CERTIFICATES_ENABLED", true),
                certificate_verify_base_url: env::var("CERTIFICATE_VERIFY_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_VERIFY_BASE_URL.to_string()),
            },
        }
    }

    /// Certificates printed with a localhost verification link cannot be verified by anyone.
    pub fn validate_for_production(&self) -> AppResult<()> {
        let base = &self.engine.certificate_verify_base_url;

        if base == DEFAULT_VERIFY_BASE_URL || base.contains("localhost") {
            return Err(AppError::ValidationError(format!(
                "CERTIFICATE_VERIFY_BASE_URL points at a local address ({}); set it to the public verification page",
                base
            )));
        }

        if !base.starts_with("https://") {
            return Err(AppError::ValidationError(
                "CERTIFICATE_VERIFY_BASE_URL must use https".to_string(),
            ));
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: SecretString::from("mongodb://localhost:27017".to_string()),
            mongo_db_name: "tutorly-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            engine: EngineSettings::default(),
        }
    }
}
