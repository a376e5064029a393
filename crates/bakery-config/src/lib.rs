//! Configuration module for the bakery service.
//!
//! Configuration is read from a TOML file. Values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, and a file may pull in other
//! files with `include = ["storage.toml"]` as long as every top-level section
//! is defined only once across all files.

mod loader;

use bakery_types::SecretString;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the full error echoes the input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the bakery service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	#[serde(default)]
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Credentials gating the admin dashboard.
	#[serde(default)]
	pub admin: AdminConfig,
	/// Configuration for the HTTP API server.
	#[serde(default)]
	pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Name reported in logs and the health endpoint.
	#[serde(default = "default_service_name")]
	pub name: String,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			name: default_service_name(),
		}
	}
}

fn default_service_name() -> String {
	"bakery".to_string()
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval() -> u64 {
	60
}

/// Static credentials for the admin dashboard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
	#[serde(default = "default_admin_username")]
	pub username: String,
	#[serde(default = "default_admin_password")]
	pub password: SecretString,
	/// Lifetime of a session issued at login.
	#[serde(default = "default_session_ttl")]
	pub session_ttl_seconds: u64,
}

impl Default for AdminConfig {
	fn default() -> Self {
		Self {
			username: default_admin_username(),
			password: default_admin_password(),
			session_ttl_seconds: default_session_ttl(),
		}
	}
}

fn default_admin_username() -> String {
	"admin".to_string()
}

fn default_admin_password() -> SecretString {
	SecretString::from("password")
}

fn default_session_ttl() -> u64 {
	3600
}

/// Longest admin session accepted in configuration: 30 days.
pub const MAX_SESSION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Order bodies are small; 64KB leaves room for long special requests.
fn default_max_request_size() -> usize {
	64 * 1024
}

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.expect("env var pattern is a valid regex")
});

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Bound the input so the regex scan stays cheap
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in ENV_VAR_PATTERN.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}

	result.push_str(&input[last..]);
	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));

		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;

		let mut loader = ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	/// Parses text whose environment references are already substituted.
	pub(crate) fn from_resolved(resolved: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(resolved)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks cross-field rules serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.name.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Service name cannot be empty".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}

		if self.admin.username.is_empty() {
			return Err(ConfigError::Validation(
				"Admin username cannot be empty".into(),
			));
		}
		if self.admin.password.is_empty() {
			return Err(ConfigError::Validation(
				"Admin password cannot be empty".into(),
			));
		}
		if self.admin.session_ttl_seconds == 0 {
			return Err(ConfigError::Validation(
				"Admin session_ttl_seconds must be greater than 0".into(),
			));
		}
		if self.admin.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
			return Err(ConfigError::Validation(format!(
				"Admin session_ttl_seconds must be at most {}",
				MAX_SESSION_TTL_SECONDS
			)));
		}

		if self.api.max_request_size == 0 {
			return Err(ConfigError::Validation(
				"API max_request_size must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses and validates a configuration from a TOML string, resolving
/// environment variables first.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Config::from_resolved(&resolve_env_vars(s)?)
	}
}
