//! Loader for configuration split across several files.
//!
//! The main file may name other files in an `include` directive. Included
//! files are merged section by section; defining the same top-level section
//! twice is an error, as is including a file that is already loaded.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Canonical paths already read, for cycle detection
	loaded_files: HashSet<PathBuf>,
	/// File each top-level section came from, for error messages
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let main_content = self.load_file(&config_path).await?;
		let main_toml: toml::Value = toml::from_str(&main_content)?;

		let includes = extract_includes(&main_toml)?;
		if includes.is_empty() {
			return Config::from_resolved(&main_content);
		}

		let combined = self
			.load_and_combine(main_toml, includes, config_path)
			.await?;

		let config_str = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		Config::from_resolved(&config_str)
	}

	/// Reads a file and resolves environment variables in it.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	async fn load_and_combine(
		&mut self,
		mut main_toml: toml::Value,
		includes: Vec<PathBuf>,
		main_file_path: PathBuf,
	) -> Result<toml::Value, ConfigError> {
		let main_table = main_toml
			.as_table_mut()
			.ok_or_else(|| ConfigError::Parse("Configuration root must be a table".into()))?;
		main_table.remove("include");

		for key in main_table.keys() {
			self.section_sources
				.insert(key.clone(), main_file_path.clone());
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_content = self.load_file(&resolved_path).await?;
			let include_toml: toml::Table = toml::from_str(&include_content)?;

			if include_toml.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"Nested include in {} is not supported",
					resolved_path.display()
				)));
			}

			for (key, value) in include_toml {
				if let Some(existing_source) = self.section_sources.get(&key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing_source.display(),
						resolved_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), resolved_path.clone());
				main_table.insert(key, value);
			}
		}

		Ok(main_toml)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// Reads `include = "a.toml"` or `include = ["a.toml", "b.toml"]`.
fn extract_includes(toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let Some(include_value) = toml.get("include") else {
		return Ok(Vec::new());
	};

	if let Some(path_str) = include_value.as_str() {
		return Ok(vec![PathBuf::from(path_str)]);
	}

	let include_array = include_value.as_array().ok_or_else(|| {
		ConfigError::Validation("Include must be a string or array of strings".into())
	})?;

	include_array
		.iter()
		.map(|item| {
			item.as_str().map(PathBuf::from).ok_or_else(|| {
				ConfigError::Validation("Include array must contain only strings".into())
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");

		let config_content = r#"
[service]
name = "corner-bakery"

[storage]
primary = "memory"
cleanup_interval_seconds = 30
[storage.implementations.memory]
"#;
		fs::write(&config_path, config_content).unwrap();

		let config = Config::from_file(&config_path).await.unwrap();
		assert_eq!(config.service.name, "corner-bakery");
		assert_eq!(config.storage.cleanup_interval_seconds, 30);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["storage.toml", "admin.toml"]
[service]
name = "corner-bakery"
"#;
		let storage_config = r#"
[storage]
primary = "file"
[storage.implementations.file]
storage_path = "./data/orders"
"#;
		let admin_config = r#"
[admin]
username = "baker"
password = "rye"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), storage_config).unwrap();
		fs::write(temp_dir.path().join("admin.toml"), admin_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.service.name, "corner-bakery");
		assert_eq!(config.storage.primary, "file");
		assert_eq!(config.admin.username, "baker");
		assert!(config.admin.password.matches("rye"));
	}

	#[tokio::test]
	async fn test_env_values_substituted_once() {
		let temp_dir = TempDir::new().unwrap();
		std::env::set_var("BAKERY_TEST_LITERAL_PASSWORD", "${BAKERY_TEST_NEVER_SET}");

		let main_config = r#"
include = ["storage.toml"]
[admin]
password = "${BAKERY_TEST_LITERAL_PASSWORD}"
"#;
		let storage_config = r#"
[storage]
primary = "memory"
[storage.implementations.memory]
"#;
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), storage_config).unwrap();
		fs::write(
			temp_dir.path().join("single.toml"),
			format!("{}{}", storage_config, "[admin]\npassword = \"${BAKERY_TEST_LITERAL_PASSWORD}\"\n"),
		)
		.unwrap();

		let config = ConfigLoader::new(temp_dir.path())
			.load_config("main.toml")
			.await
			.unwrap();
		assert!(config.admin.password.matches("${BAKERY_TEST_NEVER_SET}"));

		let config = ConfigLoader::new(temp_dir.path())
			.load_config("single.toml")
			.await
			.unwrap();
		assert!(config.admin.password.matches("${BAKERY_TEST_NEVER_SET}"));

		std::env::remove_var("BAKERY_TEST_LITERAL_PASSWORD");
	}

	#[tokio::test]
	async fn test_duplicate_sections_rejected() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = "storage.toml"
[storage]
primary = "memory"
[storage.implementations.memory]
"#;
		let storage_config = r#"
[storage]
primary = "file"
[storage.implementations.file]
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), storage_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'storage'"));
	}

	#[tokio::test]
	async fn test_self_include_detected() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["main.toml"]
[storage]
primary = "memory"
[storage.implementations.memory]
"#;
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Circular include"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = [\"nope.toml\"]\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Io(_))
		));
	}

	#[test]
	fn test_include_must_be_strings() {
		let value: toml::Value = toml::from_str("include = [1, 2]").unwrap();
		assert!(extract_includes(&value).is_err());
	}
}
