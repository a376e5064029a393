//! Registry of the storage implementations the service can be configured
//! with.
//!
//! Implementations register themselves through
//! `bakery_storage::get_all_implementations`; the registry checks the
//! configuration against them before anything is instantiated.

use bakery_config::Config;
use bakery_core::{Bakery, BakeryBuilder, BakeryError, StorageFactory};
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Sorted names of the registered storage implementations.
	pub fn storage_names(&self) -> Vec<&str> {
		let mut names: Vec<_> = self.storage.keys().map(String::as_str).collect();
		names.sort();
		names
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in bakery_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		registry
	})
}

/// Builds the services from configuration.
///
/// Every configured storage section must name a registered implementation,
/// not only the primary one, so typos in unused sections still fail fast.
pub fn build_bakery_from_config(config: Config) -> Result<Bakery, BakeryError> {
	let registry = initialize_registry();

	for name in config.storage.implementations.keys() {
		if !registry.storage.contains_key(name) {
			return Err(BakeryError::Config(format!(
				"Unknown storage implementation '{}'. Available: [{}]",
				name,
				registry.storage_names().join(", ")
			)));
		}
	}

	BakeryBuilder::new(config).build(&registry.storage)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_registry_knows_builtin_storage() {
		assert_eq!(initialize_registry().storage_names(), vec!["file", "memory"]);
	}

	#[test]
	fn test_unknown_secondary_implementation_rejected() {
		let config: Config = r#"
[storage]
primary = "memory"
[storage.implementations.memory]
[storage.implementations.postgres]
url = "postgres://localhost"
"#
		.parse()
		.unwrap();

		let message = build_bakery_from_config(config).err().unwrap().to_string();
		assert!(message.contains("'postgres'"));
	}

	#[tokio::test]
	async fn test_build_file_backed_bakery() {
		let dir = tempfile::tempdir().unwrap();
		let config: Config = format!(
			"[storage]\nprimary = \"file\"\n[storage.implementations.file]\nstorage_path = \"{}\"\n",
			dir.path().display()
		)
		.parse()
		.unwrap();

		let bakery = build_bakery_from_config(config).unwrap();
		assert!(bakery.orders().get_all_orders().await.unwrap().is_empty());
	}
}
