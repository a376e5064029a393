//! Core services for the bakery order service.
//!
//! [`Bakery`] bundles the storage backend selected in configuration with the
//! two services built on it: the [`OrderBook`] that accepts and lists order
//! requests, and the [`AdminGate`] that guards the dashboard.

use bakery_config::Config;
use bakery_storage::{StorageError, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

pub mod admin;
pub mod orders;

pub use admin::{AdminError, AdminGate, AdminSession};
pub use orders::{OrderBook, OrderError};

/// Errors that can occur while assembling the services.
#[derive(Debug, Error)]
pub enum BakeryError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

pub use bakery_storage::StorageFactory;

/// Storage plus the services that share it.
pub struct Bakery {
	config: Config,
	storage: Arc<StorageService>,
	orders: OrderBook,
	admin: AdminGate,
}

impl Bakery {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn orders(&self) -> &OrderBook {
		&self.orders
	}

	pub fn admin(&self) -> &AdminGate {
		&self.admin
	}

	/// Spawns the task that purges expired records (stale admin sessions,
	/// orders past `ttl_orders`) every `cleanup_interval_seconds`.
	pub fn spawn_storage_cleanup(&self) -> JoinHandle<()> {
		let storage = self.storage.clone();
		let period = Duration::from_secs(self.config.storage.cleanup_interval_seconds);

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		})
	}
}

/// Builds a [`Bakery`] from configuration and the available storage
/// factories.
pub struct BakeryBuilder {
	config: Config,
}

impl BakeryBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Instantiates the primary storage implementation and the services.
	pub fn build(
		self,
		storage_factories: &HashMap<String, StorageFactory>,
	) -> Result<Bakery, BakeryError> {
		let primary = &self.config.storage.primary;

		let factory = storage_factories.get(primary).ok_or_else(|| {
			let mut available: Vec<_> = storage_factories.keys().cloned().collect();
			available.sort();
			BakeryError::Config(format!(
				"Unknown storage implementation '{}'. Available: [{}]",
				primary,
				available.join(", ")
			))
		})?;

		let backend_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BakeryError::Config(format!(
					"Primary storage '{}' has no configuration section",
					primary
				))
			})?;

		let backend = factory(backend_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage backend"
			);
			BakeryError::Config(format!(
				"Failed to create storage backend '{}': {}",
				primary, e
			))
		})?;

		tracing::info!(component = "storage", implementation = %primary, "Storage ready");

		let storage = Arc::new(StorageService::new(backend));
		let orders = OrderBook::new(storage.clone());
		let admin = AdminGate::new(storage.clone(), &self.config.admin);

		Ok(Bakery {
			config: self.config,
			storage,
			orders,
			admin,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn factories() -> HashMap<String, StorageFactory> {
		bakery_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect()
	}

	fn config(primary: &str) -> Config {
		format!(
			"[storage]\nprimary = \"{}\"\ncleanup_interval_seconds = 1\n[storage.implementations.{}]\n",
			primary, primary
		)
		.parse()
		.unwrap()
	}

	#[tokio::test]
	async fn test_build_with_memory_storage() {
		let bakery = BakeryBuilder::new(config("memory"))
			.build(&factories())
			.unwrap();
		assert!(bakery.orders().get_all_orders().await.unwrap().is_empty());
		assert_eq!(bakery.config().storage.primary, "memory");
	}

	#[test]
	fn test_unknown_implementation() {
		let err = BakeryBuilder::new(config("redis"))
			.build(&factories())
			.err()
			.unwrap();
		let message = err.to_string();
		assert!(message.contains("Unknown storage implementation 'redis'"));
		assert!(message.contains("file, memory"));
	}

	#[tokio::test]
	async fn test_services_share_storage() {
		let bakery = BakeryBuilder::new(config("memory"))
			.build(&factories())
			.unwrap();

		let login = bakery.admin().login("admin", "password").await.unwrap();
		assert!(bakery
			.storage()
			.exists("sessions", &login.token)
			.await
			.unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn test_cleanup_task_purges_expired_sessions() {
		let bakery = BakeryBuilder::new(config("memory"))
			.build(&factories())
			.unwrap();
		let storage = bakery.storage().clone();

		storage
			.store_with_ttl("sessions", "old", &"x", Some(Duration::from_secs(1)))
			.await
			.unwrap();

		let handle = bakery.spawn_storage_cleanup();
		tokio::time::sleep(Duration::from_secs(3)).await;

		assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
		handle.abort();
	}
}
