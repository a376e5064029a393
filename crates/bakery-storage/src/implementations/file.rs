//! File-based storage backend.
//!
//! Every key is stored as its own file under a base directory. A file is a
//! fixed 64-byte header followed by the record bytes; the header carries the
//! expiry time so expired records can be detected without decoding them.
//!
//! File names are the hex encoding of the key, so any key maps to a portable
//! name. Keys longer than [`MAX_KEY_LEN`] bytes cannot be stored and read as
//! missing.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use bakery_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SchemaError, StorageKey,
};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";
const RECORD_EXTENSION: &str = "rec";

/// Longest key, in bytes, that maps to a file name. Hex doubles the length,
/// which keeps names well under the usual 255-byte limit.
pub const MAX_KEY_LEN: usize = 120;

/// Upper bound for the `ttl_*` settings: ten years.
const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default()
}

/// Fixed-size record header.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "BAKE"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-63]: Reserved, zero
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"BAKE";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			unix_now().saturating_add(ttl.as_secs().max(1))
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Bad magic bytes".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && unix_now() >= self.expires_at
	}
}

/// Splits a record file into its payload, or `None` if it has expired.
fn decode_record(data: Vec<u8>) -> Result<Option<Vec<u8>>, StorageError> {
	let header = FileHeader::deserialize(&data)?;
	if header.is_expired() {
		return Ok(None);
	}
	Ok(Some(data[FileHeader::SIZE..].to_vec()))
}

/// Default TTL per namespace, read from `ttl_<namespace>` settings.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter_map(|storage_key| {
				config
					.get(format!("ttl_{}", storage_key.as_str()))
					.and_then(|v| v.as_integer())
					.and_then(|v| u64::try_from(v).ok())
					.map(|secs| (storage_key, Duration::from_secs(secs)))
			})
			.collect();

		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Maps a key to its file name stem; `None` if the key is too long.
	///
	/// Hex keeps prefixes intact, so a key prefix maps to a stem prefix.
	fn file_name(key: &str) -> Option<String> {
		(key.len() <= MAX_KEY_LEN).then(|| hex::encode(key.as_bytes()))
	}

	fn get_file_path(&self, key: &str) -> Option<PathBuf> {
		let name = Self::file_name(key)?;
		Some(
			self.base_path
				.join(format!("{}.{}", name, RECORD_EXTENSION)),
		)
	}

	/// TTL configured for the namespace part of `namespace:id`.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		key.split(':')
			.next()
			.and_then(|namespace| namespace.parse::<StorageKey>().ok())
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Paths of all record files whose name starts with `file_prefix`.
	async fn record_files(&self, file_prefix: &str) -> Result<Vec<PathBuf>, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut paths = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(OsStr::new(RECORD_EXTENSION)) {
				continue;
			}
			let matches_prefix = path
				.file_stem()
				.and_then(OsStr::to_str)
				.is_some_and(|stem| stem.starts_with(file_prefix));
			if matches_prefix {
				paths.push(path);
			}
		}
		Ok(paths)
	}

	async fn read_record(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(path).await {
			Ok(data) => decode_record(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let Some(path) = self.get_file_path(key) else {
			return Err(StorageError::NotFound);
		};
		Self::read_record(&path).await?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key).ok_or_else(|| {
			StorageError::Backend(format!("Key longer than {} bytes", MAX_KEY_LEN))
		})?;

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let header = FileHeader::new(ttl);

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		// Write to a temp file and rename so readers never see a partial record
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::debug!(key, path = %path.display(), "Wrote record");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let Some(path) = self.get_file_path(key) else {
			return Ok(());
		};
		match fs::remove_file(path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let Some(path) = self.get_file_path(key) else {
			return Ok(false);
		};
		Ok(Self::read_record(&path).await?.is_some())
	}

	async fn list_bytes(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StorageError> {
		let Some(file_prefix) = Self::file_name(prefix) else {
			return Ok(Vec::new());
		};
		let mut values = Vec::new();

		for path in self.record_files(&file_prefix).await? {
			match Self::read_record(&path).await {
				Ok(Some(value)) => values.push(value),
				Ok(None) => {},
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
				},
			}
		}
		Ok(values)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut removed = 0;

		for path in self.record_files("").await? {
			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping file");
					continue;
				},
			};

			let expired = FileHeader::deserialize(&data)
				.map(|header| header.is_expired())
				.unwrap_or(false);
			if !expired {
				continue;
			}

			match fs::remove_file(&path).await {
				Ok(()) => removed += 1,
				Err(e) => {
					tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired file");
				},
			}
		}

		Ok(removed)
	}
}

/// Settings accepted by the file backend.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let mut fields = vec![Field::new("storage_path", FieldType::String)
			.with_validator(|value| match value.as_str() {
				Some(path) if path.trim().is_empty() => {
					Err("storage_path cannot be empty".to_string())
				},
				_ => Ok(()),
			})];

		for storage_key in StorageKey::all() {
			fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: Some(MAX_TTL_SECONDS),
				},
			));
		}

		Schema::new(fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for record files (default: "./data/storage")
/// - `ttl_orders`: TTL in seconds for orders (default: 0, never expire)
/// - `ttl_sessions`: TTL in seconds for admin sessions when none is given (default: 0)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
