//! Admin access: a static username/password check that hands out
//! short-lived session tokens for the dashboard.

use bakery_config::AdminConfig;
use bakery_storage::{StorageError, StorageService};
use bakery_types::{AdminLoginResponse, SecretString, StorageKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AdminError {
	#[error("{0}")]
	MissingCredentials(&'static str),
	#[error("Invalid username or password.")]
	InvalidCredentials,
	#[error("Session is missing or expired")]
	InvalidSession,
	#[error("Session lifetime of {0:?} is out of range")]
	SessionTtlOutOfRange(Duration),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Persisted state of a logged-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
	pub username: String,
	pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AdminGate {
	storage: Arc<StorageService>,
	username: String,
	password: SecretString,
	session_ttl: Duration,
}

impl AdminGate {
	pub fn new(storage: Arc<StorageService>, config: &AdminConfig) -> Self {
		Self {
			storage,
			username: config.username.clone(),
			password: config.password.clone(),
			session_ttl: Duration::from_secs(config.session_ttl_seconds),
		}
	}

	/// Checks the credentials and opens a session on success.
	pub async fn login(
		&self,
		username: &str,
		password: &str,
	) -> Result<AdminLoginResponse, AdminError> {
		if username.is_empty() {
			return Err(AdminError::MissingCredentials("Username is required"));
		}
		if password.is_empty() {
			return Err(AdminError::MissingCredentials("Password is required"));
		}

		// Evaluate both so the response time does not reveal which one failed
		let user_ok = username == self.username;
		let password_ok = self.password.matches(password);
		if !(user_ok && password_ok) {
			tracing::warn!("Rejected admin login");
			return Err(AdminError::InvalidCredentials);
		}

		let expires_at = chrono::Duration::from_std(self.session_ttl)
			.ok()
			.and_then(|ttl| Utc::now().checked_add_signed(ttl))
			.ok_or(AdminError::SessionTtlOutOfRange(self.session_ttl))?;

		let token = SecretString::new(Uuid::new_v4().simple().to_string());
		let session = AdminSession {
			username: self.username.clone(),
			expires_at,
		};

		self.storage
			.store_with_ttl(
				StorageKey::Sessions.as_str(),
				token.expose_secret(),
				&session,
				Some(self.session_ttl),
			)
			.await?;

		tracing::info!(username = %session.username, "Admin logged in");
		Ok(AdminLoginResponse {
			token: token.expose_secret().to_string(),
			expires_at: session.expires_at,
		})
	}

	/// Returns the session for a token if it is still valid.
	pub async fn authorize(&self, token: &str) -> Result<AdminSession, AdminError> {
		if token.is_empty() {
			return Err(AdminError::InvalidSession);
		}

		let session: AdminSession = match self
			.storage
			.retrieve(StorageKey::Sessions.as_str(), token)
			.await
		{
			Ok(session) => session,
			Err(StorageError::NotFound) => return Err(AdminError::InvalidSession),
			Err(e) => return Err(e.into()),
		};

		if session.expires_at <= Utc::now() {
			return Err(AdminError::InvalidSession);
		}
		Ok(session)
	}

	/// Ends a session. Unknown tokens are ignored.
	pub async fn logout(&self, token: &str) -> Result<(), AdminError> {
		self.storage
			.remove(StorageKey::Sessions.as_str(), token)
			.await?;
		Ok(())
	}
}
