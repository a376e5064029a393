//! Admin endpoints: login, logout and the order dashboard.

use super::bearer_token;
use axum::http::HeaderMap;
use bakery_core::{AdminError, AdminGate, AdminSession, OrderBook};
use bakery_types::{APIError, AdminLoginRequest, AdminLoginResponse, DashboardResponse};
use tracing::warn;

fn admin_error(e: AdminError) -> APIError {
	match e {
		AdminError::MissingCredentials(message) => APIError::BadRequest {
			error_type: "MISSING_CREDENTIALS".to_string(),
			message: message.to_string(),
			details: None,
		},
		AdminError::InvalidCredentials => APIError::Unauthorized {
			error_type: "INVALID_CREDENTIALS".to_string(),
			message: e.to_string(),
		},
		AdminError::InvalidSession => APIError::Unauthorized {
			error_type: "UNAUTHORIZED".to_string(),
			message: "Admin login required".to_string(),
		},
		AdminError::SessionTtlOutOfRange(_) => {
			warn!(error = %e, "Cannot issue admin session");
			APIError::internal("Failed to create admin session")
		},
		AdminError::Storage(e) => {
			warn!(error = %e, "Admin session storage failed");
			APIError::internal("Failed to access admin session")
		},
	}
}

pub async fn login(
	request: AdminLoginRequest,
	gate: &AdminGate,
) -> Result<AdminLoginResponse, APIError> {
	gate.login(&request.username, &request.password)
		.await
		.map_err(admin_error)
}

/// Resolves the bearer token in `headers` to a live session.
pub async fn require_session(
	headers: &HeaderMap,
	gate: &AdminGate,
) -> Result<AdminSession, APIError> {
	let token = bearer_token(headers).ok_or_else(|| admin_error(AdminError::InvalidSession))?;
	gate.authorize(token).await.map_err(admin_error)
}

pub async fn logout(headers: &HeaderMap, gate: &AdminGate) -> Result<(), APIError> {
	let token = bearer_token(headers).ok_or_else(|| admin_error(AdminError::InvalidSession))?;
	gate.logout(token).await.map_err(admin_error)
}

/// Orders with totals, for an authenticated admin.
pub async fn dashboard(
	headers: &HeaderMap,
	gate: &AdminGate,
	orders: &OrderBook,
) -> Result<DashboardResponse, APIError> {
	let session = require_session(headers, gate).await?;
	tracing::debug!(username = %session.username, "Serving dashboard");

	orders.dashboard().await.map_err(|e| {
		warn!(error = %e, "Error building dashboard");
		APIError::internal("Failed to fetch orders")
	})
}
