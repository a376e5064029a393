//! API types for the bakery HTTP API.
//!
//! This module defines the request and response bodies for the order and
//! admin endpoints, and the structured error type every handler returns.

use crate::{FieldError, Order};
use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Missing or rejected credentials (401)
	Unauthorized { error_type: String, message: String },
	/// Requested resource does not exist (404)
	NotFound { error_type: String, message: String },
	/// Body exceeds the configured size limit (413)
	PayloadTooLarge { message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Builds the 400 returned when an order request breaks one or more rules.
	pub fn validation(errors: &[FieldError]) -> Self {
		APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message: format!("Validation error: {}", FieldError::join(errors)),
			details: serde_json::to_value(errors).ok(),
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			APIError::PayloadTooLarge { message } => ErrorResponse {
				error: "PAYLOAD_TOO_LARGE".to_string(),
				message: message.clone(),
				details: None,
			},
			APIError::Unauthorized {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthorized { message, .. } => write!(f, "Unauthorized: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::PayloadTooLarge { message } => write!(f, "Payload Too Large: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

/// Credentials posted to the admin login endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminLoginRequest {
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub password: String,
}

/// Session issued after a successful admin login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoginResponse {
	/// Bearer token for subsequent admin requests.
	pub token: String,
	/// When the session stops being accepted.
	pub expires_at: DateTime<Utc>,
}

/// An order row on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOrder {
	#[serde(flatten)]
	pub order: Order,
	/// Display total for the row.
	pub total: u64,
}

impl From<Order> for DashboardOrder {
	fn from(order: Order) -> Self {
		let total = order.total();
		Self { order, total }
	}
}

/// Aggregates shown above the order table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
	pub order_count: usize,
	pub cake_count: u64,
	pub sorrel_count: u64,
	pub revenue: u64,
}

/// Response for GET /api/admin/dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
	pub orders: Vec<DashboardOrder>,
	pub summary: DashboardSummary,
}

impl DashboardResponse {
	/// Builds the dashboard from orders already sorted for display.
	pub fn from_orders(orders: Vec<Order>) -> Self {
		let summary = orders
			.iter()
			.fold(DashboardSummary::default(), |mut acc, order| {
				acc.order_count += 1;
				acc.cake_count += u64::from(order.cake_quantity);
				acc.sorrel_count += u64::from(order.sorrel_quantity);
				acc.revenue += order.total();
				acc
			});

		Self {
			orders: orders.into_iter().map(DashboardOrder::from).collect(),
			summary,
		}
	}
}
