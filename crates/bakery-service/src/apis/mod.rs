//! Request processing behind the HTTP handlers.
//!
//! Handlers in `server` stay thin: they extract the request and hand it to
//! the functions here, which talk to the core services and translate their
//! errors into [`APIError`]s.

pub mod admin;
pub mod order;

use axum::{
	extract::rejection::JsonRejection,
	http::{header::AUTHORIZATION, HeaderMap, StatusCode},
};
use bakery_types::APIError;

/// Turns a failed JSON extraction into the API's error body.
pub fn json_rejection(rejection: JsonRejection) -> APIError {
	if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
		return APIError::PayloadTooLarge {
			message: "Request body is too large".to_string(),
		};
	}

	APIError::BadRequest {
		error_type: "VALIDATION_ERROR".to_string(),
		message: format!("Validation error: {}", rejection.body_text()),
		details: None,
	}
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.split_once(' ')?;
	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}
	let token = token.trim();
	(!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn headers(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(AUTHORIZATION, value.parse().unwrap());
		headers
	}

	#[test]
	fn test_bearer_token() {
		assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
		assert_eq!(bearer_token(&headers("bearer  abc123 ")), Some("abc123"));
		assert_eq!(bearer_token(&headers("Basic abc123")), None);
		assert_eq!(bearer_token(&headers("Bearer ")), None);
		assert_eq!(bearer_token(&HeaderMap::new()), None);
	}
}
