//! HTTP server for the bakery API.
//!
//! Order submission and lookup live under `/api/orders`, the admin login and
//! dashboard under `/api/admin`, and a liveness probe at `/health`.

use axum::{
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
	http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use bakery_config::CorsConfig;
use bakery_core::Bakery;
use bakery_types::{
	APIError, AdminLoginRequest, AdminLoginResponse, DashboardResponse, NewOrder, Order,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, Any, CorsLayer},
	trace::TraceLayer,
};

use crate::apis;

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("Invalid CORS configuration: {0}")]
	Cors(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub bakery: Arc<Bakery>,
}

/// Builds the router with every route, the body limit, CORS and request
/// tracing.
pub fn build_router(bakery: Arc<Bakery>) -> Result<Router, ServerError> {
	let api_config = &bakery.config().api;
	let cors = cors_layer(api_config.cors.as_ref())?;
	let body_limit = DefaultBodyLimit::max(api_config.max_request_size);

	let app = Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/orders", get(handle_list_orders).post(handle_create_order))
				.route("/orders/{id}", get(handle_get_order_by_id))
				.route("/admin/login", post(handle_admin_login))
				.route("/admin/logout", post(handle_admin_logout))
				.route("/admin/dashboard", get(handle_dashboard)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors)
				.layer(body_limit),
		)
		.with_state(AppState { bakery });

	Ok(app)
}

fn cors_layer(config: Option<&CorsConfig>) -> Result<CorsLayer, ServerError> {
	let Some(config) = config else {
		return Ok(CorsLayer::permissive());
	};

	let mut layer = CorsLayer::new();

	layer = if config.allowed_origins.is_empty() {
		layer.allow_origin(Any)
	} else {
		let origins = config
			.allowed_origins
			.iter()
			.map(|origin| {
				origin
					.parse::<HeaderValue>()
					.map_err(|_| ServerError::Cors(format!("invalid origin '{}'", origin)))
			})
			.collect::<Result<Vec<_>, _>>()?;
		layer.allow_origin(AllowOrigin::list(origins))
	};

	let methods = if config.allowed_methods.is_empty() {
		vec![Method::GET, Method::POST, Method::OPTIONS]
	} else {
		config
			.allowed_methods
			.iter()
			.map(|method| {
				Method::from_bytes(method.to_ascii_uppercase().as_bytes())
					.map_err(|_| ServerError::Cors(format!("invalid method '{}'", method)))
			})
			.collect::<Result<Vec<_>, _>>()?
	};
	layer = layer.allow_methods(methods);

	let headers = if config.allowed_headers.is_empty() {
		vec![
			axum::http::header::CONTENT_TYPE,
			axum::http::header::AUTHORIZATION,
		]
	} else {
		config
			.allowed_headers
			.iter()
			.map(|header| {
				HeaderName::from_bytes(header.as_bytes())
					.map_err(|_| ServerError::Cors(format!("invalid header '{}'", header)))
			})
			.collect::<Result<Vec<_>, _>>()?
	};

	Ok(layer.allow_headers(headers))
}

/// Starts the HTTP server and serves until a shutdown signal arrives.
pub async fn start_server(bakery: Arc<Bakery>) -> Result<(), ServerError> {
	let bind_address = format!(
		"{}:{}",
		bakery.config().api.host,
		bakery.config().api.port
	);
	let app = build_router(bakery)?;

	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Bakery API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("Bakery API server stopped");
	Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{signal, SignalKind};

		match signal(SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			},
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown signal received, draining connections");
}

async fn handle_health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<impl IntoResponse, APIError> {
	let Json(request) = payload.map_err(|rejection| {
		tracing::warn!("Rejected order body: {}", rejection.body_text());
		apis::json_rejection(rejection)
	})?;

	match apis::order::create_order(request, state.bakery.orders()).await {
		Ok(order) => Ok((StatusCode::CREATED, Json(order))),
		Err(e) => {
			tracing::warn!("Order submission failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/orders requests.
async fn handle_list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, APIError> {
	apis::order::list_orders(state.bakery.orders()).await.map(Json)
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, APIError> {
	match apis::order::get_order_by_id(&id, state.bakery.orders()).await {
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::debug!(order_id = %id, "Order retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/admin/login requests.
async fn handle_admin_login(
	State(state): State<AppState>,
	payload: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Result<Json<AdminLoginResponse>, APIError> {
	let Json(request) = payload.map_err(apis::json_rejection)?;

	match apis::admin::login(request, state.bakery.admin()).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Admin login failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/admin/logout requests.
async fn handle_admin_logout(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<StatusCode, APIError> {
	apis::admin::logout(&headers, state.bakery.admin()).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles GET /api/admin/dashboard requests.
async fn handle_dashboard(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<DashboardResponse>, APIError> {
	apis::admin::dashboard(&headers, state.bakery.admin(), state.bakery.orders())
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{
		body::{to_bytes, Body},
		http::{header, Request},
		response::Response,
	};
	use bakery_config::Config;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn app_with(extra: &str) -> Router {
		let config: Config = format!(
			"[storage]\nprimary = \"memory\"\n[storage.implementations.memory]\n{}",
			extra
		)
		.parse()
		.unwrap();
		let bakery = crate::factory_registry::build_bakery_from_config(config).unwrap();
		build_router(Arc::new(bakery)).unwrap()
	}

	fn app() -> Router {
		app_with("")
	}

	fn file_app(dir: &tempfile::TempDir) -> Router {
		let config: Config = format!(
			"[storage]\nprimary = \"file\"\n[storage.implementations.file]\nstorage_path = {:?}\n",
			dir.path().display().to_string()
		)
		.parse()
		.unwrap();
		let bakery = crate::factory_registry::build_bakery_from_config(config).unwrap();
		build_router(Arc::new(bakery)).unwrap()
	}

	fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
		Request::builder()
			.method(method)
			.uri(uri)
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
		let mut builder = Request::builder().method("GET").uri(uri);
		if let Some(token) = token {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
		}
		builder.body(Body::empty()).unwrap()
	}

	async fn body_json(response: Response) -> Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	fn valid_order() -> Value {
		json!({
			"name": "Grace",
			"email": "grace@example.com",
			"phone": "876-555-0100",
			"cakeQuantity": 2,
			"sorrelQuantity": 1,
			"specialRequests": "Extra ginger"
		})
	}

	async fn login(app: &Router) -> String {
		let response = app
			.clone()
			.oneshot(json_request(
				"POST",
				"/api/admin/login",
				json!({ "username": "admin", "password": "password" }),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		body_json(response).await["token"]
			.as_str()
			.unwrap()
			.to_string()
	}

	#[tokio::test]
	async fn test_health() {
		let response = app().oneshot(get_request("/health", None)).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_json(response).await, json!({ "status": "ok" }));
	}

	#[tokio::test]
	async fn test_create_and_fetch_order() {
		let app = app();

		let response = app
			.clone()
			.oneshot(json_request("POST", "/api/orders", valid_order()))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::CREATED);
		let created = body_json(response).await;
		assert_eq!(created["status"], "pending");
		assert_eq!(created["cakeQuantity"], 2);
		assert!(created["createdAt"].is_string());

		let id = created["id"].as_str().unwrap();
		let response = app
			.clone()
			.oneshot(get_request(&format!("/api/orders/{}", id), None))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_json(response).await, created);

		let response = app
			.oneshot(get_request("/api/orders", None))
			.await
			.unwrap();
		let list = body_json(response).await;
		assert_eq!(list.as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_invalid_order_rejected() {
		let mut body = valid_order();
		body["email"] = json!("not-an-email");
		body["cakeQuantity"] = json!(0);
		body["sorrelQuantity"] = json!(0);

		let app = app();
		let response = app
			.clone()
			.oneshot(json_request("POST", "/api/orders", body))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let error = body_json(response).await;
		assert_eq!(error["error"], "VALIDATION_ERROR");
		assert_eq!(error["details"][0]["field"], "email");
		assert_eq!(error["details"][1]["field"], "products");

		let response = app
			.oneshot(get_request("/api/orders", None))
			.await
			.unwrap();
		assert_eq!(body_json(response).await, json!([]));
	}

	#[tokio::test]
	async fn test_malformed_json_is_bad_request() {
		let request = Request::builder()
			.method("POST")
			.uri("/api/orders")
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from("{\"name\": "))
			.unwrap();

		let response = app().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
	}

	#[tokio::test]
	async fn test_unknown_order_not_found() {
		let response = app()
			.oneshot(get_request("/api/orders/missing", None))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(body_json(response).await["message"], "Order not found");
	}

	#[tokio::test]
	async fn test_file_backend_odd_order_ids_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let app = file_app(&dir);

		let long_id = format!("/api/orders/{}", "a".repeat(300));
		for uri in [long_id.as_str(), "/api/orders/abc%00def", "/api/orders/..%2Fsecret"] {
			let response = app.clone().oneshot(get_request(uri, None)).await.unwrap();
			assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
		}

		let response = app
			.clone()
			.oneshot(json_request("POST", "/api/orders", valid_order()))
			.await
			.unwrap();
		let id = body_json(response).await["id"].as_str().unwrap().to_string();
		let response = app
			.oneshot(get_request(&format!("/api/orders/{}", id), None))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_file_backend_odd_tokens_unauthorized() {
		let dir = tempfile::tempdir().unwrap();
		let app = file_app(&dir);

		let long_token = "t".repeat(300);
		for token in [long_token.as_str(), "..%2F..%2Fx"] {
			let response = app
				.clone()
				.oneshot(get_request("/api/admin/dashboard", Some(token)))
				.await
				.unwrap();
			assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		}

		let token = login(&app).await;
		let response = app
			.oneshot(get_request("/api/admin/dashboard", Some(&token)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_wrong_method_lists_allowed() {
		let request = Request::builder()
			.method("DELETE")
			.uri("/api/orders")
			.body(Body::empty())
			.unwrap();

		let response = app().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
		let allow = response.headers()[header::ALLOW].to_str().unwrap();
		assert!(allow.contains("GET"));
		assert!(allow.contains("POST"));
	}

	#[tokio::test]
	async fn test_oversized_body_rejected() {
		let mut body = valid_order();
		body["specialRequests"] = json!("x".repeat(2048));

		let response = app_with("[api]\nmax_request_size = 512\n")
			.oneshot(json_request("POST", "/api/orders", body))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[tokio::test]
	async fn test_dashboard_requires_login() {
		let response = app()
			.oneshot(get_request("/api/admin/dashboard", None))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

		let response = app()
			.oneshot(get_request("/api/admin/dashboard", Some("bogus")))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn test_admin_login_errors() {
		let app = app();

		let response = app
			.clone()
			.oneshot(json_request(
				"POST",
				"/api/admin/login",
				json!({ "username": "admin", "password": "wrong" }),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(body_json(response).await["error"], "INVALID_CREDENTIALS");

		let response = app
			.oneshot(json_request(
				"POST",
				"/api/admin/login",
				json!({ "username": "admin" }),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(body_json(response).await["message"], "Password is required");
	}

	#[tokio::test]
	async fn test_dashboard_and_logout() {
		let app = app();
		app.clone()
			.oneshot(json_request("POST", "/api/orders", valid_order()))
			.await
			.unwrap();

		let token = login(&app).await;
		let response = app
			.clone()
			.oneshot(get_request("/api/admin/dashboard", Some(&token)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let dashboard = body_json(response).await;
		assert_eq!(dashboard["orders"][0]["total"], 35);
		assert_eq!(dashboard["summary"]["orderCount"], 1);
		assert_eq!(dashboard["summary"]["revenue"], 35);

		let logout = Request::builder()
			.method("POST")
			.uri("/api/admin/logout")
			.header(header::AUTHORIZATION, format!("Bearer {}", token))
			.body(Body::empty())
			.unwrap();
		let response = app.clone().oneshot(logout).await.unwrap();
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = app
			.oneshot(get_request("/api/admin/dashboard", Some(&token)))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	}

	#[test]
	fn test_invalid_cors_origin() {
		let config = CorsConfig {
			allowed_origins: vec!["bad\norigin".to_string()],
			..CorsConfig::default()
		};
		assert!(matches!(
			cors_layer(Some(&config)),
			Err(ServerError::Cors(_))
		));
	}
}
