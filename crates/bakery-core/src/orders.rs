//! Order book: validation, persistence and retrieval of order requests.

use bakery_storage::{StorageError, StorageService};
use bakery_types::{DashboardResponse, FieldError, NewOrder, Order, StorageKey};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Validation error: {}", FieldError::join(.0))]
	Validation(Vec<FieldError>),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Creates, lists and looks up orders.
///
/// Orders are written once with status `pending` and never modified.
#[derive(Clone)]
pub struct OrderBook {
	storage: Arc<StorageService>,
}

impl OrderBook {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Validates a request and stores it as a new pending order.
	///
	/// Nothing is written when validation fails.
	#[instrument(skip_all)]
	pub async fn create_order(&self, request: NewOrder) -> Result<Order, OrderError> {
		request.check().map_err(OrderError::Validation)?;

		let order = Order::new(Uuid::new_v4().to_string(), request, Utc::now());
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, &order)
			.await?;

		tracing::info!(
			order_id = %order.id,
			items = %order.summary(),
			total = order.total(),
			"Order received"
		);
		Ok(order)
	}

	/// Returns every order, newest first.
	pub async fn get_all_orders(&self) -> Result<Vec<Order>, OrderError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await?;

		orders.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| a.id.cmp(&b.id))
		});
		Ok(orders)
	}

	/// Looks up a single order; `None` if no order has that id.
	pub async fn get_order(&self, id: &str) -> Result<Option<Order>, OrderError> {
		match self
			.storage
			.retrieve::<Order>(StorageKey::Orders.as_str(), id)
			.await
		{
			Ok(order) => Ok(Some(order)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// All orders with per-row totals and overall counts.
	pub async fn dashboard(&self) -> Result<DashboardResponse, OrderError> {
		let orders = self.get_all_orders().await?;
		Ok(DashboardResponse::from_orders(orders))
	}
}
