//! Order endpoints: submit, list and look up order requests.

use bakery_core::{OrderBook, OrderError};
use bakery_types::{APIError, NewOrder, Order};
use tracing::warn;

/// Validates and stores a submitted order.
pub async fn create_order(request: NewOrder, orders: &OrderBook) -> Result<Order, APIError> {
	orders.create_order(request).await.map_err(|e| match e {
		OrderError::Validation(errors) => APIError::validation(&errors),
		OrderError::Storage(e) => {
			warn!(error = %e, "Error creating order");
			APIError::internal("Failed to create order")
		},
	})
}

/// Lists every order, newest first.
pub async fn list_orders(orders: &OrderBook) -> Result<Vec<Order>, APIError> {
	orders.get_all_orders().await.map_err(|e| {
		warn!(error = %e, "Error fetching orders");
		APIError::internal("Failed to fetch orders")
	})
}

/// Fetches a single order by id.
pub async fn get_order_by_id(id: &str, orders: &OrderBook) -> Result<Order, APIError> {
	match orders.get_order(id).await {
		Ok(Some(order)) => Ok(order),
		Ok(None) => Err(APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message: "Order not found".to_string(),
		}),
		Err(e) => {
			warn!(order_id = %id, error = %e, "Error fetching order");
			Err(APIError::internal("Failed to fetch order"))
		},
	}
}
