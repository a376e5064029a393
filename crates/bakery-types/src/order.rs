//! Order types for the bakery.
//!
//! An order request names quantities of the two products the bakery sells
//! together with the customer's contact details. Requests arrive as
//! [`NewOrder`] and are persisted as [`Order`] once the server has assigned
//! an id, a timestamp and the initial status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationErrors};

/// Products offered on the order form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
	Cake,
	Sorrel,
}

impl Product {
	/// Price of a single unit in whole currency units.
	pub const fn unit_price(self) -> u64 {
		match self {
			Product::Cake => 15,
			Product::Sorrel => 5,
		}
	}

	/// Display label used in confirmations and on the dashboard.
	pub const fn label(self) -> &'static str {
		match self {
			Product::Cake => "Cake",
			Product::Sorrel => "Sorrel",
		}
	}

	/// Returns an iterator over all products in display order.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Cake, Self::Sorrel].into_iter()
	}
}

/// Lifecycle status of an order.
///
/// Orders are written once and never transition, so `Pending` is the only
/// status the service ever assigns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	#[default]
	Pending,
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => write!(f, "pending"),
		}
	}
}

/// A single failed validation rule, tagged with the field it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
	/// Path of the offending field (`name`, `email`, `phone`, `products`).
	pub field: String,
	/// Human-readable message suitable for showing next to the field.
	pub message: String,
}

impl FieldError {
	pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			message: message.into(),
		}
	}

	/// Joins errors into a single line, e.g.
	/// `Name must be at least 2 characters. at "name"; ...`.
	pub fn join(errors: &[FieldError]) -> String {
		errors
			.iter()
			.map(|e| format!("{} at \"{}\"", e.message, e.field))
			.collect::<Vec<_>>()
			.join("; ")
	}

	fn from_validation(errors: &ValidationErrors) -> Vec<FieldError> {
		let mut out = Vec::new();
		for (field, errs) in errors.field_errors() {
			let field = field.to_string();
			for err in errs.iter() {
				let message = err
					.message
					.as_ref()
					.map(|m| m.to_string())
					.unwrap_or_else(|| err.code.to_string());
				out.push(FieldError::new(field.clone(), message));
			}
		}
		out
	}

	fn rank(&self) -> usize {
		NewOrder::FIELD_ORDER
			.iter()
			.position(|f| *f == self.field)
			.unwrap_or(NewOrder::FIELD_ORDER.len())
	}
}

/// Order request as submitted by a customer.
///
/// Quantities are unsigned so negative values are rejected while the JSON
/// body is decoded; the remaining rules are checked by [`NewOrder::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
	#[validate(length(min = 2, message = "Name must be at least 2 characters."))]
	pub name: String,
	#[validate(email(message = "Please enter a valid email address."))]
	pub email: String,
	#[validate(length(min = 10, message = "Please enter a valid phone number."))]
	pub phone: String,
	#[serde(default)]
	pub cake_quantity: u32,
	#[serde(default)]
	pub sorrel_quantity: u32,
	#[serde(default)]
	pub special_requests: String,
}

impl NewOrder {
	const FIELD_ORDER: [&'static str; 4] = ["name", "email", "phone", "products"];

	/// True when at least one product has a non-zero quantity.
	pub fn has_items(&self) -> bool {
		self.cake_quantity > 0 || self.sorrel_quantity > 0
	}

	/// Checks every rule and reports all failures at once, in form order.
	pub fn check(&self) -> Result<(), Vec<FieldError>> {
		let mut errors = match self.validate() {
			Ok(()) => Vec::new(),
			Err(e) => FieldError::from_validation(&e),
		};

		if !self.has_items() {
			errors.push(FieldError::new(
				"products",
				"You must order at least one item.",
			));
		}

		if errors.is_empty() {
			return Ok(());
		}

		errors.sort_by_key(FieldError::rank);
		Err(errors)
	}
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	pub id: String,
	pub name: String,
	pub email: String,
	pub phone: String,
	pub cake_quantity: u32,
	pub sorrel_quantity: u32,
	#[serde(default)]
	pub special_requests: String,
	#[serde(default)]
	pub status: OrderStatus,
	pub created_at: DateTime<Utc>,
}

impl Order {
	/// Builds a pending order from an accepted request.
	pub fn new(id: impl Into<String>, request: NewOrder, created_at: DateTime<Utc>) -> Self {
		Self {
			id: id.into(),
			name: request.name,
			email: request.email,
			phone: request.phone,
			cake_quantity: request.cake_quantity,
			sorrel_quantity: request.sorrel_quantity,
			special_requests: request.special_requests,
			status: OrderStatus::Pending,
			created_at,
		}
	}

	/// Quantity ordered for a product.
	pub fn quantity(&self, product: Product) -> u32 {
		match product {
			Product::Cake => self.cake_quantity,
			Product::Sorrel => self.sorrel_quantity,
		}
	}

	/// Products with a non-zero quantity.
	pub fn line_items(&self) -> Vec<(Product, u32)> {
		Product::all()
			.map(|p| (p, self.quantity(p)))
			.filter(|(_, qty)| *qty > 0)
			.collect()
	}

	/// Display total: quantity times unit price, summed over products.
	pub fn total(&self) -> u64 {
		Product::all()
			.map(|p| u64::from(self.quantity(p)) * p.unit_price())
			.sum()
	}

	/// Confirmation text such as `2 Cake(s) and 1 Sorrel`.
	pub fn summary(&self) -> String {
		self.line_items()
			.into_iter()
			.map(|(product, qty)| match product {
				Product::Cake => format!("{} {}(s)", qty, product.label()),
				Product::Sorrel => format!("{} {}", qty, product.label()),
			})
			.collect::<Vec<_>>()
			.join(" and ")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request() -> NewOrder {
		NewOrder {
			name: "Ada Lovelace".to_string(),
			email: "ada@example.com".to_string(),
			phone: "8765551234".to_string(),
			cake_quantity: 2,
			sorrel_quantity: 1,
			special_requests: String::new(),
		}
	}

	#[test]
	fn test_valid_request_passes() {
		assert!(request().check().is_ok());
	}

	#[test]
	fn test_all_failures_reported_in_form_order() {
		let bad = NewOrder {
			name: "A".to_string(),
			email: "not-an-email".to_string(),
			phone: "123".to_string(),
			cake_quantity: 0,
			sorrel_quantity: 0,
			special_requests: String::new(),
		};

		let errors = bad.check().unwrap_err();
		let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
		assert_eq!(fields, vec!["name", "email", "phone", "products"]);
		assert_eq!(errors[0].message, "Name must be at least 2 characters.");
		assert_eq!(errors[3].message, "You must order at least one item.");
	}

	#[test]
	fn test_length_counts_characters() {
		let mut order = request();
		order.name = "Zoë".to_string();
		assert!(order.check().is_ok());

		order.name = "é".to_string();
		assert!(order.check().is_err());
	}

	#[test]
	fn test_single_product_is_enough() {
		let mut order = request();
		order.cake_quantity = 0;
		assert!(order.check().is_ok());
	}

	#[test]
	fn test_defaults_when_fields_omitted() {
		let json = r#"{"name":"Bo","email":"bo@example.com","phone":"0123456789","cakeQuantity":1}"#;
		let order: NewOrder = serde_json::from_str(json).unwrap();
		assert_eq!(order.sorrel_quantity, 0);
		assert_eq!(order.special_requests, "");
	}

	#[test]
	fn test_negative_quantity_rejected_on_decode() {
		let json = r#"{"name":"Bo","email":"bo@example.com","phone":"0123456789","cakeQuantity":-1}"#;
		assert!(serde_json::from_str::<NewOrder>(json).is_err());
	}

	#[test]
	fn test_total_and_summary() {
		let order = Order::new("abc", request(), Utc::now());
		assert_eq!(order.total(), 2 * 15 + 5);
		assert_eq!(order.summary(), "2 Cake(s) and 1 Sorrel");
		assert_eq!(order.status, OrderStatus::Pending);

		let mut only_sorrel = order.clone();
		only_sorrel.cake_quantity = 0;
		only_sorrel.sorrel_quantity = 4;
		assert_eq!(only_sorrel.summary(), "4 Sorrel");
		assert_eq!(only_sorrel.total(), 20);
	}

	#[test]
	fn test_total_does_not_overflow() {
		let mut order = Order::new("big", request(), Utc::now());
		order.cake_quantity = u32::MAX;
		order.sorrel_quantity = u32::MAX;
		assert_eq!(order.total(), u64::from(u32::MAX) * 20);
	}

	#[test]
	fn test_order_json_shape() {
		let order = Order::new("abc", request(), Utc::now());
		let value = serde_json::to_value(&order).unwrap();
		assert_eq!(value["cakeQuantity"], 2);
		assert_eq!(value["sorrelQuantity"], 1);
		assert_eq!(value["status"], "pending");
		assert!(value["createdAt"].is_string());
		assert!(value.get("specialRequests").is_some());
	}
}
