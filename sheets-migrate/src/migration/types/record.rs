//! Records produced by the row parser and written to the store

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One spreadsheet row: ordered string cells, positional not named
pub type SheetRow = Vec<String>;

/// A customer, identified by its digits-only phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    /// Normalized to ASCII digits only
    pub phone: String,
    pub address: String,
    pub delivery_method: String,
    pub contact_method: String,
    pub social_id: String,
    pub created_at: DateTime<Utc>,
}

/// An order, identified by the source row it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// "ORD-{row_index:03}"
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_method: String,
    pub customer_address: String,
    pub due_date: Option<NaiveDate>,
    pub delivery_time: String,
    pub notes: String,
    pub payment_method: String,
    pub status: String,
    pub payment_status: String,
    pub total_amount: f64,
    /// 1-based data row index in the orders sheet
    pub google_sheet_id: i64,
    pub created_at: DateTime<Utc>,
    /// Raw free-text item cell; parsed into `OrderItem`s, not stored on the order
    #[serde(skip)]
    pub items_text: String,
}

/// A line item, exclusively owned by one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

impl OrderItem {
    pub fn new(product_name: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        let quantity = quantity.max(1);
        let unit_price = unit_price.max(0.0);
        Self {
            order_id: None,
            product_name: product_name.into(),
            quantity,
            unit_price,
            total_price: round_money(unit_price * quantity as f64),
        }
    }

    /// Attach the owning order, consuming the item
    pub fn owned_by(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

/// Round a money amount to 2 decimals
pub(crate) fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serialize a record into a store row (snake_case column names)
fn to_row<T: Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl Customer {
    pub fn to_row(&self) -> Map<String, Value> {
        to_row(self)
    }
}

impl Order {
    pub fn to_row(&self) -> Map<String, Value> {
        to_row(self)
    }
}

impl OrderItem {
    pub fn to_row(&self) -> Map<String, Value> {
        to_row(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_floors_and_subtotal() {
        let item = OrderItem::new("芋頭粿", 0, -5.0);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, 0.0);
        assert_eq!(item.total_price, 0.0);

        let item = OrderItem::new("原味蘿蔔糕", 3, 120.5);
        assert_eq!(item.total_price, 361.5);
    }

    #[test]
    fn test_order_row_omits_items_text() {
        let order = Order {
            order_number: "ORD-001".to_string(),
            customer_name: "王小明".to_string(),
            customer_phone: "0912345678".to_string(),
            delivery_method: String::new(),
            customer_address: String::new(),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            delivery_time: String::new(),
            notes: String::new(),
            payment_method: String::new(),
            status: "訂單確認中".to_string(),
            payment_status: "未收費".to_string(),
            total_amount: 350.0,
            google_sheet_id: 1,
            created_at: Utc::now(),
            items_text: "芋頭粿 x1".to_string(),
        };

        let row = order.to_row();
        assert!(!row.contains_key("items_text"));
        assert_eq!(row["google_sheet_id"], Value::from(1));
        assert_eq!(row["due_date"], Value::from("2024-02-01"));
    }
}
