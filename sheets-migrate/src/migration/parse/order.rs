use super::{
    ParseContext,
    text::{normalize_phone, parse_amount, parse_date},
};
use crate::migration::types::Order;

const DEFAULT_STATUS: &str = "訂單確認中";
const DEFAULT_PAYMENT_STATUS: &str = "未收費";

/// Fixed column positions of the orders sheet.
///
/// Orders are read positionally, unlike customers which go through a header
/// map. A column reorder in the orders sheet silently shifts every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderColumn {
    OrderTime = 0,
    CustomerName = 1,
    CustomerPhone = 2,
    Items = 3,
    TotalAmount = 4,
    DeliveryMethod = 5,
    CustomerAddress = 6,
    DueDate = 7,
    DeliveryTime = 8,
    PaymentMethod = 9,
    Notes = 10,
    Status = 11,
    PaymentStatus = 12,
}

impl OrderColumn {
    pub fn index(self) -> usize {
        self as usize
    }

    fn read(self, row: &[String]) -> &str {
        row.get(self.index()).map(|s| s.trim()).unwrap_or("")
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Parse one orders-sheet data row.
///
/// `row_index` is the 1-based position among data rows (header excluded) and
/// becomes both `google_sheet_id` and the `ORD-nnn` order number. Returns
/// `None` when the customer-name cell is empty or whitespace.
pub fn parse_order_row(row_index: i64, row: &[String], ctx: &ParseContext) -> Option<Order> {
    let customer_name = OrderColumn::CustomerName.read(row);
    if customer_name.is_empty() {
        return None;
    }

    Some(Order {
        order_number: format!("ORD-{:03}", row_index),
        customer_name: customer_name.to_string(),
        customer_phone: normalize_phone(OrderColumn::CustomerPhone.read(row)),
        delivery_method: OrderColumn::DeliveryMethod.read(row).to_string(),
        customer_address: OrderColumn::CustomerAddress.read(row).to_string(),
        due_date: parse_date(OrderColumn::DueDate.read(row)),
        delivery_time: OrderColumn::DeliveryTime.read(row).to_string(),
        notes: OrderColumn::Notes.read(row).to_string(),
        payment_method: OrderColumn::PaymentMethod.read(row).to_string(),
        status: or_default(OrderColumn::Status.read(row), DEFAULT_STATUS),
        payment_status: or_default(OrderColumn::PaymentStatus.read(row), DEFAULT_PAYMENT_STATUS),
        total_amount: parse_amount(OrderColumn::TotalAmount.read(row)),
        google_sheet_id: row_index,
        created_at: ctx.timestamp_or_now(OrderColumn::OrderTime.read(row)),
        items_text: OrderColumn::Items.read(row).to_string(),
    })
}
