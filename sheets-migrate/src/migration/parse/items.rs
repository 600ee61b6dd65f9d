//! Free-text item lists such as "原味蘿蔔糕 x 2, 芋頭粿 x1 350"

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::text::{extract_number, normalize_fullwidth, parse_quantity};
use crate::migration::types::{OrderItem, round_money};

static ENTRY_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，、\n]").expect("valid separator regex"));

static QUANTITY_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[xX×]\s*").expect("valid marker regex"));

/// Product catalog: exact product name -> unit price
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    prices: HashMap<String, f64>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, price: f64) {
        self.prices.insert(name.into().trim().to_string(), price);
    }

    /// Price for an exact (trimmed) name; zero prices count as missing
    pub fn price(&self, name: &str) -> Option<f64> {
        self.prices.get(name.trim()).copied().filter(|p| *p > 0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, f64)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for (name, price) in iter {
            catalog.insert(name, price);
        }
        catalog
    }
}

struct ParsedEntry {
    name: String,
    quantity: u32,
    price: Option<f64>,
}

/// Split an entry into (name, tail) at its quantity marker.
///
/// The last marker followed by a digit wins ("XO醬 x2" keeps the X in the
/// name). Failing that, the last marker with whitespace next to it is used so
/// "蘿蔔糕 x abc" still splits. A bare "Max奶茶" has no marker at all.
fn split_entry(entry: &str) -> (&str, &str) {
    let markers: Vec<_> = QUANTITY_MARKER_RE.find_iter(entry).collect();

    let before_digit = markers.iter().rev().find(|m| {
        entry[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    });
    let spaced = || {
        markers.iter().rev().find(|m| {
            let text = m.as_str();
            (text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace))
                && !entry[m.end()..].trim().is_empty()
        })
    };

    match before_digit.or_else(spaced) {
        Some(m) => (&entry[..m.start()], &entry[m.end()..]),
        None => (entry, ""),
    }
}

fn parse_entry(entry: &str, catalog: &Catalog) -> Option<ParsedEntry> {
    let (name, tail) = split_entry(entry);
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut parts = tail.split_whitespace();
    let quantity = parts.next().map(parse_quantity).unwrap_or(1);
    let explicit = parts.next().and_then(extract_number).filter(|p| *p > 0.0);

    Some(ParsedEntry {
        name: name.to_string(),
        quantity,
        price: explicit.or_else(|| catalog.price(name)),
    })
}

/// Parse a free-text item list into order items.
///
/// Unit price precedence: explicit price in the entry, catalog match by exact
/// name, an even share of what remains of `order_total` after the priced
/// items (split by quantity), then zero.
pub fn parse_items_string(raw: &str, catalog: &Catalog, order_total: f64) -> Vec<OrderItem> {
    let normalized = normalize_fullwidth(raw);
    let entries: Vec<ParsedEntry> = ENTRY_SEPARATOR_RE
        .split(&normalized)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .filter_map(|e| parse_entry(e, catalog))
        .collect();

    let priced_total: f64 = entries
        .iter()
        .filter_map(|e| e.price.map(|p| p * e.quantity as f64))
        .sum();
    let unpriced_quantity: f64 = entries
        .iter()
        .filter(|e| e.price.is_none())
        .map(|e| e.quantity as f64)
        .sum();

    let apportioned = if unpriced_quantity > 0.0 && order_total > 0.0 {
        round_money((order_total - priced_total).max(0.0) / unpriced_quantity)
    } else {
        0.0
    };

    entries
        .into_iter()
        .map(|e| OrderItem::new(e.name, e.quantity, e.price.unwrap_or(apportioned)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        [("原味蘿蔔糕".to_string(), 300.0), ("港式蘿蔔糕".to_string(), 0.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_catalog_and_explicit_prices() {
        let items = parse_items_string("原味蘿蔔糕 x 2, 芋頭粿 x1 350", &catalog(), 0.0);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].product_name, "原味蘿蔔糕");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].unit_price, 300.0);
        assert_eq!(items[0].total_price, 600.0);

        assert_eq!(items[1].product_name, "芋頭粿");
        assert_eq!(items[1].quantity, 1);
        assert_eq!(items[1].unit_price, 350.0);
        assert_eq!(items[1].total_price, 350.0);
    }

    #[test]
    fn test_apportion_remaining_total() {
        let items = parse_items_string("原味蘿蔔糕 x 2, 芋頭粿 x1 350", &Catalog::new(), 950.0);
        assert_eq!(items[0].unit_price, 300.0);
        assert_eq!(items[1].unit_price, 350.0);
    }

    #[test]
    fn test_apportion_by_quantity() {
        let items = parse_items_string("A x2、B x1", &Catalog::new(), 300.0);
        assert_eq!(items[0].unit_price, 100.0);
        assert_eq!(items[0].total_price, 200.0);
        assert_eq!(items[1].unit_price, 100.0);
    }

    #[test]
    fn test_zero_catalog_price_is_missing() {
        let items = parse_items_string("港式蘿蔔糕 x1", &catalog(), 0.0);
        assert_eq!(items[0].unit_price, 0.0);
        let items = parse_items_string("港式蘿蔔糕 x1", &catalog(), 280.0);
        assert_eq!(items[0].unit_price, 280.0);
    }

    #[test]
    fn test_separators_and_fullwidth() {
        let items = parse_items_string("蘿蔔糕 × ２\n芋頭粿X3，年糕", &Catalog::new(), 0.0);
        let summary: Vec<_> = items
            .iter()
            .map(|i| (i.product_name.as_str(), i.quantity))
            .collect();
        assert_eq!(summary, vec![("蘿蔔糕", 2), ("芋頭粿", 3), ("年糕", 1)]);
    }

    #[test]
    fn test_malformed_quantity_defaults_to_one() {
        let items = parse_items_string("蘿蔔糕 x abc", &Catalog::new(), 0.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "蘿蔔糕");
        assert_eq!(items[0].quantity, 1);

        let items = parse_items_string("蘿蔔糕 x 0", &Catalog::new(), 0.0);
        assert_eq!(items[0].quantity, 1);
    }

    #[test]
    fn test_names_containing_x() {
        let items = parse_items_string("XO醬蘿蔔糕 x2, Max奶茶", &Catalog::new(), 0.0);
        assert_eq!(items[0].product_name, "XO醬蘿蔔糕");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].product_name, "Max奶茶");
        assert_eq!(items[1].quantity, 1);
    }

    #[test]
    fn test_huge_quantities_do_not_overflow() {
        let items = parse_items_string("A x 4294967295, B x 4294967295", &Catalog::new(), 100.0);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, u32::MAX);
        assert_eq!(items[1].quantity, u32::MAX);
        assert!(items.iter().all(|i| i.unit_price >= 0.0));
    }

    #[test]
    fn test_empty_names_filtered() {
        let items = parse_items_string(" x2, , ，蘿蔔糕", &Catalog::new(), 0.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "蘿蔔糕");
        assert!(parse_items_string("", &Catalog::new(), 100.0).is_empty());
    }
}
