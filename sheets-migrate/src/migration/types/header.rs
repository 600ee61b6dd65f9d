//! Header map: canonical field name -> column index

use std::collections::HashMap;

/// Canonical customer-sheet fields recognised in a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Phone,
    Address,
    DeliveryMethod,
    ContactMethod,
    SocialId,
    OrderTime,
}

impl Field {
    /// Match a header label (already trimmed) against the known labels
    pub fn from_label(label: &str) -> Option<Self> {
        let field = match label {
            "姓名" | "客戶姓名" | "name" => Field::Name,
            "電話" | "手機" | "聯絡電話" | "phone" => Field::Phone,
            "地址" | "送貨地址" | "address" => Field::Address,
            "取貨方式" | "配送方式" | "deliveryMethod" => Field::DeliveryMethod,
            "聯絡方式" | "contactMethod" => Field::ContactMethod,
            "社群帳號" | "LINE ID" | "socialId" => Field::SocialId,
            "訂單時間" | "時間戳記" | "建立時間" | "orderTime" => Field::OrderTime,
            _ => return None,
        };
        Some(field)
    }
}

/// Immutable lookup from field to zero-based column index.
///
/// Built once per sheet from its header row. Fields whose label never
/// appeared are absent, and every row reads them as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    columns: HashMap<Field, usize>,
}

impl HeaderMap {
    pub(crate) fn from_columns(columns: HashMap<Field, usize>) -> Self {
        Self { columns }
    }

    /// Column index for a field, if the header row contained it
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Read a field's trimmed cell from a row; missing columns read as ""
    pub fn cell<'a>(&self, row: &'a [String], field: Field) -> &'a str {
        self.get(field)
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}
