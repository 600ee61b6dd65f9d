use std::collections::HashMap;

use crate::migration::types::{Field, HeaderMap};

/// Build a header map from a sheet's first row.
///
/// Unrecognised labels are ignored. If a label appears twice the first column wins.
pub fn build_header_map(header_row: &[String]) -> HeaderMap {
    let mut columns = HashMap::new();
    for (idx, cell) in header_row.iter().enumerate() {
        if let Some(field) = Field::from_label(cell.trim()) {
            columns.entry(field).or_insert(idx);
        }
    }
    HeaderMap::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_known_labels() {
        let map = build_header_map(&row(&["訂單時間", " 姓名 ", "電話", "備註", "地址"]));
        assert_eq!(map.get(Field::OrderTime), Some(0));
        assert_eq!(map.get(Field::Name), Some(1));
        assert_eq!(map.get(Field::Phone), Some(2));
        assert_eq!(map.get(Field::Address), Some(4));
        assert_eq!(map.get(Field::SocialId), None);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_aliases_and_duplicates() {
        let map = build_header_map(&row(&["客戶姓名", "手機", "LINE ID", "姓名"]));
        assert_eq!(map.get(Field::Name), Some(0));
        assert_eq!(map.get(Field::Phone), Some(1));
        assert_eq!(map.get(Field::SocialId), Some(2));
    }

    #[test]
    fn test_missing_cells_read_empty() {
        let map = build_header_map(&row(&["姓名", "電話", "地址"]));
        let short = row(&["王小明"]);
        assert_eq!(map.cell(&short, Field::Name), "王小明");
        assert_eq!(map.cell(&short, Field::Address), "");
        assert_eq!(map.cell(&short, Field::ContactMethod), "");
    }
}
