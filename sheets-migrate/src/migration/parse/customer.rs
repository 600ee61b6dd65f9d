use super::{ParseContext, text::normalize_phone};
use crate::migration::types::{Customer, Field, HeaderMap};

/// Parse one customers-sheet row.
///
/// Returns `None` when the name or the normalized phone is empty.
pub fn parse_customer_row(
    row: &[String],
    header: &HeaderMap,
    ctx: &ParseContext,
) -> Option<Customer> {
    let name = header.cell(row, Field::Name);
    let phone = normalize_phone(header.cell(row, Field::Phone));
    if name.is_empty() || phone.is_empty() {
        return None;
    }

    Some(Customer {
        name: name.to_string(),
        phone,
        address: header.cell(row, Field::Address).to_string(),
        delivery_method: header.cell(row, Field::DeliveryMethod).to_string(),
        contact_method: header.cell(row, Field::ContactMethod).to_string(),
        social_id: header.cell(row, Field::SocialId).to_string(),
        created_at: ctx.timestamp_or_now(header.cell(row, Field::OrderTime)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::parse::build_header_map;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Asia::Taipei;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn ctx() -> ParseContext {
        ParseContext::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), Taipei)
    }

    #[test]
    fn test_parse_customer() {
        let header = build_header_map(&row(&["姓名", "電話", "地址", "取貨方式", "訂單時間"]));
        let customer = parse_customer_row(
            &row(&[" 王小明 ", "09-1234-5678", "台北市", "宅配", "2024/1/5 15:00:00"]),
            &header,
            &ctx(),
        )
        .unwrap();

        assert_eq!(customer.name, "王小明");
        assert_eq!(customer.phone, "0912345678");
        assert_eq!(customer.address, "台北市");
        assert_eq!(customer.delivery_method, "宅配");
        assert_eq!(customer.social_id, "");
        assert_eq!(customer.created_at, Utc.with_ymd_and_hms(2024, 1, 5, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_skip_without_name_or_phone() {
        let header = build_header_map(&row(&["姓名", "電話"]));
        assert!(parse_customer_row(&row(&["", "0912345678"]), &header, &ctx()).is_none());
        assert!(parse_customer_row(&row(&["王小明", " - "]), &header, &ctx()).is_none());
        assert!(parse_customer_row(&row(&["  ", "  "]), &header, &ctx()).is_none());
    }

    #[test]
    fn test_unparsable_date_falls_back_to_now() {
        let header = build_header_map(&row(&["姓名", "電話", "訂單時間"]));
        let customer =
            parse_customer_row(&row(&["林", "0911", "上週"]), &header, &ctx()).unwrap();
        assert_eq!(customer.created_at, ctx().now);
    }

    #[test]
    fn test_unmapped_phone_column_skips_every_row() {
        let header = build_header_map(&row(&["姓名", "Email"]));
        assert!(parse_customer_row(&row(&["王小明", "a@b.c"]), &header, &ctx()).is_none());
    }
}
