//! CSV export of tabular report data.

use std::borrow::Cow;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::backend::Cart;

/// A titled table of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    #[must_use]
    pub fn new(title: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// The lines of a cart, one row per item.
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        let headers = ["Item", "SKU", "Quantity", "Unit price", "Discounted price", "Line total"];
        let mut table = Self::new(
            format!("Cart {}", cart.id),
            headers.iter().map(ToString::to_string).collect(),
        );
        for item in &cart.items {
            let product = &item.product_snapshot;
            table.push_row(vec![
                product.name.clone(),
                product.sku.clone().unwrap_or_default(),
                item.quantity.to_string(),
                amount(product.price),
                product.discount_price().map(amount).unwrap_or_default(),
                amount(item.line_total()),
            ]);
        }
        table
    }

    /// Headers and rows as CSV, one record per line, no trailing newline.
    #[must_use]
    pub fn to_csv(&self) -> String {
        std::iter::once(&self.headers)
            .chain(&self.rows)
            .map(|record| {
                record
                    .iter()
                    .map(|cell| escape_cell(cell))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn amount(value: Decimal) -> String {
    format!("{value:.2}")
}

/// Quote a cell only when it contains a delimiter, quote or line break.
fn escape_cell(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

/// Download name for an export made at `now`: `{prefix}_{YYYY-MM-DD_HHMMSS}.csv`.
#[must_use]
pub fn export_filename(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}_{}.csv", now.format("%Y-%m-%d_%H%M%S"))
}

/// A CSV file sent as an attachment.
#[derive(Debug, Clone)]
pub struct CsvDownload {
    pub filename: String,
    pub body: String,
}

impl CsvDownload {
    #[must_use]
    pub fn new(table: &ReportTable, filename: String) -> Self {
        Self {
            filename,
            body: table.to_csv(),
        }
    }
}

impl IntoResponse for CsvDownload {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.body,
        )
            .into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use duka_core::{CartId, CartItemId, CurrencyCode, ProductId};

    use super::*;
    use crate::backend::{CartItem, ProductSnapshot};

    fn table(rows: Vec<Vec<&str>>) -> ReportTable {
        let mut table = ReportTable::new("Report", vec!["Name".to_string(), "Note".to_string()]);
        for row in rows {
            table.push_row(row.into_iter().map(String::from).collect());
        }
        table
    }

    #[test]
    fn test_plain_cells_are_not_quoted() {
        let csv = table(vec![vec!["Rice", "bulk"]]).to_csv();
        assert_eq!(csv, "Name,Note\nRice,bulk");
    }

    #[test]
    fn test_comma_cell_is_quoted() {
        let csv = table(vec![vec!["Oil, 2L", "x"]]).to_csv();
        assert_eq!(csv, "Name,Note\n\"Oil, 2L\",x");
    }

    #[test]
    fn test_quotes_are_doubled() {
        let csv = table(vec![vec!["12\" pan", "say \"hi\", ok"]]).to_csv();
        assert_eq!(csv, "Name,Note\n\"12\"\" pan\",\"say \"\"hi\"\", ok\"");
    }

    #[test]
    fn test_line_breaks_are_quoted() {
        let csv = table(vec![vec!["a\nb", "c\rd"]]).to_csv();
        assert_eq!(csv, "Name,Note\n\"a\nb\",\"c\rd\"");
    }

    #[test]
    fn test_export_filename() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 8, 5, 9).unwrap();
        assert_eq!(
            export_filename("cart", now),
            "cart_2026-03-07_080509.csv"
        );
    }

    #[test]
    fn test_from_cart() {
        let cart = Cart {
            id: CartId::new("cart_7"),
            items: vec![CartItem {
                id: CartItemId::new("item_1"),
                product_id: ProductId::new("p_oil"),
                quantity: 2,
                product_snapshot: ProductSnapshot {
                    name: "Cooking oil, 2L".to_string(),
                    sku: Some("OIL-2".to_string()),
                    price: Decimal::from(100),
                    discounted_price: Some(Decimal::from(80)),
                    tax_rate: Some(Decimal::from(16)),
                },
            }],
            subtotal: Decimal::from(160),
            tax_total: Decimal::new(256, 1),
            total: Decimal::new(1856, 1),
            currency: CurrencyCode::ZMW,
        };

        let csv = ReportTable::from_cart(&cart).to_csv();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Item,SKU,Quantity,Unit price,Discounted price,Line total"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"Cooking oil, 2L\",OIL-2,2,100.00,80.00,160.00"
        );
    }

    #[test]
    fn test_download_headers() {
        let response = CsvDownload::new(&table(vec![]), "cart_x.csv".to_string()).into_response();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"cart_x.csv\""
        );
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
    }
}
