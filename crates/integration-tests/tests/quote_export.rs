//! Integration tests for quotes and exports built from live carts.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use duka_core::ProductId;
use duka_integration_tests::{guest_store, shop};
use duka_storefront::backend::Cart;
use duka_storefront::cart::MemoryCartIdStorage;
use duka_storefront::export::{
    CsvDownload, POPUP_BLOCKED_MESSAGE, PrintHost, PrintOutcome, PrintPage, PrintWindow,
    QuoteSummary, ReportTable, export_filename, print_quote, print_table,
};

/// A browser with popups blocked.
#[derive(Default)]
struct BlockedBrowser {
    alerts: Vec<String>,
}

impl PrintHost for BlockedBrowser {
    fn open_window(&mut self) -> Option<&mut dyn PrintWindow> {
        None
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

/// Two discounted kettles and a bag of rice.
async fn cart() -> Cart {
    let backend = shop();
    let storage = MemoryCartIdStorage::new();
    let mut store = guest_store(&backend, &storage);
    store.add_item(&ProductId::new("p_kettle"), 2).await.unwrap();
    store.add_item(&ProductId::new("p_rice"), 1).await.unwrap().clone()
}

#[tokio::test]
async fn test_quote_summary_from_backend_totals() {
    let cart = cart().await;
    let summary = QuoteSummary::from_cart(&cart);

    // 2 x K80 + K120, 16% VAT on everything
    assert_eq!(summary.subtotal_display(), "K280.00");
    assert_eq!(summary.discount_display(), "K40.00");
    assert_eq!(summary.vat_display(), "(16.0%) K44.80");
    assert_eq!(summary.total_display(), "K324.80");
    assert!(summary.has_discount());
}

#[tokio::test]
async fn test_quote_page_prints_on_load() {
    let cart = cart().await;
    let issued = Utc.with_ymd_and_hms(2026, 10, 18, 14, 5, 0).unwrap();

    let mut page = PrintPage::new();
    let outcome = print_quote(&mut page, &cart, issued).unwrap();
    let html = page.into_html();

    assert_eq!(outcome, PrintOutcome::Printed);
    assert!(html.contains("Kettle"));
    assert!(html.contains("K324.80"));
    assert!(html.contains("2026-10-18 14:05 UTC"));
    assert!(html.contains("window.print()"));
}

#[tokio::test]
async fn test_blocked_popup_only_alerts() {
    let cart = cart().await;
    let mut browser = BlockedBrowser::default();

    let outcome = print_quote(&mut browser, &cart, Utc::now()).unwrap();
    assert_eq!(outcome, PrintOutcome::Blocked);

    let outcome = print_table(&mut browser, &ReportTable::from_cart(&cart), "now").unwrap();
    assert_eq!(outcome, PrintOutcome::Blocked);
    assert_eq!(browser.alerts, vec![POPUP_BLOCKED_MESSAGE; 2]);
}

#[tokio::test]
async fn test_cart_csv_download() {
    let cart = cart().await;
    let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let download = CsvDownload::new(&ReportTable::from_cart(&cart), export_filename("cart", now));

    assert_eq!(download.filename, "cart_2026-01-02_030405.csv");
    let lines: Vec<&str> = download.body.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Item,SKU,Quantity,Unit price,Discounted price,Line total",
            "Kettle,KETTLE,2,100.00,80.00,160.00",
            "Rice 5kg,RICE-5KG,1,120.00,,120.00",
        ]
    );
}
