//! Printable quotes for the current cart.

use askama::Template;
use chrono::{DateTime, Utc};
use duka_core::{CurrencyCode, Price};
use rust_decimal::{Decimal, RoundingStrategy};

use super::Result;
use super::print::{PrintHost, PrintOutcome, print_document};
use crate::backend::{Cart, CartItem};
use crate::filters;

/// One cart line on a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLine {
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Sale price, only when it is a real discount.
    pub discounted_unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    /// List price times quantity.
    pub original_total: Decimal,
    /// Price paid times quantity.
    pub discounted_total: Decimal,
}

impl QuoteLine {
    fn from_item(item: &CartItem) -> Self {
        let product = &item.product_snapshot;
        let quantity = Decimal::from(item.quantity);
        Self {
            name: product.name.clone(),
            sku: product.sku.clone(),
            quantity: item.quantity,
            unit_price: product.price,
            discounted_unit_price: product.discount_price(),
            tax_rate: product.tax_rate,
            original_total: product.price * quantity,
            discounted_total: product.effective_unit_price() * quantity,
        }
    }

    /// Amount saved on this line.
    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.original_total - self.discounted_total
    }
}

/// Amounts shown on a quote.
///
/// Subtotal, tax and total come from the cart as computed by the backend;
/// only the discount and the VAT percentage are derived here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSummary {
    pub lines: Vec<QuoteLine>,
    pub discount_total: Decimal,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    /// VAT rate in percent.
    pub vat_percent: Decimal,
    pub currency: CurrencyCode,
}

impl QuoteSummary {
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        let lines: Vec<QuoteLine> = cart.items.iter().map(QuoteLine::from_item).collect();
        let discount_total = lines.iter().map(QuoteLine::discount).sum();

        Self {
            lines,
            discount_total,
            subtotal: cart.subtotal,
            tax_total: cart.tax_total,
            total: cart.total,
            vat_percent: vat_percent(cart),
            currency: cart.currency,
        }
    }

    fn money(&self, amount: Decimal) -> String {
        Price::new(amount, self.currency).display()
    }

    #[must_use]
    pub fn subtotal_display(&self) -> String {
        self.money(self.subtotal)
    }

    #[must_use]
    pub fn discount_display(&self) -> String {
        self.money(self.discount_total)
    }

    #[must_use]
    pub fn total_display(&self) -> String {
        self.money(self.total)
    }

    /// VAT with its rate, e.g. `(16.0%) K25.60`.
    #[must_use]
    pub fn vat_display(&self) -> String {
        let percent = self
            .vat_percent
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        format!("({percent:.1}%) {}", self.money(self.tax_total))
    }

    /// Whether any line is discounted.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        !self.discount_total.is_zero()
    }

    /// Unit price shown for a line: the sale price when discounted.
    #[must_use]
    pub fn unit_price_display(&self, line: &QuoteLine) -> String {
        self.money(line.discounted_unit_price.unwrap_or(line.unit_price))
    }

    #[must_use]
    pub fn original_price_display(&self, line: &QuoteLine) -> String {
        self.money(line.unit_price)
    }

    #[must_use]
    pub fn line_total_display(&self, line: &QuoteLine) -> String {
        self.money(line.discounted_total)
    }
}

/// The rate shared by every item, or the effective rate across the cart
/// when items differ.
fn vat_percent(cart: &Cart) -> Decimal {
    let mut rates = cart.items.iter().map(|item| item.product_snapshot.tax_rate);
    if let Some(Some(first)) = rates.next()
        && rates.all(|rate| rate == Some(first))
    {
        return first;
    }

    if cart.subtotal.is_zero() {
        Decimal::ZERO
    } else {
        cart.tax_total / cart.subtotal * Decimal::ONE_HUNDRED
    }
}

/// A quote ready to render.
#[derive(Debug, Clone)]
pub struct QuoteDocument {
    pub summary: QuoteSummary,
    /// Cart the quote was generated from.
    pub reference: String,
    pub issued_at: DateTime<Utc>,
}

impl QuoteDocument {
    #[must_use]
    pub fn new(cart: &Cart, issued_at: DateTime<Utc>) -> Self {
        Self {
            summary: QuoteSummary::from_cart(cart),
            reference: cart.id.to_string(),
            issued_at,
        }
    }

    #[must_use]
    pub fn issued_display(&self) -> String {
        self.issued_at.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

/// Quote document template.
#[derive(Template)]
#[template(path = "export/quote.html")]
struct QuoteTemplate<'a> {
    doc: &'a QuoteDocument,
}

/// Render a quote as a standalone printable HTML document.
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render_quote_html(doc: &QuoteDocument) -> Result<String> {
    Ok(QuoteTemplate { doc }.render()?)
}

/// Render a quote for `cart` and send it to the print dialog.
///
/// # Errors
///
/// Returns an error if the template fails to render. A blocked window is
/// not an error; it yields [`PrintOutcome::Blocked`].
pub fn print_quote<H: PrintHost + ?Sized>(
    host: &mut H,
    cart: &Cart,
    issued_at: DateTime<Utc>,
) -> Result<PrintOutcome> {
    let html = render_quote_html(&QuoteDocument::new(cart, issued_at))?;
    Ok(print_document(host, &html))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use duka_core::{CartId, CartItemId, ProductId};

    use super::*;
    use crate::backend::ProductSnapshot;
    use crate::export::POPUP_BLOCKED_MESSAGE;
    use crate::export::print::test_host::RecordingHost;

    fn item(id: &str, price: i64, discounted: Option<i64>, rate: i64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(format!("p_{id}")),
            quantity,
            product_snapshot: ProductSnapshot {
                name: format!("Product {id}"),
                sku: None,
                price: Decimal::from(price),
                discounted_price: discounted.map(Decimal::from),
                tax_rate: Some(Decimal::from(rate)),
            },
        }
    }

    fn cart(items: Vec<CartItem>, subtotal: Decimal, tax_total: Decimal) -> Cart {
        Cart {
            id: CartId::new("cart_1"),
            items,
            subtotal,
            tax_total,
            total: subtotal + tax_total,
            currency: CurrencyCode::ZMW,
        }
    }

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_quote_totals_example() {
        let cart = cart(
            vec![item("a", 100, Some(80), 16, 2)],
            Decimal::from(160),
            Decimal::new(256, 1),
        );
        let summary = QuoteSummary::from_cart(&cart);

        assert_eq!(summary.subtotal_display(), "K160.00");
        assert_eq!(summary.vat_display(), "(16.0%) K25.60");
        assert_eq!(summary.total_display(), "K185.60");
        assert_eq!(summary.discount_display(), "K40.00");
    }

    #[test]
    fn test_zero_discounted_price_is_no_discount() {
        let cart = cart(
            vec![item("a", 100, Some(0), 16, 3), item("b", 100, Some(50), 16, 2)],
            Decimal::from(400),
            Decimal::from(64),
        );
        let summary = QuoteSummary::from_cart(&cart);

        assert_eq!(summary.lines[0].discount(), Decimal::ZERO);
        assert_eq!(summary.lines[0].discounted_unit_price, None);
        assert_eq!(summary.lines[1].discount(), Decimal::from(100));
        assert_eq!(summary.discount_total, Decimal::from(100));
    }

    #[test]
    fn test_uniform_rate_is_used_as_is() {
        // Tax total deliberately inconsistent with the rate.
        let cart = cart(
            vec![item("a", 100, None, 16, 1), item("b", 50, None, 16, 1)],
            Decimal::from(150),
            Decimal::from(30),
        );
        assert_eq!(QuoteSummary::from_cart(&cart).vat_percent, Decimal::from(16));
    }

    #[test]
    fn test_mixed_rates_use_tax_ratio() {
        let cart = cart(
            vec![item("a", 100, None, 16, 1), item("b", 100, None, 0, 1)],
            Decimal::from(200),
            Decimal::from(16),
        );
        let summary = QuoteSummary::from_cart(&cart);
        assert_eq!(summary.vat_percent, Decimal::from(8));
        assert_eq!(summary.vat_display(), "(8.0%) K16.00");
    }

    #[test]
    fn test_empty_cart_has_zero_vat() {
        let cart = cart(Vec::new(), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(QuoteSummary::from_cart(&cart).vat_percent, Decimal::ZERO);
    }

    #[test]
    fn test_quote_html_contains_totals() {
        let cart = cart(
            vec![item("a", 100, Some(80), 16, 2)],
            Decimal::from(160),
            Decimal::new(256, 1),
        );
        let html = render_quote_html(&QuoteDocument::new(&cart, issued())).unwrap();

        assert!(html.contains("Product a"));
        assert!(html.contains("K185.60"));
        assert!(html.contains("(16.0%) K25.60"));
        assert!(html.contains("2026-10-18 09:30 UTC"));
    }

    #[test]
    fn test_print_quote_blocked() {
        let cart = cart(vec![item("a", 10, None, 16, 1)], Decimal::TEN, Decimal::ONE);
        let mut host = RecordingHost {
            blocked: true,
            ..RecordingHost::default()
        };

        let outcome = print_quote(&mut host, &cart, issued()).unwrap();

        assert_eq!(outcome, PrintOutcome::Blocked);
        assert_eq!(host.alerts, vec![POPUP_BLOCKED_MESSAGE.to_string()]);
        assert!(host.windows.is_empty());
    }

    #[test]
    fn test_print_quote_prints() {
        let cart = cart(vec![item("a", 10, None, 16, 1)], Decimal::TEN, Decimal::ONE);
        let mut host = RecordingHost::default();

        let outcome = print_quote(&mut host, &cart, issued()).unwrap();

        assert_eq!(outcome, PrintOutcome::Printed);
        assert!(host.windows[0].printed);
        assert!(host.windows[0].html.contains("cart_1"));
    }
}
