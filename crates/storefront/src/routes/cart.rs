//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The active cart id lives in the session under the visitor's identity key;
//! every handler works through a [`SessionCart`] store.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::Utc;
use duka_core::{CartItemId, CurrencyCode, Price, ProductId};
use serde::Deserialize;
use tracing::instrument;

use crate::backend::{Cart, CartItem};
use crate::cart::{CartError, SyncSignal};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::export::{CsvDownload, PrintPage, ReportTable, export_filename, print_quote, print_table};
use crate::filters;
use crate::middleware::SessionCart;
use crate::state::AppState;

/// HTMX event fired after every successful cart mutation.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Cart item display data for templates.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub price: String,
    /// Undiscounted unit price, shown struck through when a discount applies.
    pub original_price: Option<String>,
    pub line_price: String,
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart priced in `currency`.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        let zero = Price::zero(currency).display();
        Self {
            items: Vec::new(),
            subtotal: zero.clone(),
            tax: zero.clone(),
            total: zero,
            item_count: 0,
        }
    }
}

// =============================================================================
// Type Conversions
// =============================================================================

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let money = |amount| Price::new(amount, cart.currency).display();
        Self {
            items: cart
                .items
                .iter()
                .map(|item| CartItemView::new(item, cart.currency))
                .collect(),
            subtotal: money(cart.subtotal),
            tax: money(cart.tax_total),
            total: money(cart.total),
            item_count: cart.item_count(),
        }
    }
}

impl CartItemView {
    fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        let product = &item.product_snapshot;
        let money = |amount| Price::new(amount, currency).display();
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            name: product.name.clone(),
            sku: product.sku.clone(),
            quantity: item.quantity,
            price: money(product.effective_unit_price()),
            original_price: product.discount_price().map(|_| money(product.price)),
            line_price: money(item.line_total()),
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: String,
}

/// Cross-tab sync signal posted by the page.
#[derive(Debug, Deserialize)]
pub struct SyncForm {
    /// `storage`, `visible`, `hidden` or `focus`.
    pub signal: String,
    /// Changed storage key, for `storage` signals.
    pub key: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

fn items_fragment(cart: &Cart) -> CartItemsTemplate {
    CartItemsTemplate {
        cart: CartView::from(cart),
    }
}

/// Items fragment for the loaded cart, or an empty one in `currency`.
fn current_items(cart: Option<&Cart>, currency: CurrencyCode) -> CartItemsTemplate {
    CartItemsTemplate {
        cart: cart.map_or_else(|| CartView::empty(currency), CartView::from),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
///
/// Loads the active cart, creating one on the first visit. Backend failures
/// render an empty cart with the error rather than a bare error page.
#[instrument(skip(state, store))]
pub async fn show(
    State(state): State<AppState>,
    SessionCart(mut store): SessionCart,
) -> impl IntoResponse {
    let error = match store.ensure_cart_exists().await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load cart");
            Some(e.to_string())
        }
    };

    CartShowTemplate {
        cart: store
            .cart()
            .map_or_else(|| CartView::empty(state.config().currency), CartView::from),
        error,
    }
}

/// Get cart count badge (HTMX).
///
/// Never creates a cart; a visitor without one sees zero.
#[instrument(skip(store))]
pub async fn count(SessionCart(mut store): SessionCart) -> impl IntoResponse {
    let count = match store.refresh_cart().await {
        Ok(cart) => cart.item_count(),
        Err(CartError::NoActiveCart) => 0,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to refresh cart count");
            0
        }
    };

    CartCountTemplate { count }
}

/// Add item to cart (HTMX).
///
/// Returns the updated count badge and triggers `cart-updated`.
#[instrument(skip(store))]
pub async fn add(
    SessionCart(mut store): SessionCart,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let quantity = form.quantity.unwrap_or(1);
    add_breadcrumb(
        "cart",
        "Add to cart",
        Some(&[("product_id", product_id.as_str())]),
    );

    let cart = store.add_item(&product_id, quantity).await?;
    Ok((
        AppendHeaders([CART_UPDATED]),
        CartCountTemplate {
            count: cart.item_count(),
        },
    )
        .into_response())
}

/// Update cart item quantity (HTMX).
#[instrument(skip(store))]
pub async fn update(
    SessionCart(mut store): SessionCart,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let item_id = CartItemId::new(form.item_id);
    add_breadcrumb("cart", "Update quantity", Some(&[("item_id", item_id.as_str())]));

    store.ensure_cart_exists().await?;
    let cart = store.update_item(&item_id, form.quantity).await?;
    Ok((AppendHeaders([CART_UPDATED]), items_fragment(cart)).into_response())
}

/// Remove item from cart (HTMX).
///
/// When the cart had to be reset, the emptied cart is rendered with a
/// `409` so the page can show the reset notice.
#[instrument(skip(state, store))]
pub async fn remove(
    State(state): State<AppState>,
    SessionCart(mut store): SessionCart,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let item_id = CartItemId::new(form.item_id);
    add_breadcrumb("cart", "Remove item", Some(&[("item_id", item_id.as_str())]));

    store.ensure_cart_exists().await?;
    match store.remove_item(&item_id).await {
        Ok(cart) => Ok((AppendHeaders([CART_UPDATED]), items_fragment(cart)).into_response()),
        Err(CartError::CartReset) => Ok((
            StatusCode::CONFLICT,
            AppendHeaders([CART_UPDATED]),
            current_items(store.cart(), state.config().currency),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// Remove every item (HTMX).
#[instrument(skip(store))]
pub async fn clear(SessionCart(mut store): SessionCart) -> Result<Response> {
    add_breadcrumb("cart", "Clear cart", None);

    let cart = store.clear_cart().await?;
    Ok((AppendHeaders([CART_UPDATED]), items_fragment(cart)).into_response())
}

/// React to a page event from another tab or a visibility change.
///
/// Returns the refreshed items fragment, or `204` when the signal was not
/// relevant to this visitor's cart.
#[instrument(skip(state, store))]
pub async fn sync(
    State(state): State<AppState>,
    SessionCart(mut store): SessionCart,
    Form(form): Form<SyncForm>,
) -> Result<Response> {
    let signal = SyncSignal::parse(&form.signal, form.key.as_deref())
        .ok_or_else(|| AppError::BadRequest(format!("Unknown sync signal: {}", form.signal)))?;

    if store.handle_signal(&signal).await? {
        Ok(current_items(store.cart(), state.config().currency).into_response())
    } else {
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}

/// Printable quote for the active cart.
#[instrument(skip(store))]
pub async fn quote(SessionCart(mut store): SessionCart) -> Result<Response> {
    let cart = store.refresh_cart().await?;
    let mut page = PrintPage::new();
    print_quote(&mut page, cart, Utc::now())?;
    Ok(page.into_response())
}

/// Cart lines as a CSV download.
#[instrument(skip(store))]
pub async fn export_csv(SessionCart(mut store): SessionCart) -> Result<Response> {
    let cart = store.refresh_cart().await?;
    let table = ReportTable::from_cart(cart);
    Ok(CsvDownload::new(&table, export_filename("cart", Utc::now())).into_response())
}

/// Cart lines as a printable table.
#[instrument(skip(store))]
pub async fn export_print(SessionCart(mut store): SessionCart) -> Result<Response> {
    let cart = store.refresh_cart().await?;
    let table = ReportTable::from_cart(cart);
    let generated_at = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();

    let mut page = PrintPage::new();
    print_table(&mut page, &table, &generated_at)?;
    Ok(page.into_response())
}
