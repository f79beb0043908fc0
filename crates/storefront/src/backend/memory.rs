//! In-memory commerce backend for tests.
//!
//! Behaves like the real backend closely enough to exercise the cart store:
//! totals are computed from product snapshots, stale cart ids return
//! `NotFound`, item ids outside the current id format return
//! `InvalidIdentifier`, and carts are retired after checkout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use duka_core::{CartId, CartItemId, CurrencyCode, OrderId, PaymentStatus, ProductId};
use rust_decimal::Decimal;

use super::{ApiError, Cart, CartApi, CartItem, CheckoutRequest, CheckoutResult, ProductSnapshot};
use crate::checkout::PaymentMethod;

/// Thread-safe in-memory backend. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    carts: HashMap<CartId, Cart>,
    products: HashMap<ProductId, ProductSnapshot>,
    stock: HashMap<ProductId, u32>,
    merge_duplicates: bool,
    item_id_prefix: Option<String>,
    checkout_failure: Option<String>,
    calls: Vec<&'static str>,
    currency: CurrencyCode,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn item_prefix(&self) -> &str {
        self.item_id_prefix.as_deref().unwrap_or("item_")
    }

    fn cart_mut(&mut self, cart_id: &CartId) -> Result<&mut Cart, ApiError> {
        self.carts
            .get_mut(cart_id)
            .ok_or_else(|| ApiError::NotFound(format!("Cart not found: {cart_id}")))
    }
}

impl InMemoryBackend {
    /// Create an empty backend with no products.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens inside a failing test.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a product that can be added to carts.
    #[must_use]
    pub fn with_product(self, product_id: impl Into<ProductId>, product: ProductSnapshot) -> Self {
        self.state().products.insert(product_id.into(), product);
        self
    }

    /// Limit the units of a product available across one cart.
    #[must_use]
    pub fn with_stock(self, product_id: impl Into<ProductId>, units: u32) -> Self {
        self.state().stock.insert(product_id.into(), units);
        self
    }

    /// Merge repeated adds of the same product into one item.
    #[must_use]
    pub fn merging_duplicates(self) -> Self {
        self.state().merge_duplicates = true;
        self
    }

    /// Fail the next checkout with a rejection carrying `message`.
    pub fn fail_next_checkout(&self, message: impl Into<String>) {
        self.state().checkout_failure = Some(message.into());
    }

    /// Change the item id format and re-issue the ids of a cart's items.
    ///
    /// Afterwards the old ids are rejected as malformed.
    pub fn reissue_item_ids(&self, cart_id: &CartId, prefix: &str) {
        let mut state = self.state();
        state.item_id_prefix = Some(prefix.to_string());
        let count = state.carts.get(cart_id).map_or(0, |cart| cart.items.len());
        let ids: Vec<CartItemId> = (0..count)
            .map(|_| CartItemId::new(format!("{prefix}{}", state.next())))
            .collect();
        if let Some(cart) = state.carts.get_mut(cart_id) {
            for (item, id) in cart.items.iter_mut().zip(ids) {
                item.id = id;
            }
        }
    }

    /// Remove every item of a product from a cart, as another tab would.
    pub fn drop_product(&self, cart_id: &CartId, product_id: &ProductId) {
        let mut state = self.state();
        if let Some(cart) = state.carts.get_mut(cart_id) {
            cart.items.retain(|item| &item.product_id != product_id);
            recompute_totals(cart);
        }
    }

    /// Delete a cart, making its id stale.
    pub fn delete_cart(&self, cart_id: &CartId) {
        self.state().carts.remove(cart_id);
    }

    /// Current server-side copy of a cart.
    #[must_use]
    pub fn cart(&self, cart_id: &CartId) -> Option<Cart> {
        self.state().carts.get(cart_id).cloned()
    }

    /// Names of the operations called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    fn record(&self, call: &'static str) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

impl CartApi for InMemoryBackend {
    async fn create_cart(&self) -> Result<Cart, ApiError> {
        let mut state = self.record("create_cart");
        let id = CartId::new(format!("cart_{}", state.next()));
        let cart = Cart {
            id: id.clone(),
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            total: Decimal::ZERO,
            currency: state.currency,
        };
        state.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ApiError> {
        let mut state = self.record("get_cart");
        state.cart_mut(cart_id).map(|cart| cart.clone())
    }

    async fn add_cart_item(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let mut state = self.record("add_cart_item");
        let product = state
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| ApiError::Rejected {
                status: 422,
                message: format!("Unknown product: {product_id}"),
            })?;
        let limit = state.stock.get(product_id).copied();
        let merge = state.merge_duplicates;
        let n = state.next();
        let new_id = format!("{}{n}", state.item_prefix());

        let cart = state.cart_mut(cart_id)?;
        let in_cart: u32 = cart
            .items
            .iter()
            .filter(|item| &item.product_id == product_id)
            .map(|item| item.quantity)
            .sum();
        if let Some(limit) = limit
            && in_cart + quantity > limit
        {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("Only {limit} of {} in stock", product.name),
            });
        }

        match cart
            .items
            .iter_mut()
            .find(|item| merge && &item.product_id == product_id)
        {
            Some(existing) => existing.quantity += quantity,
            None => cart.items.push(CartItem {
                id: CartItemId::new(new_id),
                product_id: product_id.clone(),
                quantity,
                product_snapshot: product,
            }),
        }
        recompute_totals(cart);
        Ok(cart.clone())
    }

    async fn update_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let mut state = self.record("update_cart_item");
        let cart = state.cart_mut(cart_id)?;
        let item = cart
            .items
            .iter_mut()
            .find(|item| &item.id == item_id)
            .ok_or_else(|| ApiError::NotFound(format!("Cart item not found: {item_id}")))?;
        item.quantity = quantity;
        recompute_totals(cart);
        Ok(cart.clone())
    }

    async fn remove_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<Cart, ApiError> {
        let mut state = self.record("remove_cart_item");
        if !item_id.as_str().starts_with(state.item_prefix()) {
            return Err(ApiError::InvalidIdentifier(format!(
                "Malformed cart item id: {item_id}"
            )));
        }
        let cart = state.cart_mut(cart_id)?;
        let before = cart.items.len();
        cart.items.retain(|item| &item.id != item_id);
        if cart.items.len() == before {
            return Err(ApiError::NotFound(format!("Cart item not found: {item_id}")));
        }
        recompute_totals(cart);
        Ok(cart.clone())
    }

    async fn clear_cart(&self, cart_id: &CartId) -> Result<Cart, ApiError> {
        let mut state = self.record("clear_cart");
        let cart = state.cart_mut(cart_id)?;
        cart.items.clear();
        recompute_totals(cart);
        Ok(cart.clone())
    }

    async fn checkout_cart(&self, request: &CheckoutRequest) -> Result<CheckoutResult, ApiError> {
        let mut state = self.record("checkout_cart");
        if let Some(message) = state.checkout_failure.take() {
            return Err(ApiError::Rejected {
                status: 402,
                message,
            });
        }
        if state.cart_mut(&request.cart_id)?.is_empty() {
            return Err(ApiError::Rejected {
                status: 422,
                message: "Cart is empty".to_string(),
            });
        }
        state.carts.remove(&request.cart_id);

        let n = state.next();
        let payment_status = match request.payment_method {
            PaymentMethod::Card => PaymentStatus::Paid,
            PaymentMethod::MobileMoney | PaymentMethod::BankTransfer => {
                PaymentStatus::AwaitingPayment
            }
            PaymentMethod::CashOnPickup => PaymentStatus::Pending,
        };
        Ok(CheckoutResult {
            order_id: OrderId::new(format!("ord_{n}")),
            order_number: format!("DK-{n:05}"),
            payment_status,
        })
    }
}

fn recompute_totals(cart: &mut Cart) {
    let hundred = Decimal::ONE_HUNDRED;
    cart.subtotal = cart.items.iter().map(CartItem::line_total).sum();
    cart.tax_total = cart
        .items
        .iter()
        .map(|item| {
            item.line_total() * item.product_snapshot.tax_rate.unwrap_or(Decimal::ZERO) / hundred
        })
        .sum();
    cart.total = cart.subtotal + cart.tax_total;
}
