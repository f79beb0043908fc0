//! The cart state store.

use std::collections::HashMap;

use duka_core::{CartId, CartItemId, ProductId};
use tracing::{debug, info, instrument, warn};

use super::{CartError, CartIdStorage, CartIdentity, GUEST_CART_KEY, Result, SyncSignal};
use crate::backend::{ApiError, Cart, CartApi, CartItem, CheckoutRequest, CheckoutResult};
use crate::checkout::CheckoutInput;

/// Owns the cart shown to one customer.
///
/// The store is owned by a single task and mutated through `&mut self`.
/// Every operation that fails records its message in [`CartStore::error`]
/// and also returns the error, so callers can both display it and react.
pub struct CartStore<A, S> {
    api: A,
    storage: S,
    identity: CartIdentity,
    cart: Option<Cart>,
    error: Option<String>,
    updating: bool,
}

impl<A, S> std::fmt::Debug for CartStore<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("identity", &self.identity)
            .field("cart_id", &self.cart.as_ref().map(|cart| &cart.id))
            .field("error", &self.error)
            .field("updating", &self.updating)
            .finish_non_exhaustive()
    }
}

impl<A: CartApi, S: CartIdStorage> CartStore<A, S> {
    /// Create a store with no cart loaded.
    pub const fn new(api: A, storage: S, identity: CartIdentity) -> Self {
        Self {
            api,
            storage,
            identity,
            cart: None,
            error: None,
            updating: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The loaded cart, if any.
    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// Message of the last failed operation, cleared by the next success.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a backend call is in flight.
    #[must_use]
    pub const fn is_updating(&self) -> bool {
        self.updating
    }

    /// The identity whose cart this store manages.
    #[must_use]
    pub const fn identity(&self) -> &CartIdentity {
        &self.identity
    }

    /// Storage key of the active cart id.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.identity.storage_key()
    }

    /// Switch identity, e.g. after sign in or sign out.
    ///
    /// The loaded cart is dropped so the next access reads the new
    /// namespace. The guest cart is not merged into the user's cart.
    pub fn set_identity(&mut self, identity: CartIdentity) {
        if self.identity != identity {
            info!(from = ?self.identity, to = ?identity, "Cart identity changed");
            self.identity = identity;
            self.cart = None;
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Return the active cart id, loading or creating the cart as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or a new cart cannot be created.
    #[instrument(skip(self))]
    pub async fn ensure_cart_exists(&mut self) -> Result<CartId> {
        self.updating = true;
        let result = self.active_cart_id().await;
        self.settle(result)
    }

    /// Add a product. Merging of duplicates is left to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity, or the
    /// backend's rejection (e.g. out of stock) unchanged.
    #[instrument(skip(self))]
    pub async fn add_item(&mut self, product_id: &ProductId, quantity: u32) -> Result<&Cart> {
        if quantity == 0 {
            return Err(self.fail(CartError::InvalidQuantity(quantity)));
        }
        self.updating = true;
        let result: Result<_> = async {
            let cart_id = self.active_cart_id().await?;
            Ok(self.api.add_cart_item(&cart_id, product_id, quantity).await?)
        }
        .await;
        self.settle_cart(result)
    }

    /// Set the quantity of an item, keeping the displayed item order.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] below 1, or the backend error.
    #[instrument(skip(self))]
    pub async fn update_item(&mut self, item_id: &CartItemId, quantity: u32) -> Result<&Cart> {
        if quantity == 0 {
            return Err(self.fail(CartError::InvalidQuantity(quantity)));
        }
        self.updating = true;
        let result: Result<_> = async {
            let cart_id = self.active_cart_id().await?;
            let fresh = self.api.update_cart_item(&cart_id, item_id, quantity).await?;
            Ok(match &self.cart {
                Some(previous) => preserve_item_order(&previous.items, fresh),
                None => fresh,
            })
        }
        .await;
        self.settle_cart(result)
    }

    /// Remove an item from the loaded cart.
    ///
    /// The id must be non-empty and present in the loaded cart; otherwise no
    /// backend call is made. If the backend rejects the id's format, the cart
    /// is refreshed and removal retried once for the item with the same
    /// product. If that fails too, the whole cart is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidItem`] or [`CartError::ItemNotFound`] for
    /// unusable ids, [`CartError::CartReset`] when recovery cleared the cart,
    /// or the backend error.
    #[instrument(skip(self))]
    pub async fn remove_item(&mut self, item_id: &CartItemId) -> Result<&Cart> {
        if item_id.is_blank() {
            return Err(self.fail(CartError::InvalidItem(
                "cart item id must be a non-empty string".to_string(),
            )));
        }
        if let Err(e) = self.current_cart_id().await {
            return Err(self.fail(e));
        }
        let Some((cart_id, product_id)) = self.cart.as_ref().and_then(|cart| {
            cart.find_item(item_id)
                .map(|item| (cart.id.clone(), item.product_id.clone()))
        }) else {
            return Err(self.fail(CartError::ItemNotFound(item_id.clone())));
        };

        self.updating = true;
        let result = match self.api.remove_cart_item(&cart_id, item_id).await {
            Err(ApiError::InvalidIdentifier(reason)) => {
                warn!(%item_id, %reason, "Backend rejected cart item id, recovering");
                match self.recover_removal(&cart_id, &product_id).await {
                    Ok(Recovery::Removed(cart)) => Ok(cart),
                    Ok(Recovery::Reset(emptied)) => {
                        self.cart = Some(emptied);
                        Err(CartError::CartReset)
                    }
                    Err(e) => Err(e),
                }
            }
            other => other.map_err(CartError::from),
        };
        self.settle_cart(result)
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn clear_cart(&mut self) -> Result<&Cart> {
        self.updating = true;
        let result: Result<_> = async {
            let cart_id = self.active_cart_id().await?;
            Ok(self.api.clear_cart(&cart_id).await?)
        }
        .await;
        self.settle_cart(result)
    }

    /// Re-fetch the active cart from the backend.
    ///
    /// Only the stored id is read, so a cart switched by another tab is
    /// picked up. When storage holds no id, or the backend no longer knows
    /// the stored one, the loaded cart is dropped and the next access starts
    /// a new cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoActiveCart`] when no id is stored, or the
    /// backend error.
    #[instrument(skip(self))]
    pub async fn refresh_cart(&mut self) -> Result<&Cart> {
        self.updating = true;
        let result: Result<_> = async {
            let Some(cart_id) = self.stored_cart_id().await? else {
                self.cart = None;
                return Err(CartError::NoActiveCart);
            };
            match self.api.get_cart(&cart_id).await {
                Ok(cart) => Ok(cart),
                Err(e) if e.is_not_found() => {
                    warn!(%cart_id, "Stored cart is gone, dropping it");
                    self.cart = None;
                    self.storage.remove(&self.storage_key()).await?;
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
        .await;
        self.settle_cart(result)
    }

    /// React to a page event. Returns whether a refresh ran.
    ///
    /// A loaded cart whose id was removed from storage, e.g. by a checkout in
    /// another tab, is dropped and counts as a refresh.
    ///
    /// # Errors
    ///
    /// Returns the storage or refresh error.
    pub async fn handle_signal(&mut self, signal: &SyncSignal) -> Result<bool> {
        if !signal.should_refresh(&self.storage_key()) {
            return Ok(false);
        }
        let stored = match self.stored_cart_id().await {
            Ok(stored) => stored,
            Err(e) => return Err(self.fail(e)),
        };
        if stored.is_none() {
            if self.cart.take().is_some() {
                info!(?signal, "Cart retired elsewhere, dropped loaded cart");
                self.error = None;
                return Ok(true);
            }
            debug!(?signal, "No cart to refresh");
            return Ok(false);
        }
        self.refresh_cart().await?;
        Ok(true)
    }

    /// Place an order for the loaded cart.
    ///
    /// On success the cart id is retired: the storage key is removed and the
    /// next access creates a fresh cart. On failure the cart is untouched.
    ///
    /// # Errors
    ///
    /// Returns the backend error, e.g. a declined payment.
    #[instrument(skip(self, input))]
    pub async fn checkout(&mut self, input: &CheckoutInput) -> Result<CheckoutResult> {
        self.updating = true;
        let result: Result<_> = async {
            let cart_id = self.active_cart_id().await?;
            let request = CheckoutRequest::new(&cart_id, input);
            let outcome = self.api.checkout_cart(&request).await?;
            self.cart = None;
            // A leftover id is replaced on the next access.
            if let Err(e) = self.storage.remove(&self.storage_key()).await {
                warn!(%cart_id, error = %e, "Failed to clear retired cart id");
            }
            info!(
                order_number = %outcome.order_number,
                payment_status = %outcome.payment_status,
                "Checkout completed"
            );
            Ok(outcome)
        }
        .await;
        self.settle(result)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn active_cart_id(&mut self) -> Result<CartId> {
        match self.current_cart_id().await? {
            Some(cart_id) => Ok(cart_id),
            None => self.resolve_cart().await,
        }
    }

    /// The loaded cart's id while storage still names it.
    ///
    /// A loaded cart that storage no longer points at was retired or replaced
    /// by another tab; it is dropped.
    async fn current_cart_id(&mut self) -> Result<Option<CartId>> {
        let Some(loaded) = self.cart.as_ref().map(|cart| cart.id.clone()) else {
            return Ok(None);
        };
        let stored = self.stored_cart_id().await?;
        if stored.as_ref() == Some(&loaded) {
            return Ok(Some(loaded));
        }
        debug!(%loaded, ?stored, "Loaded cart is no longer active");
        self.cart = None;
        Ok(None)
    }

    async fn stored_cart_id(&self) -> Result<Option<CartId>> {
        Ok(self.storage.get(&self.storage_key()).await?.map(CartId::new))
    }

    /// Adopt the stored cart, or create one.
    async fn resolve_cart(&mut self) -> Result<CartId> {
        if self.identity.is_authenticated() {
            self.storage.remove(GUEST_CART_KEY).await?;
        }

        let key = self.storage_key();
        if let Some(stored) = self.storage.get(&key).await? {
            let cart_id = CartId::new(stored);
            match self.api.get_cart(&cart_id).await {
                Ok(cart) => {
                    debug!(%cart_id, "Adopted stored cart");
                    self.cart = Some(cart);
                    return Ok(cart_id);
                }
                Err(e) => {
                    warn!(%cart_id, error = %e, "Stored cart unavailable, starting a new one");
                }
            }
        }

        let cart = self.api.create_cart().await?;
        self.storage.set(&key, cart.id.as_str()).await?;
        info!(cart_id = %cart.id, "Created cart");
        let cart_id = cart.id.clone();
        self.cart = Some(cart);
        Ok(cart_id)
    }

    async fn recover_removal(&self, cart_id: &CartId, product_id: &ProductId) -> Result<Recovery> {
        let retried = match self.api.get_cart(cart_id).await {
            Ok(fresh) => match fresh.items.iter().find(|item| &item.product_id == product_id) {
                Some(item) => self.api.remove_cart_item(cart_id, &item.id).await.ok(),
                None => None,
            },
            Err(e) => {
                warn!(%cart_id, error = %e, "Refresh during removal recovery failed");
                None
            }
        };

        if let Some(cart) = retried {
            return Ok(Recovery::Removed(cart));
        }

        warn!(%cart_id, "Removal recovery failed, clearing cart");
        Ok(Recovery::Reset(self.api.clear_cart(cart_id).await?))
    }

    fn fail(&mut self, err: CartError) -> CartError {
        self.error = Some(err.to_string());
        err
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        self.updating = false;
        match result {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn settle_cart(&mut self, result: Result<Cart>) -> Result<&Cart> {
        let cart = self.settle(result)?;
        Ok(&*self.cart.insert(cart))
    }
}

/// Outcome of retrying a removal after an id format error.
enum Recovery {
    Removed(Cart),
    Reset(Cart),
}

/// Sort `fresh` by each item's position in `previous`.
///
/// Items that were not there before keep the backend's order, after the
/// known ones.
fn preserve_item_order(previous: &[CartItem], mut fresh: Cart) -> Cart {
    let positions: HashMap<&CartItemId, usize> = previous
        .iter()
        .enumerate()
        .map(|(index, item)| (&item.id, index))
        .collect();
    fresh
        .items
        .sort_by_key(|item| positions.get(&item.id).map_or((1, 0), |&index| (0, index)));
    fresh
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use duka_core::UserId;
    use rust_decimal::Decimal;

    use super::*;
    use crate::backend::ProductSnapshot;
    use crate::backend::memory::InMemoryBackend;
    use crate::cart::{MemoryCartIdStorage, StorageError};
    use crate::checkout::{CustomerInfo, Fulfillment, PaymentDetails};

    fn product(name: &str, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            name: name.to_string(),
            sku: None,
            price: Decimal::from(price),
            discounted_price: None,
            tax_rate: Some(Decimal::from(16)),
        }
    }

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_product("p_rice", product("Rice 5kg", 120))
            .with_product("p_oil", product("Cooking oil 2L", 95))
            .with_product("p_salt", product("Salt 1kg", 15))
    }

    fn store(
        api: &InMemoryBackend,
        storage: &MemoryCartIdStorage,
    ) -> CartStore<InMemoryBackend, MemoryCartIdStorage> {
        CartStore::new(api.clone(), storage.clone(), CartIdentity::Guest)
    }

    fn pickup_order() -> CheckoutInput {
        CheckoutInput {
            customer: CustomerInfo {
                name: "Mutale Banda".to_string(),
                email: "mutale@duka.test".to_string(),
                phone: "0961234567".to_string(),
            },
            fulfillment: Fulfillment::Pickup,
            shipping_address: None,
            billing_address: None,
            payment: PaymentDetails::CashOnPickup,
            notes: None,
        }
    }

    /// Memory storage whose reads or deletes fail.
    #[derive(Clone)]
    struct BrokenStorage {
        inner: MemoryCartIdStorage,
        broken_get: bool,
        broken_remove: bool,
    }

    fn outage() -> StorageError {
        StorageError::Session(tower_sessions::session::Error::Store(
            tower_sessions::session_store::Error::Backend("session store unavailable".to_string()),
        ))
    }

    impl CartIdStorage for BrokenStorage {
        async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
            if self.broken_get {
                return Err(outage());
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> std::result::Result<(), StorageError> {
            if self.broken_remove {
                return Err(outage());
            }
            self.inner.remove(key).await
        }
    }

    fn ids(cart: &Cart) -> Vec<&str> {
        cart.items.iter().map(|item| item.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_ensure_creates_and_persists_cart() {
        let api = backend();
        let storage = MemoryCartIdStorage::new();
        let mut store = store(&api, &storage);

        let cart_id = store.ensure_cart_exists().await.unwrap();

        assert_eq!(storage.peek(GUEST_CART_KEY), Some(cart_id.to_string()));
        assert!(store.cart().unwrap().is_empty());
        assert!(!store.is_updating());
    }

    #[tokio::test]
    async fn test_ensure_reuses_loaded_cart_without_network() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());

        let first = store.ensure_cart_exists().await.unwrap();
        let calls = api.calls().len();
        let second = store.ensure_cart_exists().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_ensure_adopts_stored_cart() {
        let api = backend();
        let storage = MemoryCartIdStorage::new();
        let existing = store(&api, &storage).ensure_cart_exists().await.unwrap();

        let mut fresh_store = store(&api, &storage);
        let adopted = fresh_store.ensure_cart_exists().await.unwrap();

        assert_eq!(adopted, existing);
        assert_eq!(api.calls(), vec!["create_cart", "get_cart"]);
    }

    #[tokio::test]
    async fn test_ensure_replaces_stale_cart() {
        let api = backend();
        let storage = MemoryCartIdStorage::new();
        storage.set(GUEST_CART_KEY, "cart_deleted").await.unwrap();
        let mut store = store(&api, &storage);

        let cart_id = store.ensure_cart_exists().await.unwrap();

        assert_ne!(cart_id.as_str(), "cart_deleted");
        assert_eq!(storage.peek(GUEST_CART_KEY), Some(cart_id.to_string()));
    }

    #[tokio::test]
    async fn test_signed_in_user_discards_guest_key() {
        let api = backend();
        let storage = MemoryCartIdStorage::new();
        let mut guest = store(&api, &storage);
        guest.add_item(&ProductId::new("p_rice"), 1).await.unwrap();

        let identity = CartIdentity::User(UserId::new("u_1"));
        let mut user = CartStore::new(api.clone(), storage.clone(), identity.clone());
        let cart_id = user.ensure_cart_exists().await.unwrap();

        assert_eq!(storage.peek(GUEST_CART_KEY), None);
        assert_eq!(storage.peek(&identity.storage_key()), Some(cart_id.to_string()));
        assert!(user.cart().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_identity_drops_loaded_cart() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.add_item(&ProductId::new("p_rice"), 1).await.unwrap();

        store.set_identity(CartIdentity::User(UserId::new("u_9")));

        assert!(store.cart().is_none());
        assert_eq!(store.storage_key(), "duka_cart_id_user_u_9");
    }

    #[tokio::test]
    async fn test_add_item_is_pass_through() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        let rice = ProductId::new("p_rice");

        store.add_item(&rice, 2).await.unwrap();
        let cart = store.add_item(&rice, 2).await.unwrap();

        // This backend does not merge, so the store shows two lines.
        assert_eq!(cart.items.len(), 2);
        assert!(cart.items.iter().all(|item| item.quantity == 2));
    }

    #[tokio::test]
    async fn test_add_item_with_merging_backend() {
        let api = backend().merging_duplicates();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        let rice = ProductId::new("p_rice");

        store.add_item(&rice, 2).await.unwrap();
        let cart = store.add_item(&rice, 2).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_add_item_surfaces_rejection() {
        let api = backend().with_stock("p_oil", 1);
        let mut store = store(&api, &MemoryCartIdStorage::new());

        let err = store.add_item(&ProductId::new("p_oil"), 3).await.unwrap_err();

        assert!(matches!(err, CartError::Api(ApiError::Rejected { .. })));
        assert_eq!(store.error(), Some("Only 1 of Cooking oil 2L in stock"));
        assert!(!store.is_updating());
    }

    #[tokio::test]
    async fn test_update_preserves_item_order() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        for id in ["p_rice", "p_oil", "p_salt"] {
            store.add_item(&ProductId::new(id), 1).await.unwrap();
        }
        let before: Vec<String> = ids(store.cart().unwrap()).iter().map(ToString::to_string).collect();
        let target = store.cart().unwrap().items[1].id.clone();

        let cart = store.update_item(&target, 5).await.unwrap();

        assert_eq!(ids(cart), before);
        assert_eq!(cart.find_item(&target).unwrap().quantity, 5);
        assert!(cart
            .items
            .iter()
            .filter(|item| item.id != target)
            .all(|item| item.quantity == 1));
    }

    #[test]
    fn test_preserve_order_appends_unknown_items() {
        let item = |id: &str| CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(format!("p_{id}")),
            quantity: 1,
            product_snapshot: product(id, 10),
        };
        let previous = vec![item("a"), item("b"), item("c")];
        let fresh = Cart {
            id: CartId::new("c"),
            items: vec![item("x"), item("c"), item("a"), item("y"), item("b")],
            subtotal: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            total: Decimal::ZERO,
            currency: duka_core::CurrencyCode::ZMW,
        };

        let sorted = preserve_item_order(&previous, fresh);

        assert_eq!(ids(&sorted), vec!["a", "b", "c", "x", "y"]);
    }

    #[tokio::test]
    async fn test_update_rejects_zero_quantity() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());

        let err = store.update_item(&CartItemId::new("item_1"), 0).await.unwrap_err();

        assert!(matches!(err, CartError::InvalidQuantity(0)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_item_makes_no_call() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.add_item(&ProductId::new("p_rice"), 1).await.unwrap();
        let snapshot = store.cart().cloned();
        let calls = api.calls().len();

        let err = store.remove_item(&CartItemId::new("17")).await.unwrap_err();

        assert!(matches!(err, CartError::ItemNotFound(_)));
        assert_eq!(api.calls().len(), calls);
        assert_eq!(store.cart().cloned(), snapshot);
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn test_remove_blank_item_makes_no_call() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());

        let err = store.remove_item(&CartItemId::new("  ")).await.unwrap_err();

        assert!(matches!(err, CartError::InvalidItem(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.add_item(&ProductId::new("p_rice"), 1).await.unwrap();
        let cart = store.add_item(&ProductId::new("p_oil"), 1).await.unwrap();
        let rice = cart.items[0].id.clone();

        let cart = store.remove_item(&rice).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id.as_str(), "p_oil");
    }

    #[tokio::test]
    async fn test_remove_recovers_from_reissued_ids() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.add_item(&ProductId::new("p_rice"), 1).await.unwrap();
        let cart = store.add_item(&ProductId::new("p_oil"), 1).await.unwrap();
        let (cart_id, stale_rice) = (cart.id.clone(), cart.items[0].id.clone());
        api.reissue_item_ids(&cart_id, "line_");

        let cart = store.remove_item(&stale_rice).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id.as_str(), "p_oil");
        assert!(cart.items[0].id.as_str().starts_with("line_"));
    }

    #[tokio::test]
    async fn test_remove_clears_cart_when_recovery_fails() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.add_item(&ProductId::new("p_rice"), 1).await.unwrap();
        let cart = store.add_item(&ProductId::new("p_oil"), 1).await.unwrap();
        let (cart_id, stale_rice) = (cart.id.clone(), cart.items[0].id.clone());
        api.reissue_item_ids(&cart_id, "line_");
        api.drop_product(&cart_id, &ProductId::new("p_rice"));

        let err = store.remove_item(&stale_rice).await.unwrap_err();

        assert!(matches!(err, CartError::CartReset));
        assert_eq!(store.error(), Some("Your cart was invalid and has been cleared"));
        assert!(api.cart(&cart_id).unwrap().is_empty());
        assert!(store.cart().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.add_item(&ProductId::new("p_rice"), 3).await.unwrap();

        let cart = store.clear_cart().await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_refresh_without_cart_fails() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());

        let err = store.refresh_cart().await.unwrap_err();

        assert!(matches!(err, CartError::NoActiveCart));
    }

    #[tokio::test]
    async fn test_storage_event_from_other_tab_refreshes() {
        let api = backend();
        let first_tab = MemoryCartIdStorage::new();
        let second_tab = first_tab.new_tab();
        let mut events = second_tab.subscribe();
        let mut first = store(&api, &first_tab);
        let mut second = store(&api, &second_tab);

        second.ensure_cart_exists().await.unwrap();
        first.add_item(&ProductId::new("p_salt"), 2).await.unwrap();
        first.clear_cart().await.unwrap();
        let other = first_tab.new_tab();
        let mut replacement = store(&api, &other);
        // Another tab retires the shared cart and starts a new one.
        other.remove(GUEST_CART_KEY).await.unwrap();
        replacement.add_item(&ProductId::new("p_oil"), 1).await.unwrap();

        let mut refreshed = false;
        while let Some(event) = events.try_recv() {
            refreshed |= second.handle_signal(&SyncSignal::from(event)).await.unwrap();
        }

        assert!(refreshed);
        let shown = second.cart().unwrap();
        assert_eq!(shown.id, replacement.cart().unwrap().id);
        assert_eq!(shown.items[0].product_id.as_str(), "p_oil");
    }

    #[tokio::test]
    async fn test_signals_for_other_keys_are_ignored() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());
        store.ensure_cart_exists().await.unwrap();
        let calls = api.calls().len();

        let other_key = SyncSignal::StorageChanged {
            key: "duka_cart_id_user_5".to_string(),
        };
        assert!(!store.handle_signal(&other_key).await.unwrap());
        assert!(!store.handle_signal(&SyncSignal::VisibilityHidden).await.unwrap());
        assert_eq!(api.calls().len(), calls);

        assert!(store.handle_signal(&SyncSignal::WindowFocused).await.unwrap());
        assert_eq!(api.calls().len(), calls + 1);
    }

    #[tokio::test]
    async fn test_focus_without_cart_does_nothing() {
        let api = backend();
        let mut store = store(&api, &MemoryCartIdStorage::new());

        assert!(!store.handle_signal(&SyncSignal::VisibilityVisible).await.unwrap());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_in_other_tab_starts_new_cart() {
        let api = backend();
        let first_tab = MemoryCartIdStorage::new();
        let second_tab = first_tab.new_tab();
        let mut events = second_tab.subscribe();
        let mut first = store(&api, &first_tab);
        let mut second = store(&api, &second_tab);

        let retired = first.add_item(&ProductId::new("p_rice"), 1).await.unwrap().id.clone();
        second.ensure_cart_exists().await.unwrap();
        assert_eq!(second.cart().unwrap().item_count(), 1);
        first.checkout(&pickup_order()).await.unwrap();

        let mut refreshed = false;
        while let Some(event) = events.try_recv() {
            refreshed |= second.handle_signal(&SyncSignal::from(event)).await.unwrap();
        }
        assert!(refreshed);
        assert!(second.cart().is_none());

        let cart = second.add_item(&ProductId::new("p_oil"), 1).await.unwrap();
        assert_ne!(cart.id, retired);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(first_tab.peek(GUEST_CART_KEY), Some(cart.id.to_string()));
    }

    #[tokio::test]
    async fn test_mutation_after_unseen_checkout_uses_new_cart() {
        let api = backend();
        let first_tab = MemoryCartIdStorage::new();
        let mut first = store(&api, &first_tab);
        let mut second = store(&api, &first_tab.new_tab());

        let retired = first.add_item(&ProductId::new("p_rice"), 1).await.unwrap().id.clone();
        second.ensure_cart_exists().await.unwrap();
        first.checkout(&pickup_order()).await.unwrap();

        // No signal reached the second tab before it acted.
        let cart = second.add_item(&ProductId::new("p_salt"), 2).await.unwrap();
        assert_ne!(cart.id, retired);
        assert_eq!(cart.item_count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_drops_deleted_cart() {
        let api = backend();
        let storage = MemoryCartIdStorage::new();
        let mut store = store(&api, &storage);
        let cart_id = store.add_item(&ProductId::new("p_rice"), 1).await.unwrap().id.clone();
        api.delete_cart(&cart_id);

        let err = store.refresh_cart().await.unwrap_err();

        assert!(matches!(err, CartError::Api(ApiError::NotFound(_))));
        assert!(store.cart().is_none());
        assert_eq!(storage.peek(GUEST_CART_KEY), None);
        let fresh = store.ensure_cart_exists().await.unwrap();
        assert_ne!(fresh, cart_id);
    }

    #[tokio::test]
    async fn test_checkout_succeeds_when_storage_cleanup_fails() {
        let api = backend();
        let storage = BrokenStorage {
            inner: MemoryCartIdStorage::new(),
            broken_get: false,
            broken_remove: true,
        };
        let mut store = CartStore::new(api.clone(), storage.clone(), CartIdentity::Guest);
        let cart_id = store.add_item(&ProductId::new("p_rice"), 1).await.unwrap().id.clone();

        let result = store.checkout(&pickup_order()).await.unwrap();

        assert!(!result.order_number.is_empty());
        assert!(store.cart().is_none());
        assert!(store.error().is_none());
        assert!(api.cart(&cart_id).is_none());

        // The leftover id points at a retired cart and is replaced.
        assert_eq!(storage.inner.peek(GUEST_CART_KEY), Some(cart_id.to_string()));
        let cart = store.add_item(&ProductId::new("p_oil"), 1).await.unwrap();
        assert_ne!(cart.id, cart_id);
    }

    #[tokio::test]
    async fn test_signal_records_storage_failure() {
        let api = backend();
        let storage = BrokenStorage {
            inner: MemoryCartIdStorage::new(),
            broken_get: true,
            broken_remove: false,
        };
        let mut store = CartStore::new(api.clone(), storage, CartIdentity::Guest);

        let err = store.handle_signal(&SyncSignal::WindowFocused).await.unwrap_err();

        assert!(matches!(err, CartError::Storage(_)));
        assert_eq!(store.error(), Some(err.to_string().as_str()));
        assert!(api.calls().is_empty());
    }
}
