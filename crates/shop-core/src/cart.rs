//! # Cart Store
//!
//! Keyed collection of line items with derived totals. State lives in an
//! explicit container with a defined update API; persistence is a
//! pluggable storage adapter behind a narrow interface.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fixed persistence namespace for the cart store
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// A single entry in the cart, keyed by product id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product ID (uniqueness key)
    pub id: String,

    /// Product name (denormalized for display)
    pub name: String,

    /// Unit price, decimal
    pub price: f64,

    /// Quantity, always >= 1 (quantity < 1 removes the entry)
    pub quantity: u32,

    /// Optional image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A cart entry as supplied by callers of `add_item` (no quantity yet)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Cart contents plus derived totals.
///
/// `total_items` and `total_price` are always recomputed from `items`
/// and never mutated independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub total_items: u32,
    pub total_price: f64,
}

impl CartState {
    fn recompute(&mut self) {
        self.total_items = self.items.iter().map(|i| i.quantity).sum();
        self.total_price = self
            .items
            .iter()
            .map(|i| i.price * i.quantity as f64)
            .sum();
    }
}

/// The cart store: mutation API over a `CartState`
#[derive(Debug, Clone, Default)]
pub struct Cart {
    state: CartState,
}

impl Cart {
    /// Create an empty cart
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cart from previously persisted state. Totals are
    /// recomputed from the items rather than trusted from storage.
    pub fn from_state(mut state: CartState) -> Self {
        state.recompute();
        Self { state }
    }

    /// Current state (items plus derived totals)
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Sum of quantities across all entries
    pub fn total_items(&self) -> u32 {
        self.state.total_items
    }

    /// Sum of price x quantity across all entries
    pub fn total_price(&self) -> f64 {
        self.state.total_price
    }

    /// Add an entry. An existing entry with the same id has its quantity
    /// incremented by 1; otherwise the entry is inserted with quantity 1.
    pub fn add_item(&mut self, entry: CartEntry) {
        match self.state.items.iter_mut().find(|i| i.id == entry.id) {
            Some(existing) => existing.quantity += 1,
            None => self.state.items.push(CartItem {
                id: entry.id,
                name: entry.name,
                price: entry.price,
                quantity: 1,
                image: entry.image,
            }),
        }
        self.state.recompute();
    }

    /// Remove the entry with the given id; no-op when absent.
    pub fn remove_item(&mut self, id: &str) {
        self.state.items.retain(|i| i.id != id);
        self.state.recompute();
    }

    /// Set the quantity for an entry exactly. `quantity < 1` removes the
    /// entry instead of storing a non-positive count. No upper bound is
    /// enforced beyond the stored width; larger values saturate.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity < 1 {
            return self.remove_item(id);
        }
        if let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) {
            item.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
        self.state.recompute();
    }

    /// Empty the cart and zero the totals
    pub fn clear(&mut self) {
        self.state.items.clear();
        self.state.recompute();
    }
}

/// Narrow persistence interface for cart state.
///
/// No server-side sync and no conflict resolution: two writers racing on
/// the same store resolve as last-write-wins at the storage layer.
pub trait CartStorage: Send + Sync {
    /// Load the persisted state, or `None` when nothing was saved yet
    fn load(&self) -> ShopResult<Option<CartState>>;

    /// Persist the full state, replacing any previous snapshot
    fn save(&self, state: &CartState) -> ShopResult<()>;
}

/// JSON file adapter, keyed by the fixed `cart-storage` namespace under
/// a base directory.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            path: base_dir.as_ref().join(format!("{CART_STORAGE_KEY}.json")),
        }
    }
}

impl CartStorage for JsonFileStorage {
    fn load(&self) -> ShopResult<Option<CartState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ShopError::upstream("cart-storage", e.to_string())),
        };
        let state = serde_json::from_str(&raw)
            .map_err(|e| ShopError::Serialization(format!("cart state: {e}")))?;
        Ok(Some(state))
    }

    fn save(&self, state: &CartState) -> ShopResult<()> {
        let raw = serde_json::to_string(state)
            .map_err(|e| ShopError::Serialization(format!("cart state: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| ShopError::upstream("cart-storage", e.to_string()))
    }
}

/// In-memory adapter for tests
#[derive(Default)]
pub struct MemoryStorage {
    state: std::sync::Mutex<Option<CartState>>,
}

impl CartStorage for MemoryStorage {
    fn load(&self) -> ShopResult<Option<CartState>> {
        Ok(self.state.lock().expect("cart storage lock").clone())
    }

    fn save(&self, state: &CartState) -> ShopResult<()> {
        *self.state.lock().expect("cart storage lock") = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, price: f64) -> CartEntry {
        CartEntry {
            id: id.to_string(),
            name: format!("Product {id}"),
            price,
            image: None,
        }
    }

    #[test]
    fn test_add_item_increments_existing() {
        let mut cart = Cart::new();
        cart.add_item(entry("1", 14.99));
        cart.add_item(entry("1", 14.99));
        cart.add_item(entry("2", 5.00));

        assert_eq!(cart.state().items.len(), 2);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), 14.99 * 2.0 + 5.00);
    }

    #[test]
    fn test_each_id_appears_at_most_once() {
        let mut cart = Cart::new();
        for _ in 0..5 {
            cart.add_item(entry("1", 10.0));
        }
        cart.add_item(entry("2", 1.0));

        let ids: Vec<_> = cart.state().items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(cart.total_items(), 6);
    }

    #[test]
    fn test_update_quantity_sets_exactly() {
        let mut cart = Cart::new();
        cart.add_item(entry("1", 10.0));
        cart.update_quantity("1", 7);

        assert_eq!(cart.total_items(), 7);
        assert_eq!(cart.total_price(), 70.0);
    }

    #[test]
    fn test_update_quantity_saturates_at_stored_width() {
        let mut cart = Cart::new();
        cart.add_item(entry("1", 10.0));
        cart.update_quantity("1", u32::MAX as i64 + 2);

        assert_eq!(cart.state().items[0].quantity, u32::MAX);
    }

    #[test]
    fn test_update_quantity_below_one_removes() {
        let mut cart = Cart::new();
        cart.add_item(entry("1", 10.0));
        cart.update_quantity("1", 0);
        assert!(cart.state().items.is_empty());

        cart.add_item(entry("1", 10.0));
        cart.update_quantity("1", -1);
        assert!(cart.state().items.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), 0.0);
    }

    #[test]
    fn test_remove_absent_id_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(entry("1", 10.0));
        cart.remove_item("does-not-exist");

        assert_eq!(cart.state().items.len(), 1);
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_clear_zeroes_totals() {
        let mut cart = Cart::new();
        cart.add_item(entry("1", 10.0));
        cart.add_item(entry("2", 20.0));
        cart.update_quantity("2", 4);

        cart.clear();
        assert!(cart.state().items.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), 0.0);
    }

    #[test]
    fn test_from_state_recomputes_totals() {
        // Persisted totals are not trusted
        let state = CartState {
            items: vec![CartItem {
                id: "1".into(),
                name: "P".into(),
                price: 2.5,
                quantity: 4,
                image: None,
            }],
            total_items: 99,
            total_price: 999.0,
        };
        let cart = Cart::from_state(state);
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.total_price(), 10.0);
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::default();
        assert!(storage.load().unwrap().is_none());

        let mut cart = Cart::new();
        cart.add_item(entry("1", 3.0));
        storage.save(cart.state()).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(&loaded, cart.state());
    }

    #[test]
    fn test_json_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        assert!(storage.load().unwrap().is_none());

        let mut cart = Cart::new();
        cart.add_item(entry("1", 14.99));
        storage.save(cart.state()).unwrap();

        let restored = Cart::from_state(storage.load().unwrap().unwrap());
        assert_eq!(restored.total_items(), 1);
        assert_eq!(restored.total_price(), 14.99);
    }

    #[test]
    fn test_last_write_wins() {
        let storage = MemoryStorage::default();

        let mut first = Cart::new();
        first.add_item(entry("1", 1.0));
        storage.save(first.state()).unwrap();

        let mut second = Cart::new();
        second.add_item(entry("2", 2.0));
        storage.save(second.state()).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.items[0].id, "2");
    }
}
