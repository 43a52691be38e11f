use thiserror::Error;
use uuid::Uuid;

use crate::{
    dto::{
        cart::CartList,
        orders::GuestCartLine,
        wishlist::WishlistList,
    },
    models::{Product, User},
    pricing::{OrderQuote, PricedLine, PricingRules},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Only {available} left in stock")]
    InsufficientStock { available: i32 },

    #[error("Product is not in the cart")]
    NotInCart,
}

#[derive(Debug, Clone)]
pub struct CartLine {
    /// Server cart item id; `None` while the line only exists locally.
    pub item_id: Option<Uuid>,
    pub product: Product,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total(&self) -> i64 {
        self.product.price * i64::from(self.quantity)
    }
}

/// Session user plus cart and wishlist mirrors. Every method here is local;
/// syncing is done by [`super::StorefrontClient`].
#[derive(Debug, Default, Clone)]
pub struct StorefrontStore {
    user: Option<User>,
    cart: Vec<CartLine>,
    wishlist: Vec<Product>,
}

impl StorefrontStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub fn cart(&self) -> &[CartLine] {
        &self.cart
    }

    pub fn wishlist(&self) -> &[Product] {
        &self.wishlist
    }

    /// Adds `quantity` of a product, merging with an existing line. The merged
    /// quantity may not exceed the product's stock.
    pub fn add_to_cart(&mut self, product: Product, quantity: i32) -> Result<(), StoreError> {
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity);
        }
        let available = product.stock_quantity;

        match self.cart.iter_mut().find(|line| line.product.id == product.id) {
            Some(line) => {
                let merged = line.quantity.saturating_add(quantity);
                if merged > available {
                    return Err(StoreError::InsufficientStock { available });
                }
                line.quantity = merged;
                line.product = product;
            }
            None => {
                if quantity > available {
                    return Err(StoreError::InsufficientStock { available });
                }
                self.cart.push(CartLine {
                    item_id: None,
                    product,
                    quantity,
                });
            }
        }
        Ok(())
    }

    /// Sets a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) -> Result<(), StoreError> {
        if quantity <= 0 {
            return self.remove_from_cart(product_id);
        }
        let line = self
            .cart
            .iter_mut()
            .find(|line| line.product.id == product_id)
            .ok_or(StoreError::NotInCart)?;
        if quantity > line.product.stock_quantity {
            return Err(StoreError::InsufficientStock {
                available: line.product.stock_quantity,
            });
        }
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_from_cart(&mut self, product_id: Uuid) -> Result<(), StoreError> {
        let before = self.cart.len();
        self.cart.retain(|line| line.product.id != product_id);
        if self.cart.len() == before {
            return Err(StoreError::NotInCart);
        }
        Ok(())
    }

    pub fn cart_line(&self, product_id: Uuid) -> Option<&CartLine> {
        self.cart.iter().find(|line| line.product.id == product_id)
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    /// Returns whether the product is wishlisted after the toggle.
    pub fn toggle_wishlist(&mut self, product: Product) -> bool {
        if self.is_wishlisted(product.id) {
            self.wishlist.retain(|entry| entry.id != product.id);
            false
        } else {
            self.wishlist.push(product);
            true
        }
    }

    pub fn is_wishlisted(&self, product_id: Uuid) -> bool {
        self.wishlist.iter().any(|entry| entry.id == product_id)
    }

    /// Sum of price x quantity over the cart.
    pub fn cart_total(&self) -> i64 {
        self.cart.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities over the cart.
    pub fn cart_count(&self) -> i64 {
        self.cart.iter().map(|line| i64::from(line.quantity)).sum()
    }

    pub fn quote(&self, rules: &PricingRules) -> OrderQuote {
        let lines: Vec<PricedLine> = self
            .cart
            .iter()
            .map(|line| PricedLine {
                unit_price: line.product.price,
                quantity: line.quantity,
            })
            .collect();
        rules.quote(&lines)
    }

    /// Lines as sent with a guest checkout.
    pub fn guest_lines(&self) -> Vec<GuestCartLine> {
        self.cart
            .iter()
            .map(|line| GuestCartLine {
                product_id: line.product.id,
                quantity: line.quantity,
            })
            .collect()
    }

    /// Replaces both mirrors with server state.
    pub fn replace_with_server(&mut self, cart: CartList, wishlist: WishlistList) {
        self.cart = cart
            .items
            .into_iter()
            .map(|item| CartLine {
                item_id: Some(item.id),
                product: item.product,
                quantity: item.quantity,
            })
            .collect();
        self.wishlist = wishlist.items.into_iter().map(|entry| entry.product).collect();
    }

    /// Drops the session user and both mirrors.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(price: i64, stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Oak Chair".into(),
            description: None,
            price,
            stock_quantity: stock,
            category_id: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn adding_twice_merges_into_one_line() {
        let mut store = StorefrontStore::new();
        let chair = product(1_000, 10);
        store.add_to_cart(chair.clone(), 2).unwrap();
        store.add_to_cart(chair.clone(), 3).unwrap();

        assert_eq!(store.cart().len(), 1);
        assert_eq!(store.cart_line(chair.id).unwrap().quantity, 5);
        assert_eq!(store.cart_total(), 5_000);
        assert_eq!(store.cart_count(), 5);
    }

    #[test]
    fn merged_quantity_is_capped_by_stock() {
        let mut store = StorefrontStore::new();
        let chair = product(1_000, 3);
        store.add_to_cart(chair.clone(), 2).unwrap();

        let err = store.add_to_cart(chair.clone(), 2).unwrap_err();
        assert_eq!(err, StoreError::InsufficientStock { available: 3 });
        assert_eq!(store.cart_line(chair.id).unwrap().quantity, 2);
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let mut store = StorefrontStore::new();
        assert_eq!(
            store.add_to_cart(product(100, 5), 0),
            Err(StoreError::InvalidQuantity)
        );
        assert!(store.cart().is_empty());
    }

    #[test]
    fn update_to_zero_removes_line() {
        let mut store = StorefrontStore::new();
        let table = product(5_000, 4);
        store.add_to_cart(table.clone(), 1).unwrap();

        store.update_quantity(table.id, 4).unwrap();
        assert_eq!(store.cart_count(), 4);

        store.update_quantity(table.id, 0).unwrap();
        assert!(store.cart().is_empty());
        assert_eq!(
            store.remove_from_cart(table.id),
            Err(StoreError::NotInCart)
        );
    }

    #[test]
    fn toggle_wishlist_adds_then_removes() {
        let mut store = StorefrontStore::new();
        let sofa = product(90_000, 1);

        assert!(store.toggle_wishlist(sofa.clone()));
        assert!(store.is_wishlisted(sofa.id));
        assert!(!store.toggle_wishlist(sofa.clone()));
        assert!(store.wishlist().is_empty());
    }

    #[test]
    fn quote_applies_bulk_discount_and_shipping() {
        let mut store = StorefrontStore::new();
        store.add_to_cart(product(1_000, 10), 4).unwrap();

        let quote = store.quote(&PricingRules::default());
        assert_eq!(quote.subtotal, 4_000);
        assert_eq!(quote.discount_amount, 600);
        assert_eq!(quote.shipping_fee, 4_999);
        assert_eq!(quote.total_amount, 4_000 - 600 + 4_999);
    }

    #[test]
    fn guest_lines_mirror_cart() {
        let mut store = StorefrontStore::new();
        let lamp = product(2_500, 9);
        store.add_to_cart(lamp.clone(), 2).unwrap();

        let lines = store.guest_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, lamp.id);
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = StorefrontStore::new();
        store.add_to_cart(product(100, 1), 1).unwrap();
        store.toggle_wishlist(product(100, 1));
        store.reset();

        assert!(!store.is_authenticated());
        assert!(store.cart().is_empty());
        assert!(store.wishlist().is_empty());
    }
}
