use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    client::store::{StoreError, StorefrontStore},
    dto::{
        auth::{LoginRequest, LoginResponse},
        cart::{AddToCartRequest, CartList},
        orders::{CheckoutRequest, CheckoutResponse, GuestDetails},
        wishlist::{AddToWishlistRequest, WishlistList},
    },
    models::{PaymentMethod, Product},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("response carried no data")]
    EmptyResponse,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("guest checkout needs contact details")]
    GuestDetailsRequired,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    message: String,
}

/// HTTP side of the storefront. Guests only touch the local mirror; once a
/// session exists the server is the source of truth and the mirror is
/// refreshed after every write.
pub struct StorefrontClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    store: StorefrontStore,
}

impl StorefrontClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            store: StorefrontStore::new(),
        }
    }

    pub fn store(&self) -> &StorefrontStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StorefrontStore {
        &mut self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(body) => body.message,
                Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            return Err(ClientError::Api { status, message });
        }
        let envelope: Envelope<T> = response.json().await?;
        envelope.data.ok_or(ClientError::EmptyResponse)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    /// Authenticates, pushes the guest mirror to the server, then pulls the
    /// server cart and wishlist.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let login: LoginResponse = self
            .post(
                "/auth/login",
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        self.token = Some(login.token);
        self.store.set_user(Some(login.user));

        let guest_cart: Vec<(Uuid, i32)> = self
            .store
            .cart()
            .iter()
            .map(|line| (line.product.id, line.quantity))
            .collect();
        for (product_id, quantity) in guest_cart {
            let pushed: Result<serde_json::Value, _> = self
                .post("/cart", &AddToCartRequest { product_id, quantity })
                .await;
            if let Err(err) = pushed {
                tracing::warn!(%product_id, error = %err, "could not merge guest cart line");
            }
        }

        let guest_wishlist: Vec<Uuid> = self.store.wishlist().iter().map(|p| p.id).collect();
        for product_id in guest_wishlist {
            let pushed: Result<serde_json::Value, _> = self
                .post("/wishlist", &AddToWishlistRequest { product_id })
                .await;
            if let Err(err) = pushed {
                tracing::warn!(%product_id, error = %err, "could not merge guest wishlist entry");
            }
        }

        self.refresh().await
    }

    /// Pulls server cart and wishlist. No-op for guests.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        if self.token.is_none() {
            return Ok(());
        }
        let cart: CartList = self.send(self.http.get(self.url("/cart"))).await?;
        let wishlist: WishlistList = self.send(self.http.get(self.url("/wishlist"))).await?;
        self.store.replace_with_server(cart, wishlist);
        Ok(())
    }

    pub async fn add_to_cart(&mut self, product: Product, quantity: i32) -> Result<(), ClientError> {
        if self.token.is_none() {
            self.store.add_to_cart(product, quantity)?;
            return Ok(());
        }
        let _: serde_json::Value = self
            .post(
                "/cart",
                &AddToCartRequest {
                    product_id: product.id,
                    quantity,
                },
            )
            .await?;
        self.refresh().await
    }

    /// Returns whether the product is wishlisted afterwards.
    pub async fn toggle_wishlist(&mut self, product: Product) -> Result<bool, ClientError> {
        if self.token.is_none() {
            return Ok(self.store.toggle_wishlist(product));
        }
        let product_id = product.id;
        if self.store.is_wishlisted(product_id) {
            let _: serde_json::Value = self
                .send(self.http.delete(self.url(&format!("/wishlist/{product_id}"))))
                .await?;
        } else {
            let _: serde_json::Value = self
                .post("/wishlist", &AddToWishlistRequest { product_id })
                .await?;
        }
        self.refresh().await?;
        Ok(self.store.is_wishlisted(product_id))
    }

    /// Registered users check out their server cart; guests send the mirror.
    /// The local cart is cleared once the order is placed.
    pub async fn checkout(
        &mut self,
        shipping_address: &str,
        payment_method: PaymentMethod,
        guest: Option<GuestDetails>,
    ) -> Result<CheckoutResponse, ClientError> {
        let request = if self.token.is_some() {
            CheckoutRequest {
                shipping_address: shipping_address.to_string(),
                payment_method,
                guest: None,
                cart_items: Vec::new(),
            }
        } else {
            let guest = guest.ok_or(ClientError::GuestDetailsRequired)?;
            CheckoutRequest {
                shipping_address: shipping_address.to_string(),
                payment_method,
                guest: Some(guest),
                cart_items: self.store.guest_lines(),
            }
        };

        let placed: CheckoutResponse = self.post("/orders/checkout", &request).await?;
        self.store.clear_cart();
        Ok(placed)
    }

    /// Ends the session locally even when the server call fails.
    pub async fn logout(&mut self) {
        let result: Result<serde_json::Value, _> =
            self.post("/auth/logout", &serde_json::json!({})).await;
        if let Err(err) = result {
            tracing::debug!(error = %err, "logout request failed");
        }
        self.token = None;
        self.store.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = StorefrontClient::new("http://localhost:3000/");
        assert_eq!(client.url("/cart"), "http://localhost:3000/api/cart");
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn guest_mutations_stay_local() {
        let mut client = StorefrontClient::new("http://127.0.0.1:9");
        let product = Product {
            id: Uuid::new_v4(),
            name: "Bookshelf".into(),
            description: None,
            price: 12_000,
            stock_quantity: 2,
            category_id: None,
            image_url: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        client.add_to_cart(product.clone(), 2).await.unwrap();
        assert!(client.toggle_wishlist(product.clone()).await.unwrap());
        client.refresh().await.unwrap();

        assert_eq!(client.store().cart_count(), 2);
        assert!(client.store().is_wishlisted(product.id));
    }

    #[tokio::test]
    async fn guest_checkout_requires_contact_details() {
        let mut client = StorefrontClient::new("http://127.0.0.1:9");
        let err = client
            .checkout("Bole, Addis Ababa", PaymentMethod::CashOnDelivery, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::GuestDetailsRequired));
    }
}
