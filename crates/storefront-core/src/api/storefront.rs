//! Typed storefront endpoints.
//!
//! Thin wrappers over [`AuthenticatedClient`]; session handling happens
//! underneath, so these read like plain calls.

use tracing::debug;

use crate::models::{
    Cart, CartItemInput, Category, CheckoutRequest, Order, Product, ProductPage, UserProfile,
    Warranty,
};

use super::{ApiError, AuthenticatedClient, RequestConfig};

/// Filters for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
}

impl ProductQuery {
    fn to_config(&self) -> RequestConfig {
        let mut config = RequestConfig::new();
        if let Some(ref keyword) = self.keyword {
            config = config.query("keyword", keyword);
        }
        if let Some(ref category) = self.category {
            config = config.query("category", category);
        }
        if let Some(page) = self.page {
            config = config.query("page", page);
        }
        config
    }
}

#[derive(Clone)]
pub struct StorefrontApi {
    client: AuthenticatedClient,
}

impl StorefrontApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn fetch_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let page: ProductPage = self.client.get("/products", Some(query.to_config())).await?;
        debug!(count = page.products.len(), page = page.page, pages = page.pages, "Fetched products");
        Ok(page)
    }

    pub async fn fetch_product(&self, product_id: &str) -> Result<Product, ApiError> {
        self.client.get(&format!("/products/{}", product_id), None).await
    }

    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.client.get("/categories", None).await
    }

    // ------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------

    pub async fn fetch_cart(&self) -> Result<Cart, ApiError> {
        self.client.get("/cart", None).await
    }

    pub async fn add_to_cart(&self, item: &CartItemInput) -> Result<Cart, ApiError> {
        self.client.post("/cart/items", Some(item), None).await
    }

    pub async fn update_cart_item(&self, item: &CartItemInput) -> Result<Cart, ApiError> {
        self.client
            .put(&format!("/cart/items/{}", item.product_id), Some(item), None)
            .await
    }

    pub async fn remove_cart_item(&self, product_id: &str) -> Result<Cart, ApiError> {
        self.client
            .delete(&format!("/cart/items/{}", product_id), None)
            .await
    }

    // ------------------------------------------------------------------
    // Checkout and history
    // ------------------------------------------------------------------

    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Order, ApiError> {
        self.client.post("/orders", Some(request), None).await
    }

    pub async fn fetch_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.client.get("/orders/mine", None).await
    }

    pub async fn fetch_order(&self, order_id: &str) -> Result<Order, ApiError> {
        self.client.get(&format!("/orders/{}", order_id), None).await
    }

    pub async fn fetch_warranties(&self) -> Result<Vec<Warranty>, ApiError> {
        self.client.get("/warranties/mine", None).await
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.client.get("/user/profile", None).await
    }
}
