//! Remote product gateway: translates domain operations into HTTP calls
//! against the catalog REST API.
//!
//! Every operation is a single attempt with no retry, timeout, or backoff;
//! a failed response surfaces immediately as a [`TransportError`]. Reads are
//! idempotent, create is not (repeated calls create duplicates), and deleting
//! an already-deleted id fails rather than succeeding silently.

use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::domain::{Product, ProductDraft, ProductId, ProductPatch, ProductQuery};
use thiserror::Error;
use tracing::debug;

/// Production API endpoint, fixed at build time. Binaries expose a flag to
/// override it; tests point at a local mock server.
pub const DEFAULT_API_URL: &str = "https://auto-parts-server-test.up.railway.app/api";

/// The only error kind this layer distinguishes: any non-success status or
/// network-level failure, tagged with the operation that produced it. A
/// missing product and an unreachable server collapse into the same kind;
/// callers cannot tell them apart here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to fetch products")]
    FetchProducts(#[source] reqwest::Error),
    #[error("failed to fetch product")]
    FetchProduct(#[source] reqwest::Error),
    #[error("failed to fetch brands")]
    FetchBrands(#[source] reqwest::Error),
    #[error("failed to create product")]
    CreateProduct(#[source] reqwest::Error),
    #[error("failed to update product")]
    UpdateProduct(#[source] reqwest::Error),
    #[error("failed to delete product")]
    DeleteProduct(#[source] reqwest::Error),
}

#[derive(Clone)]
pub struct ProductGateway {
    http: Client,
    base_url: String,
}

impl Default for ProductGateway {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ProductGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Lists products, with filtering delegated to the server. Unset query
    /// dimensions are omitted from the URL entirely.
    pub async fn list_products(
        &self,
        query: &ProductQuery,
    ) -> Result<Vec<Product>, TransportError> {
        debug!(?query, "listing products");
        let request = self
            .http
            .get(format!("{}/products", self.base_url))
            .query(query);
        Self::fetch_json(request, TransportError::FetchProducts).await
    }

    pub async fn get_product(&self, id: &ProductId) -> Result<Product, TransportError> {
        debug!(product_id = %id, "fetching product");
        let request = self.http.get(format!("{}/products/{id}", self.base_url));
        Self::fetch_json(request, TransportError::FetchProduct).await
    }

    pub async fn list_brands(&self) -> Result<Vec<String>, TransportError> {
        debug!("listing brands");
        let request = self.http.get(format!("{}/brands", self.base_url));
        Self::fetch_json(request, TransportError::FetchBrands).await
    }

    /// Persists a new product server-side; the response carries the
    /// server-assigned id.
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, TransportError> {
        debug!(name = %draft.name, "creating product");
        let request = self
            .http
            .post(format!("{}/products", self.base_url))
            .json(draft);
        Self::fetch_json(request, TransportError::CreateProduct).await
    }

    /// Partial update: only the supplied attributes change server-side.
    pub async fn update_product(
        &self,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, TransportError> {
        debug!(product_id = %id, "updating product");
        let request = self
            .http
            .put(format!("{}/products/{id}", self.base_url))
            .json(patch);
        Self::fetch_json(request, TransportError::UpdateProduct).await
    }

    /// Removes the product by id. The response body, if any, is ignored.
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), TransportError> {
        debug!(product_id = %id, "deleting product");
        self.http
            .delete(format!("{}/products/{id}", self.base_url))
            .send()
            .await
            .map_err(TransportError::DeleteProduct)?
            .error_for_status()
            .map_err(TransportError::DeleteProduct)?;
        Ok(())
    }

    async fn fetch_json<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
        wrap: fn(reqwest::Error) -> TransportError,
    ) -> Result<T, TransportError> {
        request
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?
            .json()
            .await
            .map_err(wrap)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
