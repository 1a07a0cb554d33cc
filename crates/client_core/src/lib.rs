//! Client-side session state over the product gateway.
//!
//! Two sessions own the Query State of the two screens: [`CatalogSession`]
//! (storefront, filtering delegated to the server) and [`AdminSession`]
//! (admin table, full unfiltered fetch with local filter/sort plus the
//! mutation coordinator). Both publish [`SessionEvent`]s so a presentation
//! layer can react without reaching into session internals.
//!
//! Every (re)load carries a generation number taken before the network wait;
//! a response whose generation is no longer current is dropped instead of
//! applied, so a superseded fetch can never overwrite newer state.

use std::sync::Arc;

use async_trait::async_trait;
use gateway::{ProductGateway, TransportError};
use shared::domain::{Product, ProductDraft, ProductId, ProductPatch, ProductQuery};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod view;

use view::derive_view;
pub use view::{SortDirection, SortField, ViewSpec};

/// User-facing notification seam for write failures. The admin app installs
/// a console notifier; the default only logs.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn notify(&self, message: &str);
}

pub struct LoggingNotifier;

#[async_trait]
impl FailureNotifier for LoggingNotifier {
    async fn notify(&self, message: &str) {
        warn!(error = message, "product mutation failed");
    }
}

/// Confirmation seam for deletes. Without an interactive surface no delete
/// is ever confirmed, so the default is a safe no-op.
#[async_trait]
pub trait DeleteConfirmation: Send + Sync {
    async fn confirm(&self, id: &ProductId) -> bool;
}

pub struct DenyAllConfirmation;

#[async_trait]
impl DeleteConfirmation for DenyAllConfirmation {
    async fn confirm(&self, _id: &ProductId) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ProductsReloaded { count: usize },
    BrandsLoaded { count: usize },
    LoadFailed { message: String },
    EditSurfaceClosed,
    MutationFailed { operation: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("another mutation is already in flight")]
    AlreadySubmitting,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Mutation state machine phase. One attempt at a time; outcomes land as
/// events and the phase always returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPhase {
    #[default]
    Idle,
    Submitting,
}

#[derive(Default)]
struct CatalogState {
    products: Vec<Product>,
    brands: Vec<String>,
    search: String,
    selected_brand: Option<String>,
    loading: bool,
    load_generation: u64,
}

/// Storefront Query State: the loaded product list plus the brand/search
/// criteria that produced it. Filtering is the server's job here.
pub struct CatalogSession {
    gateway: ProductGateway,
    inner: Mutex<CatalogState>,
    events: broadcast::Sender<SessionEvent>,
}

impl CatalogSession {
    pub fn new(gateway: ProductGateway) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            gateway,
            inner: Mutex::new(CatalogState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Loads the unfiltered product list and the brand list concurrently.
    /// If either request fails the combined load fails and neither partial
    /// result is applied; previously loaded state stays intact.
    pub async fn initial_load(&self) {
        let generation = self.begin_load().await;
        let default_query = ProductQuery::default();
        let loaded = tokio::try_join!(
            self.gateway.list_products(&default_query),
            self.gateway.list_brands(),
        );

        let mut state = self.inner.lock().await;
        if state.load_generation != generation {
            info!(generation, "dropping superseded catalog load");
            return;
        }
        state.loading = false;
        match loaded {
            Ok((products, brands)) => {
                let _ = self.events.send(SessionEvent::ProductsReloaded {
                    count: products.len(),
                });
                let _ = self
                    .events
                    .send(SessionEvent::BrandsLoaded { count: brands.len() });
                state.products = products;
                state.brands = brands;
            }
            Err(err) => {
                warn!(error = %err, "initial catalog load failed");
                let _ = self.events.send(SessionEvent::LoadFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    pub async fn set_search(&self, search: &str) {
        self.inner.lock().await.search = search.to_string();
        self.refresh().await;
    }

    pub async fn set_brand(&self, brand: Option<&str>) {
        self.inner.lock().await.selected_brand = brand.map(str::to_string);
        self.refresh().await;
    }

    /// Re-fetches the product list with the current criteria. Blank criteria
    /// turn into omitted query parameters.
    pub async fn refresh(&self) {
        let (generation, query) = {
            let mut state = self.inner.lock().await;
            state.load_generation += 1;
            state.loading = true;
            (
                state.load_generation,
                ProductQuery::new(state.selected_brand.as_deref(), Some(&state.search)),
            )
        };

        let loaded = self.gateway.list_products(&query).await;

        let mut state = self.inner.lock().await;
        if state.load_generation != generation {
            info!(generation, "dropping superseded product refresh");
            return;
        }
        state.loading = false;
        match loaded {
            Ok(products) => {
                let _ = self.events.send(SessionEvent::ProductsReloaded {
                    count: products.len(),
                });
                state.products = products;
            }
            Err(err) => {
                warn!(error = %err, "product refresh failed");
                let _ = self.events.send(SessionEvent::LoadFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    /// Detail-screen fetch. Not-found and transport failures arrive as the
    /// same error kind; the caller renders both as "not found".
    pub async fn product_details(&self, id: &ProductId) -> Result<Product, TransportError> {
        self.gateway.get_product(id).await
    }

    pub async fn products(&self) -> Vec<Product> {
        self.inner.lock().await.products.clone()
    }

    pub async fn brands(&self) -> Vec<String> {
        self.inner.lock().await.brands.clone()
    }

    pub async fn search(&self) -> String {
        self.inner.lock().await.search.clone()
    }

    pub async fn selected_brand(&self) -> Option<String> {
        self.inner.lock().await.selected_brand.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }

    async fn begin_load(&self) -> u64 {
        let mut state = self.inner.lock().await;
        state.load_generation += 1;
        state.loading = true;
        state.load_generation
    }
}

#[derive(Default)]
struct AdminState {
    products: Vec<Product>,
    view: ViewSpec,
    loading: bool,
    load_generation: u64,
    mutation: MutationPhase,
}

/// Admin Query State plus the mutation coordinator. The table always works
/// on the full unfiltered list; filter and sort happen locally so the same
/// snapshot that is mutated is the one being viewed.
pub struct AdminSession {
    gateway: ProductGateway,
    notifier: Arc<dyn FailureNotifier>,
    confirmation: Arc<dyn DeleteConfirmation>,
    inner: Mutex<AdminState>,
    events: broadcast::Sender<SessionEvent>,
}

impl AdminSession {
    pub fn new(gateway: ProductGateway) -> Arc<Self> {
        Self::with_dependencies(
            gateway,
            Arc::new(LoggingNotifier),
            Arc::new(DenyAllConfirmation),
        )
    }

    pub fn with_dependencies(
        gateway: ProductGateway,
        notifier: Arc<dyn FailureNotifier>,
        confirmation: Arc<dyn DeleteConfirmation>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            gateway,
            notifier,
            confirmation,
            inner: Mutex::new(AdminState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Full resynchronization: fetches the unfiltered list and replaces the
    /// whole snapshot. Read failures leave the previous list untouched.
    pub async fn reload(&self) {
        let generation = {
            let mut state = self.inner.lock().await;
            state.load_generation += 1;
            state.loading = true;
            state.load_generation
        };

        let loaded = self.gateway.list_products(&ProductQuery::default()).await;

        let mut state = self.inner.lock().await;
        if state.load_generation != generation {
            info!(generation, "dropping superseded admin reload");
            return;
        }
        state.loading = false;
        match loaded {
            Ok(products) => {
                let _ = self.events.send(SessionEvent::ProductsReloaded {
                    count: products.len(),
                });
                state.products = products;
            }
            Err(err) => {
                warn!(error = %err, "admin product reload failed");
                let _ = self.events.send(SessionEvent::LoadFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    /// Creates a product and, on success, closes the edit surface and
    /// resynchronizes. On failure the edit surface stays open, the user is
    /// notified, and nothing is reloaded.
    pub async fn create(&self, draft: ProductDraft) -> Result<Product, MutationError> {
        self.begin_mutation().await?;
        let result = self.gateway.create_product(&draft).await;
        self.complete_mutation("create", true, result).await
    }

    /// Updates a product with the full current form contents.
    pub async fn update(
        &self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<Product, MutationError> {
        self.begin_mutation().await?;
        let result = self.gateway.update_product(id, &patch).await;
        self.complete_mutation("update", true, result).await
    }

    /// Deletes a product after explicit confirmation. A declined
    /// confirmation means no state transition and no network call; the
    /// return value tells the caller whether anything happened.
    pub async fn delete(&self, id: &ProductId) -> Result<bool, MutationError> {
        if !self.confirmation.confirm(id).await {
            info!(product_id = %id, "delete not confirmed; skipping");
            return Ok(false);
        }
        self.begin_mutation().await?;
        let result = self.gateway.delete_product(id).await;
        self.complete_mutation("delete", false, result).await?;
        Ok(true)
    }

    pub async fn set_search(&self, query: &str) {
        self.inner.lock().await.view.search = query.to_string();
    }

    pub async fn sort_by(&self, field: SortField) {
        self.inner.lock().await.view.sort_by(field);
    }

    /// The rows the admin table renders: the loaded snapshot run through the
    /// derived-view engine with the active filter/sort spec.
    pub async fn visible_products(&self) -> Vec<Product> {
        let state = self.inner.lock().await;
        derive_view(&state.products, &state.view)
    }

    pub async fn products(&self) -> Vec<Product> {
        self.inner.lock().await.products.clone()
    }

    pub async fn view_spec(&self) -> ViewSpec {
        self.inner.lock().await.view.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }

    pub async fn mutation_phase(&self) -> MutationPhase {
        self.inner.lock().await.mutation
    }

    async fn begin_mutation(&self) -> Result<(), MutationError> {
        let mut state = self.inner.lock().await;
        if state.mutation == MutationPhase::Submitting {
            return Err(MutationError::AlreadySubmitting);
        }
        state.mutation = MutationPhase::Submitting;
        Ok(())
    }

    /// Shared tail of every mutation attempt: the phase returns to `Idle`,
    /// success closes the edit surface (when one is open) and triggers a
    /// full reload, failure notifies the user and leaves loaded state alone.
    async fn complete_mutation<T>(
        &self,
        operation: &'static str,
        closes_edit_surface: bool,
        result: Result<T, TransportError>,
    ) -> Result<T, MutationError> {
        self.inner.lock().await.mutation = MutationPhase::Idle;
        match result {
            Ok(value) => {
                info!(operation, "product mutation succeeded");
                if closes_edit_surface {
                    let _ = self.events.send(SessionEvent::EditSurfaceClosed);
                }
                self.reload().await;
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(operation, error = %message, "product mutation failed");
                self.notifier.notify(&message).await;
                let _ = self.events.send(SessionEvent::MutationFailed {
                    operation,
                    message,
                });
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
