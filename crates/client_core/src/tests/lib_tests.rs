use super::*;
use std::{collections::VecDeque, time::Duration};

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tokio::{net::TcpListener, sync::Mutex as AsyncMutex};

#[derive(Clone, Default)]
struct AdminServerState {
    products: Arc<AsyncMutex<Vec<Product>>>,
    list_queries: Arc<AsyncMutex<Vec<Option<String>>>>,
    list_fetches: Arc<AsyncMutex<u32>>,
    delete_calls: Arc<AsyncMutex<u32>>,
    fail_creates: Arc<AsyncMutex<bool>>,
    fail_deletes: Arc<AsyncMutex<bool>>,
    fail_brands: Arc<AsyncMutex<bool>>,
    create_delay: Arc<AsyncMutex<Option<Duration>>>,
    // Per-request canned list responses: (delay, payload). Once drained the
    // handler serves the live product list immediately.
    list_responses: Arc<AsyncMutex<VecDeque<(Duration, Vec<Product>)>>>,
    next_id: Arc<AsyncMutex<u32>>,
}

fn product(id: &str, name: &str, brand: &str, price: f64) -> Product {
    Product {
        id: ProductId::from(id),
        name: name.to_string(),
        brand: brand.to_string(),
        price,
        image: format!("https://example.test/{id}.jpg"),
        description: format!("{name} by {brand}"),
        original_price: None,
        rating: None,
        review_count: None,
        discount: None,
        article_number: None,
        country: None,
        code: None,
        in_stock: None,
    }
}

fn draft(name: &str, brand: &str, price: f64) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        brand: brand.to_string(),
        price,
        image: "https://example.test/new.jpg".to_string(),
        description: format!("{name} by {brand}"),
        original_price: None,
        rating: None,
        review_count: None,
        discount: None,
        article_number: None,
        country: None,
        code: None,
        in_stock: Some(true),
    }
}

async fn list_products_handler(
    State(state): State<AdminServerState>,
    RawQuery(query): RawQuery,
) -> Json<Vec<Product>> {
    state.list_queries.lock().await.push(query);
    *state.list_fetches.lock().await += 1;

    let canned = state.list_responses.lock().await.pop_front();
    if let Some((delay, products)) = canned {
        tokio::time::sleep(delay).await;
        return Json(products);
    }
    Json(state.products.lock().await.clone())
}

async fn list_brands_handler(
    State(state): State<AdminServerState>,
) -> Result<Json<Vec<String>>, StatusCode> {
    if *state.fail_brands.lock().await {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let mut brands: Vec<String> = state
        .products
        .lock()
        .await
        .iter()
        .map(|product| product.brand.clone())
        .collect();
    brands.dedup();
    Ok(Json(brands))
}

async fn create_product_handler(
    State(state): State<AdminServerState>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), StatusCode> {
    let delay = *state.create_delay.lock().await;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if *state.fail_creates.lock().await {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mut next_id = state.next_id.lock().await;
    *next_id += 1;
    let created = Product {
        id: ProductId(next_id.to_string()),
        name: draft.name,
        brand: draft.brand,
        price: draft.price,
        image: draft.image,
        description: draft.description,
        original_price: draft.original_price,
        rating: draft.rating,
        review_count: draft.review_count,
        discount: draft.discount,
        article_number: draft.article_number,
        country: draft.country,
        code: draft.code,
        in_stock: draft.in_stock,
    };
    state.products.lock().await.push(created.clone());
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_product_handler(
    State(state): State<AdminServerState>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, StatusCode> {
    let mut products = state.products.lock().await;
    let target = products
        .iter_mut()
        .find(|product| product.id.0 == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = patch.name {
        target.name = name;
    }
    if let Some(price) = patch.price {
        target.price = price;
    }
    if let Some(in_stock) = patch.in_stock {
        target.in_stock = Some(in_stock);
    }
    Ok(Json(target.clone()))
}

async fn delete_product_handler(
    State(state): State<AdminServerState>,
    Path(id): Path<String>,
) -> StatusCode {
    *state.delete_calls.lock().await += 1;
    if *state.fail_deletes.lock().await {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let mut products = state.products.lock().await;
    let before = products.len();
    products.retain(|product| product.id.0 != id);
    if products.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn spawn_admin_server(state: AdminServerState) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route(
            "/api/products",
            get(list_products_handler).post(create_product_handler),
        )
        .route(
            "/api/products/:id",
            axum::routing::put(update_product_handler).delete(delete_product_handler),
        )
        .route("/api/brands", get(list_brands_handler))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

#[derive(Default)]
struct RecordingNotifier {
    messages: AsyncMutex<Vec<String>>,
}

#[async_trait]
impl FailureNotifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().await.push(message.to_string());
    }
}

struct StaticConfirmation {
    accept: bool,
    calls: AsyncMutex<u32>,
}

impl StaticConfirmation {
    fn new(accept: bool) -> Self {
        Self {
            accept,
            calls: AsyncMutex::new(0),
        }
    }
}

#[async_trait]
impl DeleteConfirmation for StaticConfirmation {
    async fn confirm(&self, _id: &ProductId) -> bool {
        *self.calls.lock().await += 1;
        self.accept
    }
}

fn admin_session_with(
    server_url: String,
    notifier: Arc<RecordingNotifier>,
    confirmation: Arc<StaticConfirmation>,
) -> Arc<AdminSession> {
    AdminSession::with_dependencies(ProductGateway::new(server_url), notifier, confirmation)
}

#[tokio::test]
async fn create_success_closes_edit_surface_and_reloads_full_list() {
    let state = AdminServerState::default();
    let server_url = spawn_admin_server(state.clone()).await;
    let session = AdminSession::new(ProductGateway::new(server_url));
    let mut events = session.subscribe_events();

    let created = session
        .create(draft("Spark Plug", "NGK", 99.0))
        .await
        .expect("create");
    assert_eq!(created.id, ProductId::from("1"));

    assert_eq!(events.recv().await, Ok(SessionEvent::EditSurfaceClosed));
    assert_eq!(
        events.recv().await,
        Ok(SessionEvent::ProductsReloaded { count: 1 })
    );

    let products = session.products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Spark Plug");
    assert_eq!(session.mutation_phase().await, MutationPhase::Idle);
}

#[tokio::test]
async fn failed_create_notifies_and_leaves_loaded_state_untouched() {
    let state = AdminServerState::default();
    state
        .products
        .lock()
        .await
        .push(product("1", "Oil Filter", "Bosch", 249.0));
    let server_url = spawn_admin_server(state.clone()).await;

    let notifier = Arc::new(RecordingNotifier::default());
    let session = admin_session_with(
        server_url,
        notifier.clone(),
        Arc::new(StaticConfirmation::new(true)),
    );
    session.reload().await;
    let fetches_before = *state.list_fetches.lock().await;

    *state.fail_creates.lock().await = true;
    let err = session
        .create(draft("Spark Plug", "NGK", 99.0))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        MutationError::Transport(TransportError::CreateProduct(_))
    ));

    // No reload after a failed mutation; the prior list stays as-is.
    assert_eq!(*state.list_fetches.lock().await, fetches_before);
    let products = session.products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Oil Filter");

    let messages = notifier.messages.lock().await;
    assert_eq!(messages.as_slice(), ["failed to create product"]);

    // And the failed create added nothing server-side either.
    session.reload().await;
    assert_eq!(session.products().await.len(), 1);
}

#[tokio::test]
async fn update_submits_full_form_and_resynchronizes() {
    let state = AdminServerState::default();
    state
        .products
        .lock()
        .await
        .push(product("3", "Wiper Blade", "Valeo", 150.0));
    let server_url = spawn_admin_server(state.clone()).await;
    let session = AdminSession::new(ProductGateway::new(server_url));
    session.reload().await;

    let mut form = ProductPatch::from(session.products().await[0].clone());
    form.price = Some(135.0);
    session
        .update(&ProductId::from("3"), form)
        .await
        .expect("update");

    let products = session.products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].price, 135.0);
    assert_eq!(products[0].name, "Wiper Blade");
}

#[tokio::test]
async fn delete_without_confirmation_issues_no_network_call() {
    let state = AdminServerState::default();
    state
        .products
        .lock()
        .await
        .push(product("1", "Oil Filter", "Bosch", 249.0));
    let server_url = spawn_admin_server(state.clone()).await;

    let confirmation = Arc::new(StaticConfirmation::new(false));
    let session = admin_session_with(
        server_url,
        Arc::new(RecordingNotifier::default()),
        confirmation.clone(),
    );
    session.reload().await;

    let deleted = session
        .delete(&ProductId::from("1"))
        .await
        .expect("no-op delete");
    assert!(!deleted);

    assert_eq!(*confirmation.calls.lock().await, 1);
    assert_eq!(*state.delete_calls.lock().await, 0);
    assert_eq!(session.products().await.len(), 1);
    assert_eq!(session.mutation_phase().await, MutationPhase::Idle);
}

#[tokio::test]
async fn confirmed_delete_removes_the_product_and_reloads() {
    let state = AdminServerState::default();
    {
        let mut products = state.products.lock().await;
        products.push(product("1", "Oil Filter", "Bosch", 249.0));
        products.push(product("2", "Air Filter", "Mann", 199.0));
    }
    let server_url = spawn_admin_server(state.clone()).await;
    let session = admin_session_with(
        server_url,
        Arc::new(RecordingNotifier::default()),
        Arc::new(StaticConfirmation::new(true)),
    );
    session.reload().await;

    let deleted = session.delete(&ProductId::from("1")).await.expect("delete");
    assert!(deleted);

    let products = session.products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, ProductId::from("2"));
}

#[tokio::test]
async fn failed_delete_notifies_and_keeps_the_list() {
    let state = AdminServerState::default();
    state
        .products
        .lock()
        .await
        .push(product("1", "Oil Filter", "Bosch", 249.0));
    *state.fail_deletes.lock().await = true;
    let server_url = spawn_admin_server(state.clone()).await;

    let notifier = Arc::new(RecordingNotifier::default());
    let session = admin_session_with(
        server_url,
        notifier.clone(),
        Arc::new(StaticConfirmation::new(true)),
    );
    session.reload().await;

    let err = session
        .delete(&ProductId::from("1"))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        MutationError::Transport(TransportError::DeleteProduct(_))
    ));
    assert_eq!(session.products().await.len(), 1);
    assert_eq!(
        notifier.messages.lock().await.as_slice(),
        ["failed to delete product"]
    );
}

#[tokio::test]
async fn second_mutation_while_submitting_is_rejected() {
    let state = AdminServerState::default();
    *state.create_delay.lock().await = Some(Duration::from_millis(200));
    let server_url = spawn_admin_server(state).await;
    let session = AdminSession::new(ProductGateway::new(server_url));

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.create(draft("Spark Plug", "NGK", 99.0)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = session
        .create(draft("Air Filter", "Mann", 199.0))
        .await
        .expect_err("second submit must be rejected");
    assert!(matches!(err, MutationError::AlreadySubmitting));

    first.await.expect("join").expect("first create");
}

#[tokio::test]
async fn superseded_admin_reload_is_dropped() {
    let state = AdminServerState::default();
    {
        let mut responses = state.list_responses.lock().await;
        responses.push_back((
            Duration::from_millis(200),
            vec![product("old", "Stale Row", "Old", 1.0)],
        ));
        responses.push_back((
            Duration::ZERO,
            vec![product("new", "Fresh Row", "New", 2.0)],
        ));
    }
    let server_url = spawn_admin_server(state).await;
    let session = AdminSession::new(ProductGateway::new(server_url));

    let stale = {
        let session = session.clone();
        tokio::spawn(async move { session.reload().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.reload().await;
    stale.await.expect("join");

    let products = session.products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, ProductId::from("new"));
}

#[tokio::test]
async fn catalog_initial_load_fetches_products_and_brands() {
    let state = AdminServerState::default();
    {
        let mut products = state.products.lock().await;
        products.push(product("1", "Oil Filter", "Bosch", 249.0));
        products.push(product("2", "Air Filter", "Mann", 199.0));
    }
    let server_url = spawn_admin_server(state).await;
    let session = CatalogSession::new(ProductGateway::new(server_url));

    session.initial_load().await;

    assert_eq!(session.products().await.len(), 2);
    assert_eq!(
        session.brands().await,
        vec!["Bosch".to_string(), "Mann".to_string()]
    );
    assert!(!session.is_loading().await);
}

#[tokio::test]
async fn catalog_initial_load_failure_applies_neither_partial_result() {
    let state = AdminServerState::default();
    state
        .products
        .lock()
        .await
        .push(product("1", "Oil Filter", "Bosch", 249.0));
    *state.fail_brands.lock().await = true;
    let server_url = spawn_admin_server(state).await;

    let session = CatalogSession::new(ProductGateway::new(server_url));
    let mut events = session.subscribe_events();
    session.initial_load().await;

    // Products fetched fine, but the combined load failed, so nothing lands.
    assert!(session.products().await.is_empty());
    assert!(session.brands().await.is_empty());
    assert!(!session.is_loading().await);
    assert!(matches!(
        events.recv().await,
        Ok(SessionEvent::LoadFailed { .. })
    ));
}

#[tokio::test]
async fn catalog_criteria_changes_refetch_with_server_side_filters() {
    let state = AdminServerState::default();
    let server_url = spawn_admin_server(state.clone()).await;
    let session = CatalogSession::new(ProductGateway::new(server_url));

    session.set_brand(Some("Bosch")).await;
    session.set_search("oil").await;
    session.set_search("").await;

    let queries = state.list_queries.lock().await;
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0].as_deref(), Some("brand=Bosch"));
    assert_eq!(queries[1].as_deref(), Some("brand=Bosch&search=oil"));
    // Clearing the search drops the parameter instead of sending it empty.
    assert_eq!(queries[2].as_deref(), Some("brand=Bosch"));
}

#[tokio::test]
async fn catalog_detail_fetch_collapses_not_found_into_transport_error() {
    let server_url = spawn_admin_server(AdminServerState::default()).await;
    let session = CatalogSession::new(ProductGateway::new(server_url));

    let err = session
        .product_details(&ProductId::from("missing"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, TransportError::FetchProduct(_)));
}

#[tokio::test]
async fn admin_table_applies_local_filter_and_sort_over_the_snapshot() {
    let state = AdminServerState::default();
    {
        let mut products = state.products.lock().await;
        products.push(product("1", "Filter A", "Bosch", 100.0));
        products.push(product("2", "Filter B", "Mann", 50.0));
        products.push(product("3", "Brake Pad", "Ferodo", 420.0));
    }
    let server_url = spawn_admin_server(state).await;
    let session = AdminSession::new(ProductGateway::new(server_url));
    session.reload().await;

    session.set_search("filter").await;
    session.sort_by(SortField::Price).await;

    let visible = session.visible_products().await;
    assert_eq!(visible.len(), 2);
    assert_eq!(visible[0].id, ProductId::from("2"));
    assert_eq!(visible[1].id, ProductId::from("1"));

    // Sorting never affects which rows pass the filter.
    session.sort_by(SortField::Price).await;
    let descending = session.visible_products().await;
    assert_eq!(descending.len(), 2);
    assert_eq!(descending[0].id, ProductId::from("1"));
}
