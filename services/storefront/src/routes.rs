//! Storefront routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    domain::checkout::IdempotencyKey,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{
        AddressRequest, AddressSlot, CheckoutQuery, CheckoutReceipt, OrderResponse,
        ProductActionQuery, ProductSearchQuery, RegistrationResponse, UserQuery,
    },
};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Create the router for the storefront service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users", post(register_user))
        .route("/address/addaddress", post(add_address))
        .route("/address/edithomeaddress", post(edit_home_address))
        .route("/address/editworkaddress", post(edit_work_address))
        .route("/address/deleteaddress", delete(delete_addresses))
        .route("/addtocart", post(add_to_cart))
        .route("/removeitem", delete(remove_item))
        .route("/cart", get(get_cart))
        .route("/cartcheckout", post(cart_checkout))
        .route("/instantbuy", post(instant_buy))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/users/productview", get(product_view))
        .route("/users/search", get(search_products))
        .merge(protected_routes)
        .with_state(state)
}

/// Parse a query-string id, reporting `<what> id is empty` when absent
fn parse_id(raw: Option<&str>, what: &str) -> ApiResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} id is empty", what)))?;

    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("{} id is invalid", what)))
}

/// The user id in the query must be the caller's own
fn authorize(user: &AuthUser, raw: Option<&str>) -> ApiResult<Uuid> {
    let user_id = parse_id(raw, "user")?;
    if user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(user_id)
}

fn idempotency_key(headers: &HeaderMap) -> ApiResult<Option<IdempotencyKey>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency key is not valid ASCII".to_string()))?;

    IdempotencyKey::parse(raw)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn address_body(body: Result<Json<AddressRequest>, JsonRejection>) -> ApiResult<AddressRequest> {
    body.map(|Json(request)| request)
        .map_err(|rejection| ApiError::NotAcceptable(rejection.body_text()))
}

fn order_response(receipt: CheckoutReceipt) -> impl IntoResponse {
    let (status, message) = if receipt.replayed {
        (StatusCode::OK, "Order already placed")
    } else {
        (StatusCode::CREATED, "Successfully placed the order")
    };

    (
        status,
        Json(OrderResponse {
            message: message.to_string(),
            order: receipt.order,
            replayed: receipt.replayed,
        }),
    )
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "storefront"
    }))
}

/// List every catalog product
pub async fn product_view(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let products = state.catalog.find_products("").await?;
    Ok(Json(products))
}

/// Search catalog products by name
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<ProductSearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("search query is empty".to_string()))?;

    let products = state.catalog.find_products(name.trim()).await?;
    Ok(Json(products))
}

/// Provision the caller's user document
pub async fn register_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let created = state.accounts.register(user.id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(RegistrationResponse {
            user_id: user.id,
            created,
        }),
    ))
}

pub async fn add_address(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UserQuery>,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let user_id = authorize(&user, query.id.as_deref())?;
    let request = address_body(body)?;

    let address = state.address_book.add_address(user_id, &request).await?;

    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn edit_home_address(
    state: State<AppState>,
    user: Extension<AuthUser>,
    query: Query<UserQuery>,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    edit_address(state, user, query, body, AddressSlot::Home).await
}

pub async fn edit_work_address(
    state: State<AppState>,
    user: Extension<AuthUser>,
    query: Query<UserQuery>,
    body: Result<Json<AddressRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    edit_address(state, user, query, body, AddressSlot::Work).await
}

async fn edit_address(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UserQuery>,
    body: Result<Json<AddressRequest>, JsonRejection>,
    slot: AddressSlot,
) -> ApiResult<impl IntoResponse> {
    let user_id = authorize(&user, query.id.as_deref())?;
    let request = address_body(body)?;

    let address = state
        .address_book
        .edit_address(user_id, slot, &request)
        .await?;

    Ok(Json(address))
}

pub async fn delete_addresses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    let user_id = authorize(&user, query.id.as_deref())?;

    state.address_book.delete_all_addresses(user_id).await?;

    Ok(Json(json!({"message": "Successfully deleted"})))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProductActionQuery>,
) -> ApiResult<impl IntoResponse> {
    let product_id = parse_id(query.id.as_deref(), "product")?;
    let user_id = authorize(&user, query.user_id.as_deref())?;

    let line = state.cart.add_to_cart(user_id, product_id).await?;

    Ok(Json(json!({
        "message": "Successfully added to the cart",
        "line": line,
    })))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProductActionQuery>,
) -> ApiResult<impl IntoResponse> {
    let line_id = parse_id(query.id.as_deref(), "product")?;
    let user_id = authorize(&user, query.user_id.as_deref())?;

    let removed = state.cart.remove_from_cart(user_id, line_id).await?;

    Ok(Json(json!({
        "message": "Successfully removed item from cart",
        "removed": removed,
    })))
}

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    let user_id = authorize(&user, query.id.as_deref())?;

    let cart = state.cart.get_cart(user_id).await?;

    Ok(Json(cart))
}

pub async fn cart_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CheckoutQuery>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let user_id = authorize(&user, query.user_id.as_deref())?;
    let key = idempotency_key(&headers)?;

    let receipt = state.checkout.checkout(user_id, key.as_ref()).await?;
    info!(%user_id, replayed = receipt.replayed, "Cart checkout handled");

    Ok(order_response(receipt))
}

pub async fn instant_buy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProductActionQuery>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let product_id = parse_id(query.id.as_deref(), "product")?;
    let user_id = authorize(&user, query.user_id.as_deref())?;
    let key = idempotency_key(&headers)?;

    let receipt = state
        .checkout
        .instant_buy(user_id, product_id, key.as_ref())
        .await?;

    Ok(order_response(receipt))
}
