//! JSON endpoints for the chat front end and the farmer notification service.
//!
//! - `POST /api/chat`: one client message, one reply
//! - `GET  /api/order-status?client_id=`: latest pending order for a client
//! - `GET  /api/order-status/darija?client_id=`: the same order as a Darija script

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use fellah_agent::runtime::{AgentRuntime, LineItemView, ProductRef};
use fellah_core::domain::client::ClientId;
use fellah_core::domain::order::PendingOrderView;
use fellah_core::errors::{ApplicationError, InterfaceError};
use fellah_core::flows::ConversationState;
use fellah_core::language::Language;
use fellah_core::notice::DarijaNotice;

const DEFAULT_CLIENT_ID: i64 = 1;
const NO_PENDING_ORDER: &str = "No confirmed orders found for this client.";

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub client_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub state: ConversationState,
    pub language: Language,
    pub detected_products: Vec<ProductRef>,
    pub current_product: Option<ProductRef>,
    pub product_orders: Vec<LineItemView>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusQuery {
    pub client_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/order-status", get(order_status))
        .route("/api/order-status/darija", get(darija_notice))
        .with_state(ApiState { runtime })
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let client_id = ClientId(body.client_id.unwrap_or(DEFAULT_CLIENT_ID));
    let language = body
        .language
        .as_deref()
        .unwrap_or(Language::French.as_str())
        .parse::<Language>()
        .map_err(|error| interface_error(ApplicationError::from(error), &correlation_id))?;

    let reply = state
        .runtime
        .process_message(client_id, &body.message, language)
        .await
        .map_err(|error| interface_error(error, &correlation_id))?;

    info!(
        event_name = "api.chat.replied",
        correlation_id = %correlation_id,
        client_id = client_id.0,
        state = %reply.state,
        "chat message handled"
    );

    Ok(Json(ChatResponse {
        response: reply.reply,
        state: reply.state,
        language: reply.language,
        detected_products: reply.detected_products,
        current_product: reply.current_product,
        product_orders: reply.line_items,
    }))
}

pub async fn order_status(
    State(state): State<ApiState>,
    Query(query): Query<OrderStatusQuery>,
) -> ApiResult<PendingOrderView> {
    let correlation_id = Uuid::new_v4().to_string();
    let client_id = required_client(query, &correlation_id)?;

    let view = state
        .runtime
        .latest_pending_order(client_id)
        .await
        .map_err(|error| interface_error(error, &correlation_id))?;
    view.map(Json).ok_or_else(|| not_found(&correlation_id))
}

pub async fn darija_notice(
    State(state): State<ApiState>,
    Query(query): Query<OrderStatusQuery>,
) -> ApiResult<DarijaNotice> {
    let correlation_id = Uuid::new_v4().to_string();
    let client_id = required_client(query, &correlation_id)?;

    let notice = state
        .runtime
        .darija_notice(client_id)
        .await
        .map_err(|error| interface_error(error, &correlation_id))?;
    notice.map(Json).ok_or_else(|| not_found(&correlation_id))
}

fn required_client(
    query: OrderStatusQuery,
    correlation_id: &str,
) -> Result<ClientId, (StatusCode, Json<ApiError>)> {
    query.client_id.map(ClientId).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                message: "client_id is required".to_string(),
                correlation_id: correlation_id.to_string(),
            }),
        )
    })
}

fn not_found(correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            message: NO_PENDING_ORDER.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn interface_error(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        status = status.as_u16(),
        error = %interface,
        "request failed"
    );
    (
        status,
        Json(ApiError {
            message: interface.user_message().to_string(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}
