//! WebSocket streams
//!
//! | 路径 | 说明 |
//! |------|------|
//! | /ws/orders | 新订单推送 (作为 offer owner) |
//! | /ws/orders/{id}/status | 订单状态变更 |
//! | /ws/orders/{id}/chat | 订单聊天 (先回放历史, 可直接发送 `{content}`) |
//! | /ws/notifications | 个人通知 |
//! | /ws/offers | 挂单上架/修改/下架 |
//!
//! 认证与 HTTP 相同 (`Authorization` 或 `?token=`)。订阅在升级前完成，
//! 非参与方直接得到 HTTP 错误而不是一个空连接。

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use shared::error::{AppError, AppResult};
use shared::models::{MessageCreate, OfferEvent};
use shared::order::OrderStreamEvent;

use crate::auth::CurrentClient;
use crate::broadcast::Subscription;
use crate::core::ServerState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Where inbound text frames on a chat stream are posted
struct ChatInbound {
    state: ServerState,
    client_id: String,
    order_id: String,
}

/// GET /ws/orders
pub async fn order_created_ws(
    State(state): State<ServerState>,
    client: CurrentClient,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let subscription = state.orders.subscribe_created(&client.id);
    ws.on_upgrade(move |socket| {
        pump(socket, client.id, subscription, encode_event, None)
    })
}

/// GET /ws/orders/{id}/status
pub async fn order_status_ws(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(order_id): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let subscription = state.orders.subscribe_status(&client.id, &order_id)?;
    Ok(ws.on_upgrade(move |socket| {
        pump(socket, client.id, subscription, encode_event, None)
    }))
}

/// GET /ws/orders/{id}/chat
pub async fn order_chat_ws(
    State(state): State<ServerState>,
    client: CurrentClient,
    Path(order_id): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let subscription = state.chat.subscribe(&client.id, &order_id).await?;
    let inbound = ChatInbound {
        state,
        client_id: client.id.clone(),
        order_id,
    };
    Ok(ws.on_upgrade(move |socket| {
        pump(socket, client.id, subscription, serde_json::to_string, Some(inbound))
    }))
}

/// GET /ws/notifications
pub async fn notifications_ws(
    State(state): State<ServerState>,
    client: CurrentClient,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let subscription = state.notifications.subscribe(&client.id)?;
    Ok(ws.on_upgrade(move |socket| {
        pump(socket, client.id, subscription, serde_json::to_string, None)
    }))
}

/// GET /ws/offers
pub async fn offers_ws(
    State(state): State<ServerState>,
    client: CurrentClient,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let subscription = state.offers.subscribe_feed();
    ws.on_upgrade(move |socket| {
        pump(socket, client.id, subscription, encode_offer_event, None)
    })
}

fn encode_offer_event(event: &Arc<OfferEvent>) -> serde_json::Result<String> {
    serde_json::to_string(event.as_ref())
}

fn encode_event(event: &Arc<OrderStreamEvent>) -> serde_json::Result<String> {
    serde_json::to_string(event.as_ref())
}

fn error_frame(err: AppError) -> Message {
    let frame = serde_json::json!({
        "type": "error",
        "code": err.code.code(),
        "message": err.message,
    });
    Message::Text(frame.to_string().into())
}

/// Forward subscription events to the socket until either side goes away.
///
/// The subscription is dropped on return, which unregisters it.
async fn pump<E, F>(
    socket: WebSocket,
    client_id: String,
    mut subscription: Subscription<E>,
    encode: F,
    inbound: Option<ChatInbound>,
) where
    E: Send + 'static,
    F: Fn(&E) -> serde_json::Result<String>,
{
    let key = subscription.key().to_string();
    tracing::info!(client_id = %client_id, stream = %key, "WebSocket connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(inbound) = &inbound
                            && let Some(reply) = handle_chat_frame(inbound, text.as_str()).await
                            && ws_sink.send(reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(client_id = %client_id, stream = %key, "WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            event = subscription.recv() => {
                let Some(event) = event else {
                    // 被 registry 剔除 (缓冲区满) 或服务关闭
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                };
                if !send_event(&mut ws_sink, &event, &encode).await {
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(client_id = %client_id, stream = %key, "WebSocket disconnected");
}

async fn send_event<E, F>(
    ws_sink: &mut SplitSink<WebSocket, Message>,
    event: &E,
    encode: &F,
) -> bool
where
    F: Fn(&E) -> serde_json::Result<String>,
{
    match encode(event) {
        Ok(json) => ws_sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode stream event: {e}");
            true
        }
    }
}

/// Post an inbound chat frame; returns an error frame to send back, if any.
///
/// The posted message itself comes back through the subscription.
async fn handle_chat_frame(inbound: &ChatInbound, text: &str) -> Option<Message> {
    let request: MessageCreate = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            return Some(error_frame(AppError::validation(format!(
                "Invalid chat frame: {e}"
            ))));
        }
    };

    match inbound
        .state
        .chat
        .post_message(&inbound.client_id, &inbound.order_id, request)
        .await
    {
        Ok(_) => None,
        Err(e) => Some(error_frame(e.into())),
    }
}
