//! WebSocket server for real-time loan updates and payment-due notices

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::loan::LoanEvent;

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for loan events
    pub tx: broadcast::Sender<LoanEvent>,
    /// Connected clients registry
    pub clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    /// Empty means every loan
    pub subscribed_loans: Vec<Uuid>,
}

impl ClientInfo {
    pub fn wants(&self, event: &LoanEvent) -> bool {
        self.subscribed_loans.is_empty() || self.subscribed_loans.contains(&event.loan_id())
    }
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { loan_ids: Vec<Uuid> },
    Unsubscribe { loan_ids: Vec<Uuid> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Event { event: LoanEvent },
    Subscribed { loan_ids: Vec<Uuid> },
    Unsubscribed { loan_ids: Vec<Uuid> },
    Pong,
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Broadcast a loan event to all connected clients
    pub async fn broadcast_event(&self, event: LoanEvent) {
        if self.tx.send(event).is_err() {
            // no connected clients
            tracing::debug!("Loan event dropped, no websocket subscribers");
        }
    }

    async fn register_client(&self, client_id: String) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id.clone(),
            ClientInfo {
                client_id,
                subscribed_loans: vec![],
            },
        );
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!("Client {} disconnected", client_id);
    }

    async fn update_subscriptions(&self, client_id: &str, loan_ids: Vec<Uuid>) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.subscribed_loans = loan_ids;
        }
    }
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(client_id.clone()).await;

    let (mut sender, mut receiver) = socket.split();

    // confirmations and pongs from the receive side
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let client_id_send = client_id.clone();
    let state_send = state.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = rx.recv() => {
                    let should_send = {
                        let clients = state_send.clients.read().await;
                        clients
                            .get(&client_id_send)
                            .map(|client| client.wants(&event))
                            .unwrap_or(false)
                    };

                    if should_send {
                        let msg = ServerMessage::Event { event };
                        if let Ok(text) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    let state_recv = state.clone();
    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) else {
                        tracing::debug!("Ignoring malformed message from client {}", client_id_recv);
                        continue;
                    };
                    match client_msg {
                        ClientMessage::Subscribe { loan_ids } => {
                            state_recv
                                .update_subscriptions(&client_id_recv, loan_ids.clone())
                                .await;
                            let _ = internal_tx.send(ServerMessage::Subscribed { loan_ids }).await;
                            tracing::info!("Client {} subscribed", client_id_recv);
                        }
                        ClientMessage::Unsubscribe { loan_ids } => {
                            let current = {
                                let clients = state_recv.clients.read().await;
                                clients.get(&client_id_recv).map(|client| {
                                    let mut current = client.subscribed_loans.clone();
                                    current.retain(|id| !loan_ids.contains(id));
                                    current
                                })
                            };
                            if let Some(current) = current {
                                state_recv
                                    .update_subscriptions(&client_id_recv, current)
                                    .await;
                            }
                            let _ = internal_tx
                                .send(ServerMessage::Unsubscribed { loan_ids })
                                .await;
                            tracing::info!("Client {} unsubscribed", client_id_recv);
                        }
                        ClientMessage::Ping => {
                            tracing::debug!("Ping from client {}", client_id_recv);
                            let _ = internal_tx.send(ServerMessage::Pong).await;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn recorded(loan_id: Uuid) -> LoanEvent {
        LoanEvent::PaymentRecorded {
            loan_id,
            payment_number: 1,
            amount: dec!(100),
        }
    }

    #[test]
    fn test_empty_subscription_receives_everything() {
        let client = ClientInfo {
            client_id: "a".to_string(),
            subscribed_loans: vec![],
        };
        assert!(client.wants(&recorded(Uuid::new_v4())));
    }

    #[test]
    fn test_subscription_filters_by_loan() {
        let wanted = Uuid::new_v4();
        let client = ClientInfo {
            client_id: "a".to_string(),
            subscribed_loans: vec![wanted],
        };
        assert!(client.wants(&recorded(wanted)));
        assert!(!client.wants(&recorded(Uuid::new_v4())));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let state = WsState::new();
        let mut rx = state.tx.subscribe();
        let loan_id = Uuid::new_v4();

        state.broadcast_event(recorded(loan_id)).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.loan_id(), loan_id);
    }

    #[test]
    fn test_client_message_format() {
        let id = Uuid::new_v4();
        let msg: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"Subscribe","loan_ids":["{}"]}}"#, id))
                .unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { loan_ids } if loan_ids == vec![id]));
    }
}
