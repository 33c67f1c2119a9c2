//! WeChat channel backed by a UI-automation bridge.
//!
//! The bridge is a local co-process that drives the real WeChat client
//! (OCR + message-DB polling) and speaks newline-free JSON frames over a
//! persistent WebSocket. This module owns the connection lifecycle and the
//! inbound classification pipeline: echo suppression, mention gating, and
//! cross-message context buffering.

use crate::bus::{InboundMessage, OutboundMessage};
use crate::channels::base::{split_message, BaseChannel};
use crate::channels::context::{ContextEntry, PendingContext};
use crate::channels::echo::SendTracker;
use crate::channels::mention;
use crate::config::{GroupPolicy, WeChatConfig};
use crate::utils::markdown::strip_markdown;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Fixed delay between reconnect attempts. The bridge is a local co-process
/// expected to recover quickly, so there is no backoff growth.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Chunk size for outbound text, in bytes.
const SEND_CHUNK_BYTES: usize = 4000;

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    Message,
>;

/// Connection lifecycle, owned exclusively by the connection loop.
/// Everything else only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Inbound frames from the bridge. Unknown types deserialize to `Unknown`
/// and are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum BridgeFrame {
    #[serde(rename = "message")]
    Message(Box<MessageFrame>),
    #[serde(rename = "result")]
    CommandResult(ResultFrame),
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageFrame {
    conversation_id: String,
    sender: String,
    content: String,
    is_group: bool,
    is_self: bool,
    #[serde(default = "default_message_kind")]
    message_kind: String,
    message_id: Option<String>,
    timestamp: Option<Value>,
    file_name: Option<String>,
    file_size: Option<u64>,
    file_path: Option<String>,
    url: Option<String>,
    title: Option<String>,
}

fn default_message_kind() -> String {
    "text".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultFrame {
    success: bool,
    command: String,
    message: String,
}

/// Outbound commands to the bridge. The bridge owns the mapping from
/// `conversation_id` to real chat targets.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeCommand {
    Listen {
        conversation_id: String,
    },
    SendText {
        conversation_id: String,
        content: String,
        at: Vec<String>,
    },
    SendFile {
        conversation_id: String,
        filepath: String,
    },
}

pub struct WeChatChannel {
    config: WeChatConfig,
    inbound_tx: mpsc::Sender<InboundMessage>,
    running: Arc<Mutex<bool>>,
    state: Arc<Mutex<ConnectionState>>,
    writer: Arc<Mutex<Option<WsSink>>>,
    recent_sends: Arc<Mutex<SendTracker>>,
    pending_context: Arc<Mutex<PendingContext>>,
    ws_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WeChatChannel {
    pub fn new(config: WeChatConfig, inbound_tx: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            config,
            inbound_tx,
            running: Arc::new(Mutex::new(false)),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            recent_sends: Arc::new(Mutex::new(SendTracker::new())),
            pending_context: Arc::new(Mutex::new(PendingContext::new())),
            ws_handle: None,
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.lock().await
    }
}

#[async_trait]
impl BaseChannel for WeChatChannel {
    fn name(&self) -> &str {
        "wechat"
    }

    async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        info!("Connecting to automation bridge at {}...", self.config.bridge_url);
        *self.running.lock().await = true;

        let config = self.config.clone();
        let running = self.running.clone();
        let state = self.state.clone();
        let writer = self.writer.clone();
        let recent_sends = self.recent_sends.clone();
        let pending_context = self.pending_context.clone();
        let inbound_tx = self.inbound_tx.clone();

        let task = tokio::spawn(async move {
            connection_loop(
                &config,
                &running,
                &state,
                &writer,
                &recent_sends,
                &pending_context,
                &inbound_tx,
            )
            .await;
        });

        self.ws_handle = Some(task);
        info!("WeChat channel started (bridge connecting in background)");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        *self.running.lock().await = false;
        *self.state.lock().await = ConnectionState::Disconnected;

        if let Some(mut write) = self.writer.lock().await.take() {
            let _ = write.close().await;
        }
        if let Some(handle) = self.ws_handle.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Fire-and-forget: a send while disconnected is logged and dropped.
    /// Callers notice failures via the absence of a bridge `result` frame.
    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        if msg.channel != "wechat" {
            debug!("WeChat send: ignoring message for channel {}", msg.channel);
            return Ok(());
        }

        let mut guard = self.writer.lock().await;
        let Some(write) = guard.as_mut() else {
            warn!("Automation bridge not connected, dropping outbound message");
            return Ok(());
        };

        // File frames go out before the text frame
        for path in &msg.media {
            let frame = BridgeCommand::SendFile {
                conversation_id: msg.conversation_id.clone(),
                filepath: path.clone(),
            };
            if let Err(e) = send_command(write, &frame).await {
                error!("Error sending file to bridge: {}", e);
                return Ok(());
            }
        }

        if let Some(content) = &msg.content {
            let content = if self.config.strip_markdown {
                strip_markdown(content)
            } else {
                content.clone()
            };

            for chunk in split_message(&content, SEND_CHUNK_BYTES) {
                let frame = BridgeCommand::SendText {
                    conversation_id: msg.conversation_id.clone(),
                    content: chunk.clone(),
                    at: vec![],
                };
                if let Err(e) = send_command(write, &frame).await {
                    error!("Error sending text to bridge: {}", e);
                    return Ok(());
                }
                // Each chunk echoes back separately, so each gets its own
                // fingerprint. The lock is scoped to the single insert.
                self.recent_sends
                    .lock()
                    .await
                    .record(&msg.conversation_id, &chunk);
            }
        }

        Ok(())
    }
}

async fn send_command(write: &mut WsSink, frame: &BridgeCommand) -> Result<()> {
    let payload = serde_json::to_string(frame)?;
    write.send(Message::text(payload)).await?;
    Ok(())
}

/// Supervising loop: `disconnected → connecting → connected → disconnected`,
/// forever until the running flag drops. Transport errors are absorbed here
/// and never surface to callers.
#[allow(clippy::too_many_lines)]
async fn connection_loop(
    config: &WeChatConfig,
    running: &Mutex<bool>,
    state: &Mutex<ConnectionState>,
    writer: &Mutex<Option<WsSink>>,
    recent_sends: &Mutex<SendTracker>,
    pending_context: &Mutex<PendingContext>,
    inbound_tx: &mpsc::Sender<InboundMessage>,
) {
    loop {
        if !*running.lock().await {
            break;
        }
        *state.lock().await = ConnectionState::Connecting;

        match tokio_tungstenite::connect_async(config.bridge_url.as_str()).await {
            Ok((ws, _response)) => {
                info!("Connected to automation bridge");
                let (mut write, mut read) = ws.split();

                // Register listeners for configured conversations on every
                // (re)connect — the bridge forgets them on disconnect.
                for conversation_id in &config.listen_conversations {
                    let frame = BridgeCommand::Listen {
                        conversation_id: conversation_id.clone(),
                    };
                    match send_command(&mut write, &frame).await {
                        Ok(()) => info!("Registered listener for: {}", conversation_id),
                        Err(e) => {
                            error!("Failed to register listener for {}: {}", conversation_id, e);
                        }
                    }
                }

                *writer.lock().await = Some(write);
                *state.lock().await = ConnectionState::Connected;

                while let Some(frame) = read.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = handle_bridge_frame(
                                text.as_str(),
                                config.group_policy,
                                config.bot_name.as_deref(),
                                recent_sends,
                                pending_context,
                                inbound_tx,
                            )
                            .await
                            {
                                error!("Error handling bridge frame: {}", e);
                            }
                        }
                        Ok(Message::Ping(data)) => {
                            let mut guard = writer.lock().await;
                            if let Some(w) = guard.as_mut() {
                                if let Err(e) = w.send(Message::Pong(data)).await {
                                    error!("Failed to send pong to bridge: {}", e);
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("Bridge connection closed");
                            break;
                        }
                        Err(e) => {
                            warn!("Bridge connection error: {}", e);
                            break;
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => {
                warn!("Bridge connection error: {}", e);
            }
        }

        *writer.lock().await = None;
        *state.lock().await = ConnectionState::Disconnected;

        // Re-check after the blocking connect/receive phase: stop() may have
        // flipped the flag while we were inside it
        if *running.lock().await {
            info!("Reconnecting in {} seconds...", RECONNECT_DELAY.as_secs());
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    *state.lock().await = ConnectionState::Disconnected;
}

fn preview(content: &str) -> String {
    content.chars().take(40).collect()
}

/// Classify one raw frame from the bridge and dispatch it downstream if it
/// survives the pipeline. Malformed JSON is dropped with a warning.
pub async fn handle_bridge_frame(
    raw: &str,
    policy: GroupPolicy,
    bot_name: Option<&str>,
    recent_sends: &Mutex<SendTracker>,
    pending_context: &Mutex<PendingContext>,
    inbound_tx: &mpsc::Sender<InboundMessage>,
) -> Result<()> {
    let frame: BridgeFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Invalid JSON from bridge ({}): {}", e, preview(raw));
            return Ok(());
        }
    };

    match frame {
        BridgeFrame::Message(msg) => {
            handle_message(*msg, policy, bot_name, recent_sends, pending_context, inbound_tx)
                .await
        }
        BridgeFrame::CommandResult(result) => {
            if result.success {
                debug!("Bridge command OK: {} - {}", result.command, result.message);
            } else {
                warn!("Bridge command failed: {} - {}", result.command, result.message);
            }
            Ok(())
        }
        BridgeFrame::Error { message } => {
            error!("Bridge error: {}", message);
            Ok(())
        }
        BridgeFrame::Unknown => Ok(()),
    }
}

async fn handle_message(
    frame: MessageFrame,
    policy: GroupPolicy,
    bot_name: Option<&str>,
    recent_sends: &Mutex<SendTracker>,
    pending_context: &Mutex<PendingContext>,
    inbound_tx: &mpsc::Sender<InboundMessage>,
) -> Result<()> {
    // Echo suppression: a self-sent message matching a recent bot send is
    // the bridge observing our own output. A self-sent message the tracker
    // does NOT recognize falls through as genuine input — users do message
    // themselves from a second device, and dropping those would eat them.
    if frame.is_self {
        let suppressed = recent_sends
            .lock()
            .await
            .is_echo(&frame.conversation_id, &frame.content);
        if suppressed {
            debug!("Echo suppressed: {}", preview(&frame.content));
            return Ok(());
        }
    }

    let (must_respond, content) =
        mention::should_respond(&frame.content, frame.is_group, policy, bot_name);

    if !must_respond {
        if frame.is_group {
            pending_context
                .lock()
                .await
                .append(&frame.conversation_id, context_entry(&frame));
            debug!(
                "Buffered (no mention): [{}] {}: {}",
                frame.conversation_id,
                frame.sender,
                preview(&frame.content)
            );
        } else {
            debug!(
                "Skipped (not addressed): [{}] {}",
                frame.conversation_id, frame.sender
            );
        }
        return Ok(());
    }

    // Replay buffered context ahead of the triggering message
    let combined = if frame.is_group {
        let context = pending_context.lock().await.flush(&frame.conversation_id);
        if context.is_empty() {
            content
        } else {
            format!("{}\n{}", context, content)
        }
    } else {
        content
    };

    let mut metadata: HashMap<String, Value> = HashMap::new();
    metadata.insert(
        "message_id".to_string(),
        frame.message_id.map_or(Value::Null, Value::String),
    );
    metadata.insert(
        "timestamp".to_string(),
        frame.timestamp.unwrap_or(Value::Null),
    );
    metadata.insert("is_group".to_string(), Value::Bool(frame.is_group));
    metadata.insert(
        "message_kind".to_string(),
        Value::String(frame.message_kind.clone()),
    );

    let inbound = InboundMessage {
        channel: "wechat".to_string(),
        sender_id: frame.sender.clone(),
        conversation_id: frame.conversation_id,
        content: combined,
        timestamp: Utc::now(),
        metadata,
    };

    inbound_tx
        .send(inbound)
        .await
        .map_err(|e| anyhow::anyhow!("Inbound queue closed: {}", e))?;
    Ok(())
}

fn context_entry(frame: &MessageFrame) -> ContextEntry {
    ContextEntry {
        at: Instant::now(),
        sender: frame.sender.clone(),
        kind: frame.message_kind.clone(),
        content: frame.content.clone(),
        file_name: frame.file_name.clone(),
        file_size: frame.file_size,
        file_path: frame.file_path.clone(),
        url: frame.url.clone(),
        title: frame.title.clone(),
    }
}
