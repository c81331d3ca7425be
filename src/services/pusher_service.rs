use crate::models::settings::KickSettings;
use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::Message;

pub const CHAT_MESSAGE_EVENT: &str = "App\\Events\\ChatMessageEvent";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// Pusher closes idle sockets after 120s
const PING_INTERVAL_SECS: u64 = 60;

pub fn chatroom_topic(chatroom_id: u64) -> String {
    format!("chatrooms.{}.v2", chatroom_id)
}

/// One chat event as delivered by the live transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub channel: String,
    pub event: String,
    /// Raw `data` of the frame; usually a JSON-encoded string
    pub payload: Value,
}

/// Subscription side of a live event source
pub trait ChatTransport {
    fn subscribe(&mut self, topic: &str) -> Result<()>;
    fn unsubscribe(&mut self, topic: &str) -> Result<()>;
}

#[derive(Debug)]
enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Shutdown,
}

/// Control handle for a running Pusher connection task
#[derive(Clone)]
pub struct PusherHandle {
    commands: UnboundedSender<Command>,
}

impl PusherHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("Pusher connection task has stopped"))
    }

    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }
}

impl ChatTransport for PusherHandle {
    fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.send(Command::Subscribe(topic.to_string()))
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<()> {
        self.send(Command::Unsubscribe(topic.to_string()))
    }
}

pub struct PusherService;

impl PusherService {
    pub fn socket_url(settings: &KickSettings) -> String {
        format!(
            "wss://ws-{}.pusher.com/app/{}?protocol=7&client=js&version=8.4.0-rc2&flash=false",
            settings.pusher_cluster, settings.pusher_key
        )
    }

    /// Spawn the connection task. Chat events arrive on the returned receiver
    /// in delivery order; the task ends on `shutdown` or when the receiver
    /// is dropped.
    pub fn spawn(settings: &KickSettings) -> (PusherHandle, UnboundedReceiver<TransportEvent>) {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let url = Self::socket_url(settings);
        let reconnect_delay = Duration::from_secs(settings.reconnect_delay_secs.max(1));

        tokio::spawn(async move {
            let mut topics = BTreeSet::new();
            loop {
                match Self::websocket_loop(&url, &mut command_rx, &mut topics, &event_tx).await {
                    Ok(LoopExit::Shutdown) => break,
                    Ok(LoopExit::Disconnected) => info!("[Pusher] Disconnected"),
                    Err(e) => warn!("[Pusher] Connection error: {:#}", e),
                }

                if event_tx.is_closed() {
                    break;
                }

                info!("[Pusher] Reconnecting in {}s", reconnect_delay.as_secs());
                if !wait_before_reconnect(reconnect_delay, &mut command_rx, &mut topics).await {
                    break;
                }
            }
            debug!("[Pusher] Connection task finished");
        });

        (PusherHandle { commands: command_tx }, event_rx)
    }

    async fn websocket_loop(
        url: &str,
        commands: &mut UnboundedReceiver<Command>,
        topics: &mut BTreeSet<String>,
        events: &UnboundedSender<TransportEvent>,
    ) -> Result<LoopExit> {
        let mut request = url
            .into_client_request()
            .context("Invalid Pusher URL")?;
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        debug!("[Pusher] Connecting to {}", url);
        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to Pusher")?;
        let (mut write, mut read) = ws_stream.split();
        info!("[Pusher] Connected");

        // Subscriptions are sent once the server confirms the connection
        let mut established = false;
        let mut ping_interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_interval.tick().await;

        loop {
            tokio::select! {
                _ = ping_interval.tick() => {
                    write.send(text_frame(json!({"event": "pusher:ping", "data": {}}))).await?;
                }

                command = commands.recv() => {
                    match command {
                        Some(Command::Subscribe(topic)) => {
                            if topics.insert(topic.clone()) && established {
                                write.send(subscribe_frame(&topic)).await?;
                                info!("[Pusher] Subscribed to {}", topic);
                            }
                        }
                        Some(Command::Unsubscribe(topic)) => {
                            if topics.remove(&topic) && established {
                                write.send(unsubscribe_frame(&topic)).await?;
                                info!("[Pusher] Unsubscribed from {}", topic);
                            }
                        }
                        Some(Command::Shutdown) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(LoopExit::Shutdown);
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match classify_frame(&text) {
                            PusherFrame::ConnectionEstablished => {
                                established = true;
                                for topic in topics.iter() {
                                    write.send(subscribe_frame(topic)).await?;
                                    info!("[Pusher] Subscribed to {}", topic);
                                }
                            }
                            PusherFrame::Ping => {
                                write.send(text_frame(json!({"event": "pusher:pong", "data": {}}))).await?;
                            }
                            PusherFrame::Chat(event) => {
                                if events.send(event).is_err() {
                                    return Ok(LoopExit::Shutdown);
                                }
                            }
                            PusherFrame::Error(message) => warn!("[Pusher] Server error: {}", message),
                            PusherFrame::Other(event) => debug!("[Pusher] Ignoring {}", event),
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            write.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("[Pusher] Closed by server");
                            return Ok(LoopExit::Disconnected);
                        }
                        Some(Err(e)) => return Err(e).context("Pusher websocket error"),
                        None => return Ok(LoopExit::Disconnected),
                        _ => {}
                    }
                }
            }
        }
    }
}

enum LoopExit {
    Shutdown,
    Disconnected,
}

/// Sleep out the reconnect delay while still tracking subscription changes.
/// Returns false when the task should stop.
async fn wait_before_reconnect(
    delay: Duration,
    commands: &mut UnboundedReceiver<Command>,
    topics: &mut BTreeSet<String>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(Command::Subscribe(topic)) => {
                    topics.insert(topic);
                }
                Some(Command::Unsubscribe(topic)) => {
                    topics.remove(&topic);
                }
                Some(Command::Shutdown) | None => return false,
            },
        }
    }
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, PartialEq)]
enum PusherFrame {
    ConnectionEstablished,
    Ping,
    Chat(TransportEvent),
    Error(String),
    Other(String),
}

fn classify_frame(text: &str) -> PusherFrame {
    let frame: RawFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => return PusherFrame::Other("<unparseable frame>".to_string()),
    };

    match frame.event.as_str() {
        "pusher:connection_established" => PusherFrame::ConnectionEstablished,
        "pusher:ping" => PusherFrame::Ping,
        "pusher:error" => PusherFrame::Error(frame.data.to_string()),
        CHAT_MESSAGE_EVENT => match frame.channel {
            Some(channel) => PusherFrame::Chat(TransportEvent {
                channel,
                event: frame.event,
                payload: frame.data,
            }),
            None => PusherFrame::Other(frame.event),
        },
        _ => PusherFrame::Other(frame.event),
    }
}

fn text_frame(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

fn subscribe_frame(topic: &str) -> Message {
    text_frame(json!({
        "event": "pusher:subscribe",
        "data": { "auth": "", "channel": topic }
    }))
}

fn unsubscribe_frame(topic: &str) -> Message {
    text_frame(json!({
        "event": "pusher:unsubscribe",
        "data": { "channel": topic }
    }))
}
