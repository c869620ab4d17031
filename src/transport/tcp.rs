//! TCP adapter to a mesh radio host daemon.
//!
//! The daemon side of this link (typically running next to the radio) frames
//! traffic as newline-delimited JSON: inbound
//! `{"from": "!abc123", "text": "...", "name": ..., "lat": ..., "lon": ...}`
//! and outbound `{"to": "!abc123", "text": "..."}`. Anything unparseable is
//! logged and skipped; the mesh is allowed to be noisy, the gateway is not
//! allowed to die.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::config::TransportConfig;
use crate::logutil::escape_log;

use super::{GpsLocation, IncomingMessage, MessageTransport, NodeContext};

#[derive(Debug, Deserialize)]
struct InboundFrame {
    from: String,
    text: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    to: &'a str,
    text: &'a str,
}

/// Newline-delimited JSON transport over a TCP socket.
pub struct TcpTransport {
    config: TransportConfig,
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

#[async_trait]
impl MessageTransport for TcpTransport {
    async fn connect(&self) -> anyhow::Result<()> {
        let addr = self.addr();
        let stream = TcpStream::connect(&addr).await?;
        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(BufReader::new(read_half));
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to radio host at {}", addr);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.reader.lock().await.take();
        info!("Disconnected from radio host");
    }

    async fn send_message(&self, node_id: &str, text: &str) -> bool {
        let frame = OutboundFrame { to: node_id, text };
        let mut line = match serde_json::to_string(&frame) {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to encode outbound frame for {}: {}", node_id, e);
                return false;
            }
        };
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            warn!("send_message with no active connection");
            return false;
        };
        match writer.write_all(line.as_bytes()).await {
            Ok(()) => {
                debug!("-> {}: {}", node_id, escape_log(text));
                true
            }
            Err(e) => {
                warn!("Send to {} failed: {}", node_id, e);
                self.connected.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    async fn recv(&self) -> Option<IncomingMessage> {
        loop {
            let mut guard = self.reader.lock().await;
            let reader = guard.as_mut()?;
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    // Peer closed the socket
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InboundFrame>(trimmed) {
                        Ok(frame) => {
                            let location = match (frame.lat, frame.lon) {
                                (Some(latitude), Some(longitude)) => Some(GpsLocation {
                                    latitude,
                                    longitude,
                                }),
                                _ => None,
                            };
                            return Some(IncomingMessage {
                                text: frame.text,
                                context: NodeContext {
                                    node_id: frame.from,
                                    node_name: frame.name,
                                    location,
                                },
                            });
                        }
                        Err(e) => {
                            warn!("Skipping malformed frame ({}): {}", e, escape_log(trimmed));
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!("Read from radio host failed: {}", e);
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
