//! Trade source websocket client
//!
//! Subscribes to the Hyperliquid trades channel and appends parsed trades
//! to the shared buffer. The connection is retried forever with a fixed,
//! configurable backoff; a malformed message is logged and skipped, and a
//! batch is only appended whole, so a partial read can never corrupt the
//! buffer.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::buffer::TradeBuffer;
use crate::config::FeedConfig;
use crate::types::{Side, Trade};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid numeric field {field}: {value:?}")]
    BadNumber { field: &'static str, value: String },
    #[error("unknown trade side: {0:?}")]
    UnknownSide(String),
}

/// Envelope around every message on the subscription
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    channel: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// One trade as it appears on the wire
#[derive(Debug, Deserialize)]
struct WsTrade {
    px: String,
    sz: String,
    side: String,
    time: i64,
}

/// Parse one websocket text frame into trades.
///
/// Returns `Ok(None)` for frames on other channels (subscription acks,
/// heartbeats). Any bad row rejects the whole frame so nothing partial
/// reaches the buffer.
pub fn parse_trades(text: &str) -> Result<Option<Vec<Trade>>, FeedError> {
    let envelope: WsEnvelope = serde_json::from_str(text)?;
    if envelope.channel != "trades" {
        return Ok(None);
    }

    let raw: Vec<WsTrade> = serde_json::from_value(envelope.data)?;
    let mut trades = Vec::with_capacity(raw.len());
    for t in raw {
        let price: f64 = t.px.parse().map_err(|_| FeedError::BadNumber {
            field: "px",
            value: t.px.clone(),
        })?;
        let volume: f64 = t.sz.parse().map_err(|_| FeedError::BadNumber {
            field: "sz",
            value: t.sz.clone(),
        })?;
        let side = Side::from_wire(&t.side).ok_or_else(|| FeedError::UnknownSide(t.side.clone()))?;
        trades.push(Trade {
            ts: t.time,
            price,
            volume,
            side,
        });
    }
    Ok(Some(trades))
}

/// Websocket client for the trade source
pub struct TradeFeed {
    url: String,
    coin: String,
    reconnect_delay: Duration,
    buffer: Arc<TradeBuffer>,
}

impl TradeFeed {
    pub fn new(cfg: &FeedConfig, buffer: Arc<TradeBuffer>) -> Self {
        Self {
            url: cfg.ws_url.clone(),
            coin: cfg.coin.clone(),
            reconnect_delay: Duration::from_secs(cfg.reconnect_delay_secs),
            buffer,
        }
    }

    /// Run the feed forever, reconnecting with a fixed backoff
    pub async fn run(self) {
        loop {
            match self.connect_and_stream().await {
                Ok(()) => warn!("Trade feed stream closed; reconnecting"),
                Err(e) => warn!(error = %e, "Trade feed error; reconnecting"),
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn connect_and_stream(&self) -> Result<(), FeedError> {
        let (ws_stream, _) = connect_async(&self.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::json!({
            "method": "subscribe",
            "subscription": { "type": "trades", "coin": self.coin },
        });
        write.send(Message::Text(subscribe.to_string())).await?;
        info!(coin = %self.coin, url = %self.url, "Connected to trade source");

        while let Some(message) = read.next().await {
            match message? {
                Message::Text(text) => match parse_trades(&text) {
                    Ok(Some(trades)) if !trades.is_empty() => {
                        self.buffer.append(trades).await;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Skipping malformed trade message"),
                },
                Message::Ping(data) => write.send(Message::Pong(data)).await?,
                Message::Close(_) => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }
}
