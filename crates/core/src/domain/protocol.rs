//! Wire protocol between the server and its clients
//!
//! One JSON object per WebSocket text frame, in both directions:
//!
//! ```text
//! {"type": "volume", "value": 0-100}
//! {"type": "mute",   "value": true|false}
//! ```
//!
//! Clients send `volume` to set the level and `mute` (value ignored) to
//! toggle the switch. There is no acknowledgement: the outcome reaches every
//! client, including the sender, as the next state broadcast.

use crate::domain::mixer::ScaledVolume;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors decoding or encoding protocol messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unrecognized client message: {0}")]
    Unrecognized(#[source] serde_json::Error),

    #[error("Cannot encode state message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// State pushed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StateMessage {
    Volume(ScaledVolume),
    Mute(bool),
}

impl StateMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Unrecognized)
    }
}

/// Commands accepted from clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "volume")]
    SetVolume { value: ScaledVolume },
    #[serde(rename = "mute")]
    ToggleMute,
}

impl ClientCommand {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Unrecognized)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}
