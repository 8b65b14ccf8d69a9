//! WebSocket event envelopes and the snapshot payload.
//!
//! Every frame is a JSON text message of the form
//! `{ "event": "<name>", "data": { ... } }`.
//!
//! | Event           | Direction        | Payload                |
//! |-----------------|------------------|------------------------|
//! | `submit_doodle` | client -> hub    | `{ image: data-URI }`  |
//! | `save_success`  | hub -> submitter | `{ filePath: uri }`    |
//! | `save_error`    | hub -> submitter | `{ message }`          |
//! | `new_doodle`    | hub -> everyone  | `{ image: uri }`       |

use serde::{Deserialize, Serialize};

/// Raw drawing submitted by a drawing client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitDoodle {
    /// Encoded raster, e.g. `data:image/png;base64,iVBOR...`.
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoodle {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSuccess {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveError {
    pub message: String,
}

/// Frames sent by clients to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    SubmitDoodle(SubmitDoodle),
}

/// Frames sent by the hub to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    NewDoodle(NewDoodle),
    SaveSuccess(SaveSuccess),
    SaveError(SaveError),
}

impl ServerMessage {
    pub fn new_doodle(uri: impl Into<String>) -> Self {
        ServerMessage::NewDoodle(NewDoodle { image: uri.into() })
    }

    pub fn save_success(uri: impl Into<String>) -> Self {
        ServerMessage::SaveSuccess(SaveSuccess {
            file_path: uri.into(),
        })
    }

    pub fn save_error(message: impl Into<String>) -> Self {
        ServerMessage::SaveError(SaveError {
            message: message.into(),
        })
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> String {
        // Plain structs of strings; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Body of `GET /get_latest_doodles`: image URIs, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestDoodles {
    pub doodles: Vec<String>,
}
