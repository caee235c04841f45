//! IPC message types for settings window ↔ overlay process communication
//!
//! Every frame names its channel in a `channel` field with the body in
//! `payload`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::input::InputEvent;

/// Messages sent to the overlay process
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "channel", content = "payload")]
pub enum Request {
    #[serde(rename = "settings:getAll")]
    GetAllSettings,

    /// Partial settings, deep-merged into the current ones
    #[serde(rename = "settings:update")]
    UpdateSettings(Value),

    #[serde(rename = "settings:reset")]
    ResetSettings,

    #[serde(rename = "overlay:enable-click-through")]
    EnableClickThrough,

    #[serde(rename = "overlay:disable-click-through")]
    DisableClickThrough,

    /// Window drag finished; persist its live position
    #[serde(rename = "overlay:dragEnd")]
    DragEnd,

    #[serde(rename = "overlay:resetPosition")]
    ResetPosition,

    #[serde(rename = "input:resetCount")]
    ResetCount,

    #[serde(rename = "settings:open")]
    OpenSettings,

    #[serde(rename = "close-settings-window")]
    CloseSettingsWindow,

    /// Health check
    #[serde(rename = "ping")]
    Ping,
}

impl Request {
    /// Request/response channels; the rest are fire-and-forget
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Self::GetAllSettings | Self::UpdateSettings(_) | Self::ResetSettings | Self::ResetPosition | Self::Ping
        )
    }
}

/// Answers to request/response channels
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Reply {
    /// Full settings after the request was applied
    Settings(Settings),
    Ack,
    Pong,
    Error(String),
}

/// Unsolicited messages pushed to subscribers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "channel", content = "payload")]
pub enum Broadcast {
    #[serde(rename = "settings:changed")]
    SettingsChanged(Settings),

    #[serde(rename = "input-event")]
    InputEvent(InputEvent),
}

/// Frames written by the overlay process
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum ServerMessage {
    Reply(Reply),
    Push(Broadcast),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Action, InputKind};
    use serde_json::json;

    #[test]
    fn test_channel_names() {
        let cases = [
            (Request::GetAllSettings, "settings:getAll"),
            (Request::ResetSettings, "settings:reset"),
            (Request::EnableClickThrough, "overlay:enable-click-through"),
            (Request::DisableClickThrough, "overlay:disable-click-through"),
            (Request::DragEnd, "overlay:dragEnd"),
            (Request::ResetPosition, "overlay:resetPosition"),
            (Request::ResetCount, "input:resetCount"),
            (Request::OpenSettings, "settings:open"),
            (Request::CloseSettingsWindow, "close-settings-window"),
            (Request::Ping, "ping"),
        ];
        for (request, channel) in cases {
            let value = serde_json::to_value(&request).unwrap();
            assert_eq!(value["channel"], json!(channel));
            assert_eq!(serde_json::from_value::<Request>(value).unwrap(), request);
        }
    }

    #[test]
    fn test_update_carries_partial_payload() {
        let value = json!({"channel": "settings:update", "payload": {"opacity": 0.5}});
        let request: Request = serde_json::from_value(value).unwrap();
        assert_eq!(request, Request::UpdateSettings(json!({"opacity": 0.5})));
        assert!(request.expects_reply());
    }

    #[test]
    fn test_fire_channels_expect_no_reply() {
        assert!(!Request::DragEnd.expects_reply());
        assert!(!Request::EnableClickThrough.expects_reply());
        assert!(!Request::CloseSettingsWindow.expects_reply());
        assert!(Request::ResetPosition.expects_reply());
    }

    #[test]
    fn test_broadcast_shape() {
        let push = ServerMessage::Push(Broadcast::InputEvent(InputEvent {
            kind: InputKind::Click,
            action: Action::Both,
            count: 7,
            timestamp: 42,
        }));
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({
                "kind": "push",
                "body": {
                    "channel": "input-event",
                    "payload": {"type": "click", "action": "both", "count": 7, "timestamp": 42}
                }
            })
        );
    }
}
