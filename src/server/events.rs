use serde::Serialize;

use crate::app::ViewSnapshot;

// SSE event types
#[derive(Debug, Clone, Serialize)]
pub struct MapEvent {
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ViewSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MapEvent {
    pub fn view(snapshot: ViewSnapshot) -> Self {
        Self {
            event_type: "view".to_string(),
            data: Some(snapshot),
            message: None,
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            event_type: "heartbeat".to_string(),
            data: None,
            message: Some("SSE connection alive".to_string()),
        }
    }
}
