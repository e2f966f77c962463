use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a job asks the execution unit to do, tagged by origin.
///
/// The scheduler treats every variant identically; only the execution unit
/// branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// A message received from a messaging channel.
    Chat {
        /// Channel identifier (e.g., "telegram", "discord").
        channel: String,
        /// Sender identifier (channel-specific).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        text: String,
    },
    /// A request submitted through the HTTP/RPC API.
    Api { request_id: Uuid, text: String },
    /// A scheduled task that fired.
    Scheduled {
        task_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        description: String,
    },
}

impl JobPayload {
    /// Create a channel chat payload.
    pub fn chat(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            channel: channel.into(),
            sender: None,
            text: text.into(),
        }
    }

    /// Create an API payload with a fresh request id.
    pub fn api(text: impl Into<String>) -> Self {
        Self::Api {
            request_id: Uuid::new_v4(),
            text: text.into(),
        }
    }

    /// Create a scheduled-task payload.
    pub fn scheduled(task_id: Uuid, label: Option<String>, description: impl Into<String>) -> Self {
        Self::Scheduled {
            task_id,
            label,
            description: description.into(),
        }
    }

    /// The text the execution unit should act on.
    pub fn text(&self) -> &str {
        match self {
            Self::Chat { text, .. } | Self::Api { text, .. } => text,
            Self::Scheduled { description, .. } => description,
        }
    }

    /// Short origin tag for logs.
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Api { .. } => "api",
            Self::Scheduled { .. } => "scheduled",
        }
    }
}
