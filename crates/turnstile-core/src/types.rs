use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an admitted job.
pub type JobId = Uuid;

/// Identifier of a shell context. Allocated monotonically, starting at 1.
pub type ContextId = u32;

/// Channel reported for chat keys that carry no `<channel>:` prefix.
pub const DEFAULT_CHANNEL: &str = "default";

/// Opaque conversational identity. All jobs sharing a key are serialized
/// through the same lane.
///
/// Keys are conventionally written `<channel>:<target>` (e.g.
/// `telegram:48213`), which lets statistics group pending work by channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatKey(String);

impl ChatKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from its channel and target parts.
    pub fn for_channel(channel: &str, target: &str) -> Self {
        Self(format!("{channel}:{target}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The channel prefix of this key, or [`DEFAULT_CHANNEL`].
    pub fn channel(&self) -> &str {
        match self.0.split_once(':') {
            Some((channel, _)) if !channel.is_empty() => channel,
            _ => DEFAULT_CHANNEL,
        }
    }
}

impl fmt::Display for ChatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ChatKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for ChatKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
