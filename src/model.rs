use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key in [`Metadata::teams`] used when a message's team has no icon of its own.
pub const NULL_TEAM: &str = "NULL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Milliseconds relative to the start of the video.
    pub timestamp_ms: i64,
    pub team_id: String,
    pub user_name: String,
    pub text: String,
}

/// Chat log for one video, sorted by `timestamp_ms` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Index of the first message strictly later than `time_ms`, or `len()` if none.
    pub fn first_index_after(&self, time_ms: i64) -> usize {
        self.messages.partition_point(|m| m.timestamp_ms <= time_ms)
    }

    /// Index of the first message at or after `time_ms`, or `len()` if none.
    pub fn first_index_at_or_after(&self, time_ms: i64) -> usize {
        self.messages.partition_point(|m| m.timestamp_ms < time_ms)
    }

    pub fn last_timestamp_ms(&self) -> i64 {
        self.messages.last().map(|m| m.timestamp_ms).unwrap_or(0).max(0)
    }
}

/// Maps absolute transcript timestamps onto one video's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackWindow {
    /// Absolute transcript time at which the video starts.
    pub start_offset_ms: i64,
    pub duration_ms: i64,
}

impl PlaybackWindow {
    pub fn new(start_offset_ms: i64, duration_ms: i64) -> Self {
        Self {
            start_offset_ms,
            duration_ms: duration_ms.max(0),
        }
    }

    pub fn normalize(&self, absolute_ms: i64) -> i64 {
        absolute_ms - self.start_offset_ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub teams: BTreeMap<String, String>,
    #[serde(default)]
    pub emotes: BTreeMap<String, String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.emotes.is_empty()
    }

    pub fn team_icon(&self, team_id: &str) -> Option<&str> {
        self.teams
            .get(team_id)
            .or_else(|| self.teams.get(NULL_TEAM))
            .map(String::as_str)
    }

    pub fn emote(&self, name: &str) -> Option<&str> {
        self.emotes.get(name).map(String::as_str)
    }
}
