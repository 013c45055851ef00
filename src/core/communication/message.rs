use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::SystemTime;

/// One entry of session traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: SystemTime,
    pub direction: MessageDirection,
    pub payload: String,
}

/// Message direction classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageDirection {
    /// Command sent to the kit
    Sent,
    /// Frame received from the kit
    Received,
    /// Connection event
    System,
    /// Rejected frame or failed request
    Error,
}

impl std::fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageDirection::Sent => write!(f, "TX"),
            MessageDirection::Received => write!(f, "RX"),
            MessageDirection::System => write!(f, "SYS"),
            MessageDirection::Error => write!(f, "ERR"),
        }
    }
}

impl Message {
    pub fn new(direction: MessageDirection, payload: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: SystemTime::now(),
            direction,
            payload: payload.into(),
        }
    }

    pub fn sent(payload: impl Into<String>) -> Self {
        Self::new(MessageDirection::Sent, payload)
    }

    pub fn received(payload: impl Into<String>) -> Self {
        Self::new(MessageDirection::Received, payload)
    }

    pub fn system(payload: impl Into<String>) -> Self {
        Self::new(MessageDirection::System, payload)
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self::new(MessageDirection::Error, payload)
    }
}

/// Bounded traffic history; oldest entries fall off first.
#[derive(Debug, Clone, Serialize)]
pub struct MessageHistory {
    limit: usize,
    entries: VecDeque<Message>,
}

impl MessageHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Entries travelling in one direction, oldest first
    pub fn filtered(&self, direction: MessageDirection) -> Vec<&Message> {
        self.entries
            .iter()
            .filter(|m| m.direction == direction)
            .collect()
    }
}
