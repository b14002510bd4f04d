//! Common types used throughout the setup service

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for sessions (and the games they start)
pub type SessionId = Uuid;

/// Identifier of a chat user
pub type UserId = String;

/// Identifier of a message published by a transport
pub type MessageId = u64;

/// A chat user taking part in a setup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Human readable handle shown in notices and the status message
    pub tag: String,
}

impl User {
    pub fn new(id: impl Into<UserId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

/// Registry key: one setup or active game per (community, channel)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub community: String,
    pub channel: String,
}

impl ChannelKey {
    pub fn new(community: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.community, self.channel)
    }
}

/// A message received from the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub author: User,
    pub content: String,
    /// Users mentioned in the message, in mention order
    #[serde(default)]
    pub mentions: Vec<User>,
}

impl InboundMessage {
    pub fn new(author: User, content: impl Into<String>) -> Self {
        Self {
            author,
            content: content.into(),
            mentions: Vec::new(),
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<User>) -> Self {
        self.mentions = mentions;
        self
    }
}

/// Why a session ended without starting a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// `setup cancel` was issued
    Cancelled,
    /// No command was accepted within the inactivity timeout
    TimedOut,
    /// The last player left
    Abandoned,
    /// Every handle to the session was dropped
    Shutdown,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "cancelled"),
            AbortReason::TimedOut => write!(f, "timeout"),
            AbortReason::Abandoned => write!(f, "abandoned"),
            AbortReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of a successfully handled setup command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The session accepted the command and is still configuring
    Updated,
    /// A confirmation prompt was posted; the change happens on `confirm`
    AwaitingConfirmation,
    /// The game was created and handed to the registry
    Started { game_id: SessionId },
    /// The session ended
    Aborted(AbortReason),
}

impl CommandOutcome {
    /// Whether the session is gone after this outcome
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandOutcome::Started { .. } | CommandOutcome::Aborted(_)
        )
    }
}
