//! Table Setup - pre-game lobby sessions for a chat game bot
//!
//! This crate lets a host configure a game in a chat channel before it starts:
//! public or private access, invitations, options, turn order and variants.
//! Once started, the session hands the channel over to the running game.

pub mod config;
pub mod error;
pub mod game;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, SetupError};
pub use types::*;

// Re-export key components
pub use game::{GameDefinition, GameProvider, GameRules, GameTemplate, StaticGameProvider};
pub use session::{GameRegistry, SessionHandle, SessionManager, SetupCommand};
pub use transport::{InMemoryTransport, MessageTransport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
