//! Game definitions consumed by setup sessions
//!
//! Games themselves live elsewhere; this module only describes the surface a
//! setup needs from them: templates, option validation and a factory.

pub mod definition;
pub mod provider;

// Re-export commonly used types
pub use definition::{
    ActiveGame, GameDefinition, GameLaunch, GameOptions, GameRules, GameTemplate, OptionValue,
};
pub use provider::{GameProvider, StaticGameProvider};
