//! Error types for the setup service
//!
//! Every variant's `Display` text doubles as the notice posted to the
//! channel when a setup command fails.

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SetupError>;

/// Errors produced while configuring or launching a game
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("This game does not have enough players to start yet! {needed} more player(s) needed.")]
    InsufficientPlayers { needed: usize },

    #[error("The player limit for this game has been reached! (Player limit: {max})")]
    PlayerLimitReached { max: usize },

    #[error("{user} is already in this game!")]
    AlreadyInSession { user: String },

    #[error("The game is public - inviting people is unnecessary!")]
    SessionIsPublic,

    #[error("The game is private - the host must invite you first!")]
    SessionIsPrivate,

    #[error("No custom options are available for this game or variant!")]
    NoOptions,

    #[error("The game option `{key}` was not found for this game!")]
    UnknownOption { key: String },

    #[error("{0}")]
    InvalidOption(String),

    #[error("This game does not have turn orders!")]
    TurnOrderDisabled,

    #[error("Random turn order is currently on - please turn it off to enable manual turn setting.")]
    RandomTurnsEnabled,

    #[error("Position {position} is not a valid turn position! Did you order your arguments correctly?")]
    InvalidTurnPosition { position: String },

    #[error("Player **{user}** is not in this game!")]
    UserNotInSession { user: String },

    #[error("This game has no variants available!")]
    NoVariants,

    #[error("The variant `{query}` could not be found!")]
    VariantNotFound { query: String },

    #[error("A variant change is already waiting for confirmation.")]
    ConfirmationPending,

    #[error("Operation has timed out.")]
    Timeout,

    #[error("Unknown setup command `{command}`.")]
    UnknownCommand { command: String },

    #[error("Missing argument. Usage: `{usage}`")]
    MissingArgument { usage: String },

    #[error("The game `{query}` could not be found!")]
    GameNotFound { query: String },

    #[error("A game or setup is already running in this channel.")]
    ChannelBusy,

    #[error("There is no game being set up in this channel.")]
    NoSession,

    #[error("This setup has already ended.")]
    SessionClosed,

    #[error("The game could not be created: {reason}")]
    GameCreationFailed { reason: String },

    #[error("Invalid game definition: {message}")]
    InvalidDefinition { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl SetupError {
    /// Whether the error ends a sub-flow because nobody answered in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, SetupError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_is_verbatim() {
        let err = SetupError::InvalidOption("Rounds must be between 1 and 9".to_string());
        assert_eq!(err.to_string(), "Rounds must be between 1 and 9");
    }

    #[test]
    fn test_messages_carry_context() {
        let err = SetupError::InsufficientPlayers { needed: 2 };
        assert!(err.to_string().contains("2 more player(s)"));

        let err = SetupError::PlayerLimitReached { max: 4 };
        assert!(err.to_string().contains("Player limit: 4"));
        assert!(!err.is_timeout());
        assert!(SetupError::Timeout.is_timeout());
    }
}
