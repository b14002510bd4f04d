//! Setup subcommands
//!
//! Parses the arguments following `setup` into a [`SetupCommand`]. Mentions
//! arrive separately from the text, so mention tokens in `args` are skipped.

use crate::error::{Result, SetupError};
use crate::types::User;
use crate::utils::is_mention;

/// A command understood by a configuring session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupCommand {
    ToggleAccess,
    Invite(Vec<User>),
    Join,
    SetOption { key: String, value: String },
    SetTurnPosition { user: User, position: i64 },
    ToggleRandomTurns,
    /// `None` resets to the base game
    SetVariant(Option<String>),
    Resend,
    Leave,
    Kick(User),
    Start,
    Cancel,
}

impl SetupCommand {
    /// Parse `setup` arguments
    pub fn parse(args: &[&str], mentions: &[User]) -> Result<Self> {
        let (name, rest) = args.split_first().ok_or_else(|| SetupError::MissingArgument {
            usage: "setup <command>".to_string(),
        })?;
        let text: Vec<&str> = rest
            .iter()
            .copied()
            .filter(|token| !is_mention(token))
            .collect();

        match name.to_lowercase().as_str() {
            "access" => Ok(SetupCommand::ToggleAccess),
            "invite" => {
                if mentions.is_empty() {
                    return Err(SetupError::MissingArgument {
                        usage: "setup invite @user...".to_string(),
                    });
                }
                Ok(SetupCommand::Invite(mentions.to_vec()))
            }
            "join" => Ok(SetupCommand::Join),
            "option" | "set" => {
                let (key, value) = text.split_first().ok_or_else(|| SetupError::MissingArgument {
                    usage: "setup option <name> <value>".to_string(),
                })?;
                Ok(SetupCommand::SetOption {
                    key: key.to_lowercase(),
                    value: value.join(" "),
                })
            }
            "turn" | "turns" | "turnorder" => Self::parse_turn(&text, mentions),
            "variant" => {
                let query = text.join(" ");
                let query = query.trim();
                Ok(SetupCommand::SetVariant(
                    (!query.is_empty()).then(|| query.to_string()),
                ))
            }
            "resend" => Ok(SetupCommand::Resend),
            "leave" => Ok(SetupCommand::Leave),
            "kick" => {
                let user = mentions.first().ok_or_else(|| SetupError::MissingArgument {
                    usage: "setup kick @user".to_string(),
                })?;
                Ok(SetupCommand::Kick(user.clone()))
            }
            "start" => Ok(SetupCommand::Start),
            "cancel" => Ok(SetupCommand::Cancel),
            other => Err(SetupError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }

    fn parse_turn(text: &[&str], mentions: &[User]) -> Result<Self> {
        let usage = || SetupError::MissingArgument {
            usage: "setup turn <position> @user | setup turn random".to_string(),
        };

        let first = text.first().ok_or_else(usage)?;
        if first.eq_ignore_ascii_case("random") {
            return Ok(SetupCommand::ToggleRandomTurns);
        }

        let user = mentions.first().ok_or_else(usage)?;
        let position = first
            .parse::<i64>()
            .map_err(|_| SetupError::InvalidTurnPosition {
                position: first.to_string(),
            })?;

        Ok(SetupCommand::SetTurnPosition {
            user: user.clone(),
            position,
        })
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SetupCommand::ToggleAccess => "access",
            SetupCommand::Invite(_) => "invite",
            SetupCommand::Join => "join",
            SetupCommand::SetOption { .. } => "option",
            SetupCommand::SetTurnPosition { .. } => "turn",
            SetupCommand::ToggleRandomTurns => "turn random",
            SetupCommand::SetVariant(_) => "variant",
            SetupCommand::Resend => "resend",
            SetupCommand::Leave => "leave",
            SetupCommand::Kick(_) => "kick",
            SetupCommand::Start => "start",
            SetupCommand::Cancel => "cancel",
        }
    }
}
