//! Game templates, option values and the traits games implement
//!
//! A `GameTemplate` is the immutable description a setup session works
//! against: player bounds, turn-order flag, default options and the
//! `GameRules` that validate options and build the running game. A
//! `GameDefinition` groups a base template with its variants.

use crate::error::{Result, SetupError};
use crate::types::{ChannelKey, SessionId, User};
use crate::utils::normalize_name;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A validated option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl OptionValue {
    /// Coerce raw user input into a value of the same kind as `self`
    pub fn coerce_like(&self, raw: &str) -> std::result::Result<OptionValue, String> {
        let raw = raw.trim();
        match self {
            OptionValue::Bool(_) => match raw.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(OptionValue::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(OptionValue::Bool(false)),
                _ => Err(format!("`{}` is not a valid true/false value!", raw)),
            },
            OptionValue::Integer(_) => raw
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| format!("`{}` is not a valid number!", raw)),
            OptionValue::Text(_) => {
                if raw.is_empty() {
                    Err("The option value cannot be empty!".to_string())
                } else {
                    Ok(OptionValue::Text(raw.to_string()))
                }
            }
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{}", value),
            OptionValue::Integer(value) => write!(f, "{}", value),
            OptionValue::Text(value) => write!(f, "{}", value),
        }
    }
}

/// Option set keyed by lowercase option identifier
pub type GameOptions = BTreeMap<String, OptionValue>;

/// Everything a game factory needs to build a running game
#[derive(Debug, Clone)]
pub struct GameLaunch {
    pub id: SessionId,
    pub key: ChannelKey,
    /// Players in turn order when the template uses turn order
    pub players: Vec<User>,
    pub options: GameOptions,
    pub template: Arc<GameTemplate>,
}

/// A running game created from a finished setup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActiveGame: Send + Sync {
    /// ID inherited from the setup session
    fn id(&self) -> SessionId;

    /// Display name of the game
    fn name(&self) -> String;

    /// Begin the game; called once, without the setup waiting on it
    async fn start(&self) -> Result<()>;
}

/// Per-template option validator and game factory
pub trait GameRules: Send + Sync {
    /// Validate and coerce a raw option value
    ///
    /// The default coerces to the type of the key's current value. Errors are
    /// shown to users verbatim.
    fn validate_option(
        &self,
        key: &str,
        raw: &str,
        current: &GameOptions,
    ) -> std::result::Result<OptionValue, String> {
        match current.get(key) {
            Some(value) => value.coerce_like(raw),
            None => Err(format!("The game option `{}` was not found!", key)),
        }
    }

    /// Human readable (label, value) pairs for the status message
    fn readable_options(&self, options: &GameOptions) -> Vec<(String, String)> {
        options
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }

    /// Build the running game
    fn create_game(&self, launch: GameLaunch) -> Result<Arc<dyn ActiveGame>>;
}

/// Immutable description of a game (or one of its variants)
#[derive(Clone)]
pub struct GameTemplate {
    name: String,
    variant_name: String,
    aliases: Vec<String>,
    min_players: usize,
    max_players: usize,
    turn_order: bool,
    default_options: GameOptions,
    rules: Arc<dyn GameRules>,
}

impl fmt::Debug for GameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameTemplate")
            .field("name", &self.name)
            .field("variant_name", &self.variant_name)
            .field("min_players", &self.min_players)
            .field("max_players", &self.max_players)
            .field("turn_order", &self.turn_order)
            .field("default_options", &self.default_options)
            .finish()
    }
}

impl GameTemplate {
    /// Create a single-player template with no options
    pub fn new(name: impl Into<String>, rules: Arc<dyn GameRules>) -> Self {
        Self {
            name: name.into(),
            variant_name: "Standard".to_string(),
            aliases: Vec::new(),
            min_players: 1,
            max_players: 1,
            turn_order: false,
            default_options: GameOptions::new(),
            rules,
        }
    }

    pub fn with_players(mut self, min: usize, max: usize) -> Self {
        self.min_players = min;
        self.max_players = max;
        self
    }

    pub fn with_turn_order(mut self, turn_order: bool) -> Self {
        self.turn_order = turn_order;
        self
    }

    pub fn with_variant_name(mut self, variant_name: impl Into<String>) -> Self {
        self.variant_name = variant_name.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a default option; keys are stored lowercase
    pub fn with_option(mut self, key: &str, default: OptionValue) -> Self {
        self.default_options.insert(key.to_lowercase(), default);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant_name(&self) -> &str {
        &self.variant_name
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn has_turn_order(&self) -> bool {
        self.turn_order
    }

    pub fn default_options(&self) -> &GameOptions {
        &self.default_options
    }

    pub fn rules(&self) -> &Arc<dyn GameRules> {
        &self.rules
    }

    /// Check a query against the game's name and aliases
    ///
    /// Exact matching compares normalized names; loose matching also
    /// accepts a normalized prefix of any name.
    pub fn matches_game_name(&self, query: &str, exact: bool) -> bool {
        Self::matches_any(
            std::iter::once(&self.name).chain(self.aliases.iter()),
            query,
            exact,
        )
    }

    /// Check a query against the variant name and aliases
    ///
    /// Variants share the game's name, so it is not considered here.
    pub fn matches_variant_name(&self, query: &str, exact: bool) -> bool {
        Self::matches_any(
            std::iter::once(&self.variant_name).chain(self.aliases.iter()),
            query,
            exact,
        )
    }

    fn matches_any<'a>(
        names: impl Iterator<Item = &'a String>,
        query: &str,
        exact: bool,
    ) -> bool {
        let query = normalize_name(query);
        if query.is_empty() {
            return false;
        }

        names.map(|name| normalize_name(name)).any(|name| {
            if exact {
                name == query
            } else {
                name.starts_with(&query)
            }
        })
    }

    /// Validate player bounds
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SetupError::InvalidDefinition {
                message: "Game name cannot be empty".to_string(),
            });
        }
        if self.min_players == 0 {
            return Err(SetupError::InvalidDefinition {
                message: format!("{} must require at least one player", self.name),
            });
        }
        if self.min_players > self.max_players {
            return Err(SetupError::InvalidDefinition {
                message: format!(
                    "{} ({}) minimum players ({}) exceed maximum players ({})",
                    self.name, self.variant_name, self.min_players, self.max_players
                ),
            });
        }
        Ok(())
    }
}

/// A base game and its variants
#[derive(Debug, Clone)]
pub struct GameDefinition {
    base: Arc<GameTemplate>,
    variants: Vec<Arc<GameTemplate>>,
}

impl GameDefinition {
    pub fn new(base: GameTemplate) -> Self {
        Self {
            base: Arc::new(base),
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: GameTemplate) -> Self {
        self.variants.push(Arc::new(variant));
        self
    }

    pub fn base(&self) -> &Arc<GameTemplate> {
        &self.base
    }

    pub fn variants(&self) -> &[Arc<GameTemplate>] {
        &self.variants
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Find a variant by its exact (normalized) variant name
    pub fn variant_named(&self, variant_name: &str) -> Option<Arc<GameTemplate>> {
        let wanted = normalize_name(variant_name);
        self.variants
            .iter()
            .find(|variant| normalize_name(variant.variant_name()) == wanted)
            .cloned()
    }

    /// Resolve a `setup variant` argument
    ///
    /// `None` in the result selects the base game. An empty query resets to
    /// the base game, an exact variant match wins, and a loose match on the
    /// base game's names also selects the base game.
    pub fn resolve_variant(&self, query: Option<&str>) -> Result<Option<Arc<GameTemplate>>> {
        if self.variants.is_empty() {
            return Err(SetupError::NoVariants);
        }

        let query = match query.map(str::trim) {
            None | Some("") => return Ok(None),
            Some(query) => query,
        };

        if let Some(variant) = self
            .variants
            .iter()
            .find(|variant| variant.matches_variant_name(query, true))
        {
            return Ok(Some(Arc::clone(variant)));
        }

        if self.base.matches_game_name(query, false) || self.base.matches_variant_name(query, false)
        {
            return Ok(None);
        }

        Err(SetupError::VariantNotFound {
            query: query.to_string(),
        })
    }

    /// Validate the base template and every variant
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        for variant in &self.variants {
            variant.validate()?;
            if normalize_name(variant.variant_name()) == normalize_name(self.base.variant_name())
            {
                return Err(SetupError::InvalidDefinition {
                    message: format!(
                        "Variant name `{}` of {} collides with the base game",
                        variant.variant_name(),
                        self.name()
                    ),
                });
            }
        }
        Ok(())
    }
}
