//! Game provider traits and implementations
//!
//! This module defines the interface for looking up game definitions by
//! name, along with a static catalog implementation.

use crate::error::{Result, SetupError};
use crate::game::definition::GameDefinition;
use crate::utils::normalize_name;
use std::sync::Arc;

/// Trait for providing game definitions to the session manager
pub trait GameProvider: Send + Sync {
    /// Find a game by (possibly partial) name
    fn find_game(&self, query: &str) -> Result<Arc<GameDefinition>>;

    /// Get all available games
    fn available_games(&self) -> Vec<Arc<GameDefinition>>;

    /// Validate a game definition before it is offered
    fn validate_definition(&self, definition: &GameDefinition) -> Result<()>;
}

/// Static game catalog
#[derive(Debug, Clone, Default)]
pub struct StaticGameProvider {
    games: Vec<Arc<GameDefinition>>,
}

impl StaticGameProvider {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from definitions, validating each
    pub fn with_games(games: Vec<GameDefinition>) -> Result<Self> {
        let mut provider = Self::new();
        for game in games {
            provider.register(game)?;
        }
        Ok(provider)
    }

    /// Add a game to the catalog
    pub fn register(&mut self, definition: GameDefinition) -> Result<()> {
        self.validate_definition(&definition)?;
        self.games.push(Arc::new(definition));
        Ok(())
    }
}

impl GameProvider for StaticGameProvider {
    fn find_game(&self, query: &str) -> Result<Arc<GameDefinition>> {
        let not_found = || SetupError::GameNotFound {
            query: query.to_string(),
        };

        if normalize_name(query).is_empty() {
            return Err(not_found());
        }

        // Exact names win over prefixes so "chess" never resolves to "chess960"
        self.games
            .iter()
            .find(|game| game.base().matches_game_name(query, true))
            .or_else(|| {
                self.games
                    .iter()
                    .find(|game| game.base().matches_game_name(query, false))
            })
            .cloned()
            .ok_or_else(not_found)
    }

    fn available_games(&self) -> Vec<Arc<GameDefinition>> {
        self.games.clone()
    }

    fn validate_definition(&self, definition: &GameDefinition) -> Result<()> {
        definition.validate()?;

        let name = normalize_name(definition.name());
        if self
            .games
            .iter()
            .any(|game| normalize_name(game.name()) == name)
        {
            return Err(SetupError::InvalidDefinition {
                message: format!("A game named {} is already registered", definition.name()),
            });
        }

        Ok(())
    }
}
