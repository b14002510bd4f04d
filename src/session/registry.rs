//! Channel registry
//!
//! Maps a [`ChannelKey`] to whatever occupies that channel: a session still
//! being configured, or the game it handed off to. Claims, hand-offs and
//! releases each take the write lock once, so two sessions can never hold the
//! same channel.

use crate::error::{Result, SetupError};
use crate::game::ActiveGame;
use crate::session::actor::SessionHandle;
use crate::types::{ChannelKey, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// What currently occupies a channel
#[derive(Clone)]
pub enum RegistryEntry {
    Setup(SessionHandle),
    Active(Arc<dyn ActiveGame>),
}

impl RegistryEntry {
    /// Id of the session, or of the game it started
    pub fn id(&self) -> SessionId {
        match self {
            RegistryEntry::Setup(handle) => handle.id(),
            RegistryEntry::Active(game) => game.id(),
        }
    }
}

/// Shared registry of occupied channels
#[derive(Default)]
pub struct GameRegistry {
    slots: RwLock<HashMap<ChannelKey, RegistryEntry>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ChannelKey, RegistryEntry>>> {
        self.slots.read().map_err(|_| SetupError::Internal {
            message: "Failed to acquire registry read lock".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ChannelKey, RegistryEntry>>> {
        self.slots.write().map_err(|_| SetupError::Internal {
            message: "Failed to acquire registry write lock".to_string(),
        })
    }

    /// Reserve a free channel for a new session
    pub fn claim(&self, key: ChannelKey, handle: SessionHandle) -> Result<()> {
        let mut slots = self.write()?;
        if slots.contains_key(&key) {
            return Err(SetupError::ChannelBusy);
        }

        debug!("Channel {} claimed by session {}", key, handle.id());
        slots.insert(key, RegistryEntry::Setup(handle));
        Ok(())
    }

    /// Replace a session's entry with the game it started
    ///
    /// Fails with `SessionClosed` if the slot is not held by that session.
    pub fn promote(
        &self,
        key: &ChannelKey,
        session_id: SessionId,
        game: Arc<dyn ActiveGame>,
    ) -> Result<()> {
        let mut slots = self.write()?;
        let held = matches!(
            slots.get(key),
            Some(RegistryEntry::Setup(handle)) if handle.id() == session_id
        );
        if !held {
            return Err(SetupError::SessionClosed);
        }

        slots.insert(key.clone(), RegistryEntry::Active(game));
        debug!("Channel {} handed off to active game", key);
        Ok(())
    }

    /// Free a channel held by a configuring session
    ///
    /// Returns false when the slot was not held by that session.
    pub fn release(&self, key: &ChannelKey, session_id: SessionId) -> Result<bool> {
        let mut slots = self.write()?;
        let held = matches!(
            slots.get(key),
            Some(RegistryEntry::Setup(handle)) if handle.id() == session_id
        );
        if held {
            slots.remove(key);
            debug!("Channel {} released by session {}", key, session_id);
        }
        Ok(held)
    }

    /// Free a channel once its active game has finished
    pub fn release_game(&self, key: &ChannelKey, game_id: SessionId) -> Result<bool> {
        let mut slots = self.write()?;
        let held = matches!(
            slots.get(key),
            Some(RegistryEntry::Active(game)) if game.id() == game_id
        );
        if held {
            slots.remove(key);
            debug!("Channel {} released by finished game {}", key, game_id);
        }
        Ok(held)
    }

    pub fn get(&self, key: &ChannelKey) -> Option<RegistryEntry> {
        self.read().ok()?.get(key).cloned()
    }

    /// Handle of the session configuring `key`, if any
    pub fn session(&self, key: &ChannelKey) -> Option<SessionHandle> {
        match self.get(key)? {
            RegistryEntry::Setup(handle) => Some(handle),
            RegistryEntry::Active(_) => None,
        }
    }

    /// Handles of every configuring session
    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.read()
            .map(|slots| {
                slots
                    .values()
                    .filter_map(|entry| match entry {
                        RegistryEntry::Setup(handle) => Some(handle.clone()),
                        RegistryEntry::Active(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn setup_count(&self) -> usize {
        self.sessions().len()
    }

    pub fn active_game_count(&self) -> usize {
        self.len() - self.setup_count()
    }
}
