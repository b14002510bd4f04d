//! Session manager for opening setups and routing commands to them
//!
//! The manager resolves games through a [`GameProvider`], claims the channel in
//! the shared [`GameRegistry`] and spawns one [`SessionActor`] per setup.
//! Commands for a channel are parsed here and forwarded to that channel's
//! session handle.

use crate::config::SetupConfig;
use crate::error::{Result, SetupError};
use crate::game::{GameDefinition, GameProvider};
use crate::session::actor::{SessionActor, SessionContext, SessionHandle};
use crate::session::command::SetupCommand;
use crate::session::registry::GameRegistry;
use crate::session::state::{PreviousGame, Session};
use crate::transport::MessageTransport;
use crate::types::{AbortReason, ChannelKey, CommandOutcome, SessionId, User};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Statistics about session manager operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionManagerStats {
    /// Total number of sessions opened
    pub sessions_created: u64,
    /// Total number of sessions that ended without starting a game
    pub sessions_aborted: u64,
    /// Total number of games started
    pub games_started: u64,
    /// Total number of invitations sent
    pub invitations_sent: u64,
    /// Current number of sessions still being configured
    pub active_sessions: usize,
}

/// The main session manager
#[derive(Clone)]
pub struct SessionManager {
    /// Channel occupancy shared with every session
    registry: Arc<GameRegistry>,
    /// Game catalog
    games: Arc<dyn GameProvider>,
    /// Settings copied into each new session
    config: SetupConfig,
    /// Manager statistics
    stats: Arc<RwLock<SessionManagerStats>>,
}

impl SessionManager {
    /// Create a new session manager with its own registry
    pub fn new(games: Arc<dyn GameProvider>, config: SetupConfig) -> Self {
        Self::with_registry(games, Arc::new(GameRegistry::new()), config)
    }

    /// Create a session manager sharing an existing registry
    pub fn with_registry(
        games: Arc<dyn GameProvider>,
        registry: Arc<GameRegistry>,
        config: SetupConfig,
    ) -> Self {
        Self {
            registry,
            games,
            config,
            stats: Arc::new(RwLock::new(SessionManagerStats::default())),
        }
    }

    /// Open a setup for `game_query` in the channel `key`
    ///
    /// Fails with `GameNotFound` for unknown games and `ChannelBusy` when the
    /// channel already hosts a setup or a running game.
    pub fn open_session(
        &self,
        key: ChannelKey,
        initiator: User,
        game_query: &str,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<SessionHandle> {
        let definition = self.games.find_game(game_query)?;
        let session = Session::new(key, initiator, definition, &self.config);
        self.spawn_session(session, transport)
    }

    /// Open a setup pre-filled from a finished game
    pub fn open_rematch(
        &self,
        key: ChannelKey,
        host: User,
        previous: &PreviousGame,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<SessionHandle> {
        let definition = self.games.find_game(previous.template.name())?;
        let session = Session::rematch(key, host, definition, previous, &self.config);
        self.spawn_session(session, transport)
    }

    fn spawn_session(
        &self,
        session: Session,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<SessionHandle> {
        let key = session.key().clone();
        let ctx = SessionContext {
            registry: Arc::clone(&self.registry),
            transport,
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        };

        let (actor, handle) = SessionActor::new(session, ctx);

        // Nothing runs until the claim succeeds, so a busy channel sees no output
        self.registry.claim(key.clone(), handle.clone())?;

        {
            let mut stats = self.stats.write().map_err(|_| SetupError::Internal {
                message: "Failed to acquire stats lock".to_string(),
            })?;
            stats.sessions_created += 1;
            stats.active_sessions += 1;
        }

        actor.spawn();
        info!("Opened setup session {} in {}", handle.id(), key);
        Ok(handle)
    }

    /// Parse `setup` arguments and run them against the channel's session
    pub async fn dispatch(
        &self,
        key: &ChannelKey,
        issuer: User,
        args: &[&str],
        mentions: &[User],
    ) -> Result<CommandOutcome> {
        let command = SetupCommand::parse(args, mentions)?;
        let handle = self.registry.session(key).ok_or(SetupError::NoSession)?;

        debug!("Dispatching '{}' from {} to {}", command.name(), issuer.id, key);
        handle.handle(command, issuer).await
    }

    /// Handle of the session configuring `key`
    pub fn session(&self, key: &ChannelKey) -> Option<SessionHandle> {
        self.registry.session(key)
    }

    /// Free a channel once the game started there has finished
    pub fn finish_game(&self, key: &ChannelKey, game_id: SessionId) -> Result<bool> {
        let released = self.registry.release_game(key, game_id)?;
        if released {
            info!("Game {} in {} finished", game_id, key);
        }
        Ok(released)
    }

    /// Abort every session still being configured
    ///
    /// Returns the number of sessions that were aborted.
    pub async fn shutdown(&self) -> usize {
        let mut aborted = 0;
        for handle in self.registry.sessions() {
            match handle.abort(AbortReason::Shutdown).await {
                Ok(()) => aborted += 1,
                Err(e) => warn!("Session {} ended before shutdown: {}", handle.id(), e),
            }
        }

        info!("Shut down {} setup session(s)", aborted);
        aborted
    }

    /// Games offered by the catalog
    pub fn available_games(&self) -> Vec<Arc<GameDefinition>> {
        self.games.available_games()
    }

    pub fn registry(&self) -> &Arc<GameRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    /// Get current statistics
    pub async fn get_stats(&self) -> Result<SessionManagerStats> {
        let stats = self.stats.read().map_err(|_| SetupError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;

        Ok(stats.clone())
    }
}
