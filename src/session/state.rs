//! Setup session state and transitions
//!
//! `Session` holds everything about a lobby that is still being configured.
//! It is plain data with synchronous transitions; the session actor owns one
//! and is its only writer. Every failing transition leaves the state as it
//! was.

use crate::config::SetupConfig;
use crate::error::{Result, SetupError};
use crate::game::{GameDefinition, GameLaunch, GameOptions, GameTemplate, OptionValue};
use crate::types::{ChannelKey, SessionId, User, UserId};
use crate::utils::{current_timestamp, generate_session_id, same_keys};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::Arc;

/// Summary of a finished game, used to set up a rematch
#[derive(Debug, Clone)]
pub struct PreviousGame {
    pub template: Arc<GameTemplate>,
    pub players: Vec<User>,
    pub options: GameOptions,
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub key: ChannelKey,
    pub game: String,
    /// Variant name of the active template
    pub variant: String,
    pub variant_selected: bool,
    pub host: User,
    pub players: Vec<User>,
    pub turn_order: Option<Vec<User>>,
    pub randomize_turns: bool,
    pub is_public: bool,
    pub options: GameOptions,
    pub created_at: DateTime<Utc>,
    pub pending_invitations: Vec<UserId>,
    pub awaiting_confirmation: bool,
}

/// A lobby being configured
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    key: ChannelKey,
    definition: Arc<GameDefinition>,
    variant: Option<Arc<GameTemplate>>,
    host: User,
    players: Vec<User>,
    turn_order: Option<Vec<User>>,
    randomize_turns: bool,
    is_public: bool,
    options: GameOptions,
    created_at: DateTime<Utc>,
    command_prefix: String,
    timeout_seconds: u64,
}

impl Session {
    /// Create a session with the initiator as host and only player
    pub fn new(
        key: ChannelKey,
        initiator: User,
        definition: Arc<GameDefinition>,
        config: &SetupConfig,
    ) -> Self {
        let base = Arc::clone(definition.base());
        let turn_order = base.has_turn_order().then(|| vec![initiator.clone()]);

        Self {
            id: generate_session_id(),
            key,
            variant: None,
            host: initiator.clone(),
            players: vec![initiator],
            turn_order,
            randomize_turns: false,
            is_public: false,
            options: base.default_options().clone(),
            definition,
            created_at: current_timestamp(),
            command_prefix: config.command_prefix.clone(),
            timeout_seconds: config.inactivity_timeout_seconds,
        }
    }

    /// Create a session pre-filled from a finished game
    ///
    /// The host comes first, followed by the previous players. Options carry
    /// over when they fit the selected template.
    pub fn rematch(
        key: ChannelKey,
        host: User,
        definition: Arc<GameDefinition>,
        previous: &PreviousGame,
        config: &SetupConfig,
    ) -> Self {
        let mut session = Self::new(key, host, definition, config);

        session.variant = session
            .definition
            .variant_named(previous.template.variant_name());

        for player in &previous.players {
            if !session.is_member(&player.id) {
                session.players.push(player.clone());
            }
        }

        let template = Arc::clone(session.active_template());
        session.turn_order = template
            .has_turn_order()
            .then(|| session.players.clone());
        session.options = if same_keys(&previous.options, template.default_options()) {
            previous.options.clone()
        } else {
            template.default_options().clone()
        };

        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn definition(&self) -> &Arc<GameDefinition> {
        &self.definition
    }

    pub fn variant(&self) -> Option<&Arc<GameTemplate>> {
        self.variant.as_ref()
    }

    /// The variant template if one is selected, otherwise the base game
    pub fn active_template(&self) -> &Arc<GameTemplate> {
        self.variant.as_ref().unwrap_or_else(|| self.definition.base())
    }

    pub fn host(&self) -> &User {
        &self.host
    }

    pub fn players(&self) -> &[User] {
        &self.players
    }

    pub fn turn_order(&self) -> Option<&[User]> {
        self.turn_order.as_deref()
    }

    pub fn randomize_turns(&self) -> bool {
        self.randomize_turns
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.players.iter().any(|player| player.id == user_id)
    }

    fn max_players(&self) -> usize {
        self.active_template().max_players()
    }

    /// Flip between public and private; returns the new public flag
    pub fn toggle_access(&mut self) -> bool {
        self.is_public = !self.is_public;
        self.is_public
    }

    /// Check an invite request and return the users that actually need inviting
    ///
    /// Users already playing and duplicate mentions are dropped. The request
    /// is rejected as a whole when it would overflow the player limit.
    pub fn plan_invitations(&self, invitees: &[User]) -> Result<Vec<User>> {
        if self.is_public {
            return Err(SetupError::SessionIsPublic);
        }

        let max = self.max_players();
        if self.players.len() >= max {
            return Err(SetupError::PlayerLimitReached { max });
        }

        let mut fresh: Vec<User> = Vec::new();
        for invitee in invitees {
            if !self.is_member(&invitee.id) && !fresh.iter().any(|user| user.id == invitee.id) {
                fresh.push(invitee.clone());
            }
        }

        if self.players.len() + fresh.len() > max {
            return Err(SetupError::PlayerLimitReached { max });
        }

        Ok(fresh)
    }

    /// Join a public session
    pub fn join(&mut self, user: User) -> Result<()> {
        if !self.is_public {
            return Err(SetupError::SessionIsPrivate);
        }
        self.admit(user)
    }

    /// Add a player regardless of access mode (used for accepted invitations)
    pub fn admit(&mut self, user: User) -> Result<()> {
        if self.is_member(&user.id) {
            return Err(SetupError::AlreadyInSession {
                user: user.to_string(),
            });
        }

        let max = self.max_players();
        if self.players.len() >= max {
            return Err(SetupError::PlayerLimitReached { max });
        }

        if let Some(order) = self.turn_order.as_mut() {
            order.push(user.clone());
        }
        self.players.push(user);
        Ok(())
    }

    /// Remove a player; the user leaves both the player list and the turn order
    fn remove_member(&mut self, user: &User) -> Result<User> {
        let index = self
            .players
            .iter()
            .position(|player| player.id == user.id)
            .ok_or_else(|| SetupError::UserNotInSession {
                user: user.to_string(),
            })?;

        let removed = self.players.remove(index);
        if let Some(order) = self.turn_order.as_mut() {
            order.retain(|player| player.id != removed.id);
        }
        Ok(removed)
    }

    /// The issuer leaves the session
    pub fn leave(&mut self, user: &User) -> Result<()> {
        self.remove_member(user).map(|_| ())
    }

    /// Remove another player from the session
    pub fn kick(&mut self, user: &User) -> Result<User> {
        self.remove_member(user)
    }

    /// Validate and store an option; returns the stored (coerced) value
    pub fn set_option(&mut self, key: &str, raw: &str) -> Result<OptionValue> {
        if self.options.is_empty() {
            return Err(SetupError::NoOptions);
        }

        let key = key.to_lowercase();
        if !self.options.contains_key(&key) {
            return Err(SetupError::UnknownOption { key });
        }

        let value = self
            .active_template()
            .rules()
            .validate_option(&key, raw, &self.options)
            .map_err(SetupError::InvalidOption)?;

        self.options.insert(key, value.clone());
        Ok(value)
    }

    /// Move a player to a 1-indexed position in the turn order
    pub fn set_turn_position(&mut self, user: &User, position: i64) -> Result<()> {
        if self.turn_order.is_none() {
            return Err(SetupError::TurnOrderDisabled);
        }
        if self.randomize_turns {
            return Err(SetupError::RandomTurnsEnabled);
        }

        let order = self
            .turn_order
            .as_mut()
            .ok_or(SetupError::TurnOrderDisabled)?;

        let current = order
            .iter()
            .position(|player| player.id == user.id)
            .ok_or_else(|| SetupError::UserNotInSession {
                user: user.to_string(),
            })?;

        if position < 1 || position as usize > order.len() {
            return Err(SetupError::InvalidTurnPosition {
                position: position.to_string(),
            });
        }

        let moved = order.remove(current);
        order.insert(position as usize - 1, moved);
        Ok(())
    }

    /// Flip random turn order; returns the new flag
    pub fn toggle_random_turns(&mut self) -> Result<bool> {
        if self.turn_order.is_none() {
            return Err(SetupError::TurnOrderDisabled);
        }
        self.randomize_turns = !self.randomize_turns;
        Ok(self.randomize_turns)
    }

    /// Resolve a variant name; `None` selects the base game
    pub fn resolve_variant(&self, query: Option<&str>) -> Result<Option<Arc<GameTemplate>>> {
        self.definition.resolve_variant(query)
    }

    fn template_for<'a>(&'a self, target: Option<&'a Arc<GameTemplate>>) -> &'a Arc<GameTemplate> {
        target.unwrap_or_else(|| self.definition.base())
    }

    /// Whether switching to `target` would wipe option values
    pub fn needs_confirmation(&self, target: Option<&Arc<GameTemplate>>) -> bool {
        let defaults = self.template_for(target).default_options();
        !self.options.is_empty() && !same_keys(&self.options, defaults)
    }

    /// Switch the active template; returns true when options were reset
    ///
    /// Options are kept when the key sets match and replaced with the
    /// target's defaults otherwise. The turn order follows the target's
    /// turn-order flag.
    pub fn apply_variant(&mut self, target: Option<Arc<GameTemplate>>) -> bool {
        let template = Arc::clone(self.template_for(target.as_ref()));

        let reset = !same_keys(&self.options, template.default_options());
        if reset {
            self.options = template.default_options().clone();
        }

        match (template.has_turn_order(), self.turn_order.is_some()) {
            (true, false) => self.turn_order = Some(self.players.clone()),
            (false, true) => {
                self.turn_order = None;
                self.randomize_turns = false;
            }
            _ => {}
        }

        self.variant = target;
        reset
    }

    /// Fail with `InsufficientPlayers` if the game cannot start yet
    pub fn ensure_startable(&self) -> Result<()> {
        let min = self.active_template().min_players();
        if self.players.len() < min {
            return Err(SetupError::InsufficientPlayers {
                needed: min - self.players.len(),
            });
        }
        Ok(())
    }

    /// Build the launch parameters, shuffling the turn order if requested
    ///
    /// The session's own turn order is left untouched; the launch gets a copy.
    pub fn prepare_launch(&self) -> Result<GameLaunch> {
        self.ensure_startable()?;

        let mut players = self
            .turn_order
            .clone()
            .unwrap_or_else(|| self.players.clone());
        if self.randomize_turns && self.turn_order.is_some() {
            players.shuffle(&mut rand::rng());
        }

        Ok(GameLaunch {
            id: self.id,
            key: self.key.clone(),
            players,
            options: self.options.clone(),
            template: Arc::clone(self.active_template()),
        })
    }

    /// Render the lobby status message
    pub fn render_status(&self) -> String {
        let template = self.active_template();
        let mut status = String::new();

        status.push_str(&format!("**Setting up game:** {}\n", template.name()));
        status.push_str(&format!("**Host:** {}\n", self.host));
        status.push_str(if self.is_public {
            "**Public game** - anyone can join"
        } else {
            "**Private game** - players must be invited"
        });
        status.push_str("\n--------------------\n");

        status.push_str("**Players:**\n");
        status.push_str(&join_users(&self.players, " "));

        if let Some(order) = &self.turn_order {
            status.push_str("\n\n**Current turn order:**\n");
            if self.randomize_turns {
                status.push_str("*Randomized!*");
            } else {
                status.push_str(&join_users(order, ", "));
            }
        }

        if !self.definition.variants().is_empty() {
            status.push_str("\n\n**Variant selected:**\n");
            status.push_str(template.variant_name());
        }

        if self.options.is_empty() {
            status.push_str("\n\nThis game has no options available.\n");
        } else {
            status.push_str("\n\n**Game Options:**\n");
            for (label, value) in template.rules().readable_options(&self.options) {
                status.push_str(&format!("> {} - *{}*\n", label, value));
            }
        }

        status.push_str(&format!(
            "\n*Once you are ready, run the command `{}setup start` to start the game.*",
            self.command_prefix
        ));
        status.push_str(&format!(
            "\n*To cancel this setup, run the command `{}setup cancel`.*",
            self.command_prefix
        ));
        status.push_str(&format!(
            "\n*Setup times out automatically {} seconds after the last command.*",
            self.timeout_seconds
        ));

        status
    }

    /// Serializable view without actor-side pending state
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            key: self.key.clone(),
            game: self.definition.name().to_string(),
            variant: self.active_template().variant_name().to_string(),
            variant_selected: self.variant.is_some(),
            host: self.host.clone(),
            players: self.players.clone(),
            turn_order: self.turn_order.clone(),
            randomize_turns: self.randomize_turns,
            is_public: self.is_public,
            options: self.options.clone(),
            created_at: self.created_at,
            pending_invitations: Vec::new(),
            awaiting_confirmation: false,
        }
    }
}

fn join_users(users: &[User], separator: &str) -> String {
    users
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ActiveGame, GameRules};

    struct BoardRules;

    impl GameRules for BoardRules {
        fn validate_option(
            &self,
            key: &str,
            raw: &str,
            current: &GameOptions,
        ) -> std::result::Result<OptionValue, String> {
            let value = current
                .get(key)
                .ok_or_else(|| format!("no option {}", key))?
                .coerce_like(raw)?;
            if key == "rounds" {
                if let OptionValue::Integer(rounds) = value {
                    if !(1..=9).contains(&rounds) {
                        return Err("Rounds must be between 1 and 9!".to_string());
                    }
                }
            }
            Ok(value)
        }

        fn create_game(&self, _launch: GameLaunch) -> Result<Arc<dyn ActiveGame>> {
            Err(SetupError::GameCreationFailed {
                reason: "not in unit tests".to_string(),
            })
        }
    }

    fn definition() -> Arc<GameDefinition> {
        let rules: Arc<dyn GameRules> = Arc::new(BoardRules);
        Arc::new(
            GameDefinition::new(
                GameTemplate::new("Mancala", rules.clone())
                    .with_players(2, 3)
                    .with_turn_order(true)
                    .with_option("rounds", OptionValue::Integer(3))
                    .with_option("capture", OptionValue::Bool(true)),
            )
            .with_variant(
                GameTemplate::new("Mancala", rules.clone())
                    .with_variant_name("Speed")
                    .with_players(2, 3)
                    .with_turn_order(true)
                    .with_option("rounds", OptionValue::Integer(1))
                    .with_option("capture", OptionValue::Bool(false)),
            )
            .with_variant(
                GameTemplate::new("Mancala", rules.clone())
                    .with_variant_name("Tournament")
                    .with_players(2, 3)
                    .with_turn_order(true)
                    .with_option("rounds", OptionValue::Integer(5))
                    .with_option("capture", OptionValue::Bool(true))
                    .with_option("seeds", OptionValue::Integer(4)),
            )
            .with_variant(
                GameTemplate::new("Mancala", rules)
                    .with_variant_name("Free For All")
                    .with_players(1, 6),
            ),
        )
    }

    fn user(name: &str) -> User {
        User::new(name, format!("{}#0001", name))
    }

    fn session() -> Session {
        Session::new(
            ChannelKey::new("guild", "games"),
            user("alice"),
            definition(),
            &SetupConfig::default(),
        )
    }

    fn ids(users: &[User]) -> Vec<&str> {
        users.iter().map(|user| user.id.as_str()).collect()
    }

    #[test]
    fn test_new_session() {
        let session = session();
        assert_eq!(ids(session.players()), vec!["alice"]);
        assert_eq!(session.host().id, "alice");
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice"]);
        assert!(!session.is_public());
        assert!(!session.randomize_turns());
        assert!(session.variant().is_none());
        assert_eq!(session.options().get("rounds"), Some(&OptionValue::Integer(3)));
    }

    #[test]
    fn test_no_turn_order_for_games_without_it() {
        let rules: Arc<dyn GameRules> = Arc::new(BoardRules);
        let definition = Arc::new(GameDefinition::new(
            GameTemplate::new("Trivia", rules).with_players(1, 8),
        ));
        let mut session = Session::new(
            ChannelKey::new("guild", "games"),
            user("alice"),
            definition,
            &SetupConfig::default(),
        );
        assert!(session.turn_order().is_none());
        assert_eq!(
            session.toggle_random_turns().unwrap_err(),
            SetupError::TurnOrderDisabled
        );
        assert_eq!(
            session.set_turn_position(&user("alice"), 1).unwrap_err(),
            SetupError::TurnOrderDisabled
        );
    }

    #[test]
    fn test_join_requires_public_and_room() {
        let mut session = session();
        assert_eq!(
            session.join(user("bob")).unwrap_err(),
            SetupError::SessionIsPrivate
        );

        session.toggle_access();
        session.join(user("bob")).unwrap();
        session.join(user("carol")).unwrap();
        assert_eq!(ids(session.players()), vec!["alice", "bob", "carol"]);
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice", "bob", "carol"]);

        assert_eq!(
            session.join(user("dave")).unwrap_err(),
            SetupError::PlayerLimitReached { max: 3 }
        );
        assert_eq!(session.players().len(), 3);
    }

    #[test]
    fn test_join_rejects_duplicates() {
        let mut session = session();
        session.toggle_access();
        assert!(matches!(
            session.join(user("alice")),
            Err(SetupError::AlreadyInSession { .. })
        ));
        assert_eq!(session.players().len(), 1);
    }

    #[test]
    fn test_leave_removes_only_the_issuer() {
        // Regression: leaving must drop the issuer, not keep only the issuer
        let mut session = session();
        session.toggle_access();
        session.join(user("bob")).unwrap();
        session.join(user("carol")).unwrap();

        session.leave(&user("bob")).unwrap();
        assert_eq!(ids(session.players()), vec!["alice", "carol"]);
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice", "carol"]);

        assert!(matches!(
            session.leave(&user("bob")),
            Err(SetupError::UserNotInSession { .. })
        ));
    }

    #[test]
    fn test_kick_removes_only_the_target() {
        let mut session = session();
        session.toggle_access();
        session.join(user("bob")).unwrap();
        session.join(user("carol")).unwrap();

        let kicked = session.kick(&user("carol")).unwrap();
        assert_eq!(kicked.id, "carol");
        assert_eq!(ids(session.players()), vec!["alice", "bob"]);
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice", "bob"]);

        assert!(matches!(
            session.kick(&user("zed")),
            Err(SetupError::UserNotInSession { .. })
        ));
        assert_eq!(session.players().len(), 2);
    }

    #[test]
    fn test_plan_invitations() {
        let mut session = session();

        let planned = session
            .plan_invitations(&[user("bob"), user("bob"), user("alice")])
            .unwrap();
        assert_eq!(ids(&planned), vec!["bob"]);

        assert_eq!(
            session
                .plan_invitations(&[user("bob"), user("carol"), user("dave")])
                .unwrap_err(),
            SetupError::PlayerLimitReached { max: 3 }
        );

        session.admit(user("bob")).unwrap();
        session.admit(user("carol")).unwrap();
        assert_eq!(
            session.plan_invitations(&[user("dave")]).unwrap_err(),
            SetupError::PlayerLimitReached { max: 3 }
        );

        session.toggle_access();
        assert_eq!(
            session.plan_invitations(&[user("dave")]).unwrap_err(),
            SetupError::SessionIsPublic
        );
    }

    #[test]
    fn test_set_option_stores_coerced_value() {
        let mut session = session();

        let value = session.set_option("Rounds", " 7 ").unwrap();
        assert_eq!(value, OptionValue::Integer(7));
        assert_eq!(session.options().get("rounds"), Some(&OptionValue::Integer(7)));

        let value = session.set_option("capture", "off").unwrap();
        assert_eq!(value, OptionValue::Bool(false));
    }

    #[test]
    fn test_set_option_errors_leave_options_untouched() {
        let mut session = session();
        let before = session.options().clone();

        assert_eq!(
            session.set_option("timer", "5").unwrap_err(),
            SetupError::UnknownOption {
                key: "timer".to_string()
            }
        );
        assert_eq!(
            session.set_option("rounds", "12").unwrap_err(),
            SetupError::InvalidOption("Rounds must be between 1 and 9!".to_string())
        );
        assert!(matches!(
            session.set_option("rounds", "many"),
            Err(SetupError::InvalidOption(_))
        ));

        assert_eq!(session.options(), &before);
        assert!(!session.options().contains_key("timer"));
    }

    #[test]
    fn test_set_option_without_options() {
        let mut session = session();
        let free_for_all = session.resolve_variant(Some("free for all")).unwrap();
        session.apply_variant(free_for_all);
        assert_eq!(
            session.set_option("rounds", "2").unwrap_err(),
            SetupError::NoOptions
        );
    }

    #[test]
    fn test_set_turn_position() {
        let mut session = session();
        session.admit(user("bob")).unwrap();
        session.admit(user("carol")).unwrap();

        session.set_turn_position(&user("carol"), 1).unwrap();
        assert_eq!(ids(session.turn_order().unwrap()), vec!["carol", "alice", "bob"]);

        session.set_turn_position(&user("carol"), 3).unwrap();
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice", "bob", "carol"]);

        // Player list order is untouched
        assert_eq!(ids(session.players()), vec!["alice", "bob", "carol"]);

        for bad in [0, 4, -1] {
            assert_eq!(
                session.set_turn_position(&user("bob"), bad).unwrap_err(),
                SetupError::InvalidTurnPosition {
                    position: bad.to_string()
                }
            );
        }
        assert!(matches!(
            session.set_turn_position(&user("zed"), 1),
            Err(SetupError::UserNotInSession { .. })
        ));

        session.toggle_random_turns().unwrap();
        assert_eq!(
            session.set_turn_position(&user("bob"), 1).unwrap_err(),
            SetupError::RandomTurnsEnabled
        );
    }

    #[test]
    fn test_variant_with_same_keys_keeps_values() {
        let mut session = session();
        session.set_option("rounds", "8").unwrap();

        let speed = session.resolve_variant(Some("speed")).unwrap();
        assert!(!session.needs_confirmation(speed.as_ref()));

        let reset = session.apply_variant(speed);
        assert!(!reset);
        assert_eq!(session.active_template().variant_name(), "Speed");
        assert_eq!(session.options().get("rounds"), Some(&OptionValue::Integer(8)));
    }

    #[test]
    fn test_variant_with_different_keys_resets() {
        let mut session = session();
        session.set_option("rounds", "8").unwrap();

        let tournament = session.resolve_variant(Some("tournament")).unwrap();
        assert!(session.needs_confirmation(tournament.as_ref()));

        assert!(session.apply_variant(tournament));
        assert_eq!(session.options().get("rounds"), Some(&OptionValue::Integer(5)));
        assert_eq!(session.options().get("seeds"), Some(&OptionValue::Integer(4)));

        // Back to base: keys differ again
        let base = session.resolve_variant(None).unwrap();
        assert!(session.needs_confirmation(base.as_ref()));
        assert!(session.apply_variant(base));
        assert!(session.variant().is_none());
        assert_eq!(session.options().get("rounds"), Some(&OptionValue::Integer(3)));
    }

    #[test]
    fn test_variant_from_empty_options_needs_no_confirmation() {
        let mut session = session();
        let free_for_all = session.resolve_variant(Some("free for all")).unwrap();
        session.apply_variant(free_for_all);
        assert!(session.turn_order().is_none());
        assert!(session.options().is_empty());

        let tournament = session.resolve_variant(Some("tournament")).unwrap();
        assert!(!session.needs_confirmation(tournament.as_ref()));
        session.apply_variant(tournament);
        assert_eq!(session.options().len(), 3);
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice"]);
    }

    #[test]
    fn test_start_boundaries() {
        let mut session = session();
        assert_eq!(
            session.ensure_startable().unwrap_err(),
            SetupError::InsufficientPlayers { needed: 1 }
        );
        assert!(session.prepare_launch().is_err());

        session.admit(user("bob")).unwrap();
        assert!(session.ensure_startable().is_ok());

        session.admit(user("carol")).unwrap();
        assert!(session.ensure_startable().is_ok());
    }

    #[test]
    fn test_prepare_launch_uses_turn_order() {
        let mut session = session();
        session.admit(user("bob")).unwrap();
        session.set_turn_position(&user("bob"), 1).unwrap();

        let launch = session.prepare_launch().unwrap();
        assert_eq!(ids(&launch.players), vec!["bob", "alice"]);
        assert_eq!(launch.id, session.id());
        assert_eq!(launch.options, *session.options());
    }

    #[test]
    fn test_prepare_launch_shuffle_is_a_permutation() {
        let mut session = session();
        session.admit(user("bob")).unwrap();
        session.admit(user("carol")).unwrap();
        session.toggle_random_turns().unwrap();

        let launch = session.prepare_launch().unwrap();
        let mut shuffled = ids(&launch.players);
        shuffled.sort();
        assert_eq!(shuffled, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_prepare_launch_keeps_session_turn_order() {
        let mut session = session();
        session.admit(user("bob")).unwrap();
        session.admit(user("carol")).unwrap();
        session.toggle_random_turns().unwrap();

        for _ in 0..20 {
            session.prepare_launch().unwrap();
            assert_eq!(ids(session.turn_order().unwrap()), vec!["alice", "bob", "carol"]);
        }
    }

    #[test]
    fn test_render_status() {
        let mut session = session();
        session.admit(user("bob")).unwrap();

        let status = session.render_status();
        assert!(status.contains("**Setting up game:** Mancala"));
        assert!(status.contains("**Host:** alice#0001"));
        assert!(status.contains("**Private game**"));
        assert!(status.contains("alice#0001 bob#0001"));
        assert!(status.contains("alice#0001, bob#0001"));
        assert!(status.contains("**Variant selected:**\nStandard"));
        assert!(status.contains("> rounds - *3*"));
        assert!(status.contains("`gm!setup start`"));
        assert!(status.contains("120 seconds"));

        // Pure function of state
        assert_eq!(status, session.render_status());

        session.toggle_random_turns().unwrap();
        session.toggle_access();
        let status = session.render_status();
        assert!(status.contains("*Randomized!*"));
        assert!(status.contains("**Public game**"));
    }

    #[test]
    fn test_render_status_without_options() {
        let mut session = session();
        let free_for_all = session.resolve_variant(Some("free for all")).unwrap();
        session.apply_variant(free_for_all);

        let status = session.render_status();
        assert!(status.contains("This game has no options available."));
        assert!(!status.contains("**Current turn order:**"));
        assert!(status.contains("Free For All"));
    }

    #[test]
    fn test_rematch() {
        let definition = definition();
        let previous = PreviousGame {
            template: Arc::clone(&definition.variants()[0]),
            players: vec![user("bob"), user("alice"), user("carol")],
            options: definition.variants()[0].default_options().clone(),
        };

        let session = Session::rematch(
            ChannelKey::new("guild", "games"),
            user("alice"),
            definition,
            &previous,
            &SetupConfig::default(),
        );

        assert_eq!(ids(session.players()), vec!["alice", "bob", "carol"]);
        assert_eq!(ids(session.turn_order().unwrap()), vec!["alice", "bob", "carol"]);
        assert_eq!(session.active_template().variant_name(), "Speed");
        assert_eq!(session.options().get("rounds"), Some(&OptionValue::Integer(1)));
    }
}
