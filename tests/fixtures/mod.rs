//! Test fixtures and recording game implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use table_setup::config::SetupConfig;
use table_setup::error::Result;
use table_setup::game::{
    ActiveGame, GameDefinition, GameLaunch, GameRules, GameTemplate, OptionValue,
    StaticGameProvider,
};
use table_setup::session::SessionManager;
use table_setup::transport::InMemoryTransport;
use table_setup::types::{ChannelKey, InboundMessage, SessionId, User};

/// Game that only counts how often it was started
pub struct RecordingGame {
    launch: GameLaunch,
    starts: Arc<AtomicUsize>,
}

#[async_trait]
impl ActiveGame for RecordingGame {
    fn id(&self) -> SessionId {
        self.launch.id
    }

    fn name(&self) -> String {
        self.launch.template.name().to_string()
    }

    async fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Rules that record every launch and build a [`RecordingGame`]
#[derive(Default)]
pub struct RecordingRules {
    launches: Mutex<Vec<GameLaunch>>,
    starts: Arc<AtomicUsize>,
}

impl RecordingRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// All launches so far (for testing)
    pub fn launches(&self) -> Vec<GameLaunch> {
        self.launches
            .lock()
            .map(|launches| launches.clone())
            .unwrap_or_default()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl GameRules for RecordingRules {
    fn validate_option(
        &self,
        key: &str,
        raw: &str,
        current: &table_setup::game::GameOptions,
    ) -> std::result::Result<OptionValue, String> {
        let value = current
            .get(key)
            .ok_or_else(|| format!("no option {}", key))?
            .coerce_like(raw)?;

        if let OptionValue::Integer(number) = value {
            if number < 4 {
                return Err(format!("The board needs at least 4 {}!", key));
            }
        }
        Ok(value)
    }

    fn create_game(&self, launch: GameLaunch) -> Result<Arc<dyn ActiveGame>> {
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(launch.clone());
        }
        Ok(Arc::new(RecordingGame {
            launch,
            starts: Arc::clone(&self.starts),
        }))
    }
}

/// Two-player game with a same-keys variant and a different-keys variant
pub fn connect_four(rules: Arc<RecordingRules>) -> GameDefinition {
    let template = |variant: &str| {
        GameTemplate::new("Connect Four", rules.clone())
            .with_variant_name(variant)
            .with_players(2, 2)
            .with_turn_order(true)
            .with_option("columns", OptionValue::Integer(7))
            .with_option("rows", OptionValue::Integer(6))
    };

    GameDefinition::new(template("Standard"))
        .with_variant(template("Pop Out"))
        .with_variant(template("Five In A Row").with_option("gravity", OptionValue::Bool(true)))
}

/// Game for up to four players without turn order or variants
pub fn trivia(rules: Arc<RecordingRules>) -> GameDefinition {
    GameDefinition::new(GameTemplate::new("Trivia", rules).with_players(1, 4))
}

/// A complete system on one channel
pub struct TestSystem {
    pub manager: SessionManager,
    pub transport: Arc<InMemoryTransport>,
    pub rules: Arc<RecordingRules>,
    pub key: ChannelKey,
}

impl TestSystem {
    /// Open a session for `game` hosted by `host`
    pub fn open(&self, host: &User, game: &str) {
        self.manager
            .open_session(self.key.clone(), host.clone(), game, self.transport.clone())
            .expect("session should open");
    }

    /// Run `setup <args>` as `issuer`
    pub async fn setup(
        &self,
        issuer: &User,
        args: &[&str],
        mentions: &[User],
    ) -> Result<table_setup::types::CommandOutcome> {
        self.manager
            .dispatch(&self.key, issuer.clone(), args, mentions)
            .await
    }

    /// Deliver a plain channel message from `author`
    pub fn say(&self, author: &User, text: &str) -> usize {
        self.transport
            .deliver(InboundMessage::new(author.clone(), text))
    }
}

pub fn create_test_system() -> TestSystem {
    create_test_system_with(SetupConfig::default())
}

pub fn create_test_system_with(config: SetupConfig) -> TestSystem {
    let rules = Arc::new(RecordingRules::new());
    let games = StaticGameProvider::with_games(vec![
        connect_four(rules.clone()),
        trivia(rules.clone()),
    ])
    .expect("fixture games are valid");

    TestSystem {
        manager: SessionManager::new(Arc::new(games), config),
        transport: Arc::new(InMemoryTransport::new()),
        rules,
        key: ChannelKey::new("guild", "table"),
    }
}

pub fn user(name: &str) -> User {
    User::new(name, format!("{}#{:04}", name, name.len()))
}

/// Let spawned tasks run; with paused time this also advances the clock a little
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
