//! Console entry point for the Table Setup service
//!
//! Simulates a single chat channel on stdin/stdout. Each input line has the
//! form `name: message`; lines starting with the command prefix drive the
//! session manager, everything else is delivered to waiting listeners so
//! invitees can `accept` and hosts can `confirm`.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use table_setup::config::{validate_config, AppConfig};
use table_setup::game::{
    ActiveGame, GameDefinition, GameLaunch, GameRules, GameTemplate, OptionValue,
    StaticGameProvider,
};
use table_setup::session::{PreviousGame, SessionManager};
use table_setup::transport::{InMemoryTransport, OutboundEvent};
use table_setup::types::{ChannelKey, InboundMessage, SessionId, User};
use table_setup::utils::is_mention;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Table Setup - configure chat games before they start
#[derive(Parser)]
#[command(
    name = "table-setup",
    version,
    about = "Console simulation of pre-game setup sessions for a chat game bot",
    long_about = "Reads `name: message` lines from stdin as messages in a single chat channel. \
                 Lines starting with the command prefix run bot commands (`setup`, `games`, \
                 `snapshot`, `rematch`); every other line is visible to invitation and \
                 confirmation prompts."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Command prefix override
    #[arg(long, value_name = "PREFIX", help = "Override the bot command prefix")]
    prefix: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without reading input")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from environment, file and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(prefix) = &args.prefix {
        config.setup.command_prefix = prefix.clone();
    }

    validate_config(&config)?;
    Ok(config)
}

fn display_startup_banner(config: &AppConfig) {
    info!("Table Setup console");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Prefix: {}", config.setup.command_prefix);
    info!(
        "   Inactivity timeout: {}s (warning {}s before)",
        config.setup.inactivity_timeout_seconds, config.setup.inactivity_warning_seconds
    );
    info!(
        "   Invite timeout: {}s, confirmation timeout: {}s",
        config.setup.invite_timeout_seconds, config.setup.confirmation_timeout_seconds
    );
}

/// A finished console game, reported back to the input loop
struct FinishedGame {
    key: ChannelKey,
    game_id: SessionId,
    previous: PreviousGame,
}

/// Game that announces its line-up and finishes immediately
struct ConsoleGame {
    launch: GameLaunch,
    finished: mpsc::UnboundedSender<FinishedGame>,
}

#[async_trait]
impl ActiveGame for ConsoleGame {
    fn id(&self) -> SessionId {
        self.launch.id
    }

    fn name(&self) -> String {
        self.launch.template.name().to_string()
    }

    async fn start(&self) -> table_setup::Result<()> {
        let players: Vec<String> = self.launch.players.iter().map(ToString::to_string).collect();
        println!(
            "[game] {} ({}) started with {}",
            self.launch.template.name(),
            self.launch.template.variant_name(),
            players.join(", ")
        );
        for (key, value) in &self.launch.options {
            println!("[game]   {} = {}", key, value);
        }
        info!("Console game {} finished", self.launch.id);

        let _ = self.finished.send(FinishedGame {
            key: self.launch.key.clone(),
            game_id: self.launch.id,
            previous: PreviousGame {
                template: Arc::clone(&self.launch.template),
                players: self.launch.players.clone(),
                options: self.launch.options.clone(),
            },
        });
        Ok(())
    }
}

struct ConsoleRules {
    finished: mpsc::UnboundedSender<FinishedGame>,
}

impl GameRules for ConsoleRules {
    fn validate_option(
        &self,
        key: &str,
        raw: &str,
        current: &table_setup::game::GameOptions,
    ) -> std::result::Result<OptionValue, String> {
        let value = current
            .get(key)
            .ok_or_else(|| format!("The game option `{}` was not found!", key))?
            .coerce_like(raw)?;

        if let OptionValue::Integer(number) = value {
            if !(1..=50).contains(&number) {
                return Err(format!("`{}` must be between 1 and 50!", key));
            }
        }
        Ok(value)
    }

    fn create_game(&self, launch: GameLaunch) -> table_setup::Result<Arc<dyn ActiveGame>> {
        Ok(Arc::new(ConsoleGame {
            launch,
            finished: self.finished.clone(),
        }))
    }
}

fn demo_games(finished: mpsc::UnboundedSender<FinishedGame>) -> Result<StaticGameProvider> {
    let rules: Arc<dyn GameRules> = Arc::new(ConsoleRules { finished });

    let connect_four = GameDefinition::new(
        GameTemplate::new("Connect Four", rules.clone())
            .with_alias("c4")
            .with_players(2, 2)
            .with_turn_order(true)
            .with_option("columns", OptionValue::Integer(7))
            .with_option("rows", OptionValue::Integer(6)),
    )
    .with_variant(
        GameTemplate::new("Connect Four", rules.clone())
            .with_variant_name("Pop Out")
            .with_players(2, 2)
            .with_turn_order(true)
            .with_option("columns", OptionValue::Integer(7))
            .with_option("rows", OptionValue::Integer(6)),
    )
    .with_variant(
        GameTemplate::new("Connect Four", rules.clone())
            .with_variant_name("Five In A Row")
            .with_players(2, 2)
            .with_turn_order(true)
            .with_option("columns", OptionValue::Integer(9))
            .with_option("rows", OptionValue::Integer(6))
            .with_option("gravity", OptionValue::Bool(true)),
    );

    let trivia = GameDefinition::new(
        GameTemplate::new("Trivia", rules)
            .with_players(1, 8)
            .with_option("questions", OptionValue::Integer(10))
            .with_option("category", OptionValue::Text("general".to_string())),
    );

    Ok(StaticGameProvider::with_games(vec![connect_four, trivia])?)
}

/// Print everything the transport posts
async fn print_outbound(mut events: mpsc::UnboundedReceiver<OutboundEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            OutboundEvent::Published { id, text } => println!("[bot #{}] {}", id, text),
            OutboundEvent::Edited { id, text } => println!("[bot #{} edited] {}", id, text),
            OutboundEvent::Deleted { id } => println!("[bot #{} deleted]", id),
        }
    }
}

fn console_user(name: &str) -> User {
    let name = name.trim_start_matches("<@").trim_start_matches('@');
    let name = name.trim_end_matches('>');
    User::new(name, name)
}

/// Split a `name: text` line into a message
fn parse_line(line: &str) -> Option<InboundMessage> {
    let (author, content) = line.split_once(':')?;
    let author = author.trim();
    if author.is_empty() {
        return None;
    }

    let mentions = content
        .split_whitespace()
        .filter(|token| is_mention(token))
        .map(console_user)
        .collect();
    Some(InboundMessage::new(console_user(author), content.trim()).with_mentions(mentions))
}

struct Console {
    manager: SessionManager,
    transport: Arc<InMemoryTransport>,
    key: ChannelKey,
    prefix: String,
    last_game: Option<PreviousGame>,
}

impl Console {
    async fn handle_message(&mut self, message: InboundMessage) {
        let Some(body) = message.content.strip_prefix(self.prefix.as_str()) else {
            self.transport.deliver(message);
            return;
        };

        let args: Vec<&str> = body.split_whitespace().collect();
        match args.split_first() {
            Some((&"setup", rest)) => self.setup(&message, rest).await,
            Some((&"games", _)) => self.list_games(),
            Some((&"snapshot", _)) => self.print_snapshot().await,
            Some((&"rematch", _)) => self.rematch(&message),
            Some((other, _)) => println!("[console] unknown command `{}`", other),
            None => {}
        }
    }

    async fn setup(&self, message: &InboundMessage, args: &[&str]) {
        if self.manager.session(&self.key).is_none() {
            let query = args.join(" ");
            if let Err(e) = self.manager.open_session(
                self.key.clone(),
                message.author.clone(),
                &query,
                self.transport.clone(),
            ) {
                println!("[console] {}", e);
            }
            return;
        }

        // Session errors are already posted to the channel by the session itself
        if let Err(e) = self
            .manager
            .dispatch(&self.key, message.author.clone(), args, &message.mentions)
            .await
        {
            info!("Setup command failed: {}", e);
        }
    }

    fn rematch(&self, message: &InboundMessage) {
        let Some(previous) = &self.last_game else {
            println!("[console] no finished game to rematch");
            return;
        };

        if let Err(e) = self.manager.open_rematch(
            self.key.clone(),
            message.author.clone(),
            previous,
            self.transport.clone(),
        ) {
            println!("[console] {}", e);
        }
    }

    fn list_games(&self) {
        for game in self.manager.available_games() {
            let base = game.base();
            let variants: Vec<&str> = game
                .variants()
                .iter()
                .map(|variant| variant.variant_name())
                .collect();
            println!(
                "[console] {} ({}-{} players){}",
                game.name(),
                base.min_players(),
                base.max_players(),
                if variants.is_empty() {
                    String::new()
                } else {
                    format!(", variants: {}", variants.join(", "))
                }
            );
        }
    }

    async fn print_snapshot(&self) {
        let Some(handle) = self.manager.session(&self.key) else {
            println!("[console] no setup in progress");
            return;
        };

        match handle.snapshot().await {
            Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            },
            Err(e) => println!("[console] {}", e),
        }
    }

    fn game_finished(&mut self, finished: FinishedGame) {
        match self.manager.finish_game(&finished.key, finished.game_id) {
            Ok(true) => println!(
                "[console] game over, `{}rematch` sets up the same table again",
                self.prefix
            ),
            Ok(false) => warn!("Finished game {} held no channel", finished.game_id),
            Err(e) => error!("Failed to release finished game: {}", e),
        }
        self.last_game = Some(finished.previous);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);
    if args.dry_run {
        info!("Dry run completed - configuration is valid");
        return Ok(());
    }

    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    let games = demo_games(finished_tx)?;

    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_outbound(output_rx));

    let mut console = Console {
        manager: SessionManager::new(Arc::new(games), config.setup.clone()),
        transport: Arc::new(InMemoryTransport::with_output(output_tx)),
        key: ChannelKey::new("console", "table"),
        prefix: config.setup.command_prefix.clone(),
        last_game: None,
    };

    println!(
        "Type `name: message`. Try `alice: {}games` or `alice: {}setup trivia`.",
        console.prefix, console.prefix
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(finished) = finished_rx.recv() => console.game_finished(finished),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Some(message) => console.handle_message(message).await,
                    None if line.trim().is_empty() => {}
                    None => println!("[console] expected `name: message`"),
                }
            }
        }
    }

    let aborted = console.manager.shutdown().await;
    info!("Input closed, {} setup(s) aborted", aborted);

    drop(console);
    if let Err(e) = printer.await {
        warn!("Output printer stopped abnormally: {}", e);
    }
    Ok(())
}
