//! Session actor: one Tokio task per setup session
//!
//! The actor is the only writer of its [`Session`]. Commands arrive through a
//! [`SessionHandle`]; invitation and confirmation waits run as separate tasks
//! and report back over an internal channel, so every state change happens
//! on the actor task. All sub-flow tasks hang off one cancellation token that
//! is cancelled when the session starts or aborts.

use crate::config::SetupConfig;
use crate::error::{Result, SetupError};
use crate::game::GameTemplate;
use crate::session::command::SetupCommand;
use crate::session::manager::SessionManagerStats;
use crate::session::registry::GameRegistry;
use crate::session::state::{Session, SessionSnapshot};
use crate::transport::{MessageFilter, MessageTransport};
use crate::types::{AbortReason, ChannelKey, CommandOutcome, MessageId, SessionId, User, UserId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const ACCEPT_TOKEN: &str = "accept";
const CONFIRM_TOKEN: &str = "confirm";
const CANCEL_TOKEN: &str = "cancel";

/// Requests sent to a session actor through its handle
pub(crate) enum SessionRequest {
    Command {
        command: SetupCommand,
        issuer: User,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Abort {
        reason: AbortReason,
        reply: oneshot::Sender<()>,
    },
}

/// Answer to a variant-change confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationAnswer {
    Confirm,
    Cancel,
    TimedOut,
}

/// Results reported by sub-flow tasks
#[derive(Debug)]
enum SubflowEvent {
    InvitationResolved { invitee: User, accepted: bool },
    ConfirmationResolved { answer: ConfirmationAnswer },
}

struct PendingConfirmation {
    target: Option<Arc<GameTemplate>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Collaborators injected into every session
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<GameRegistry>,
    pub transport: Arc<dyn MessageTransport>,
    pub config: SetupConfig,
    pub stats: Arc<RwLock<SessionManagerStats>>,
}

/// Handle to a running session actor
///
/// Cheap to clone; the registry keeps one per configuring session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    key: ChannelKey,
    sender: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    pub(crate) fn from_parts(
        id: SessionId,
        key: ChannelKey,
        sender: mpsc::Sender<SessionRequest>,
    ) -> Self {
        Self { id, key, sender }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Run a setup command and wait for its outcome
    pub async fn handle(&self, command: SetupCommand, issuer: User) -> Result<CommandOutcome> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SessionRequest::Command {
                command,
                issuer,
                reply,
            })
            .await
            .map_err(|_| SetupError::SessionClosed)?;
        response.await.map_err(|_| SetupError::SessionClosed)?
    }

    /// Current session state including pending sub-flows
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SessionRequest::Snapshot { reply })
            .await
            .map_err(|_| SetupError::SessionClosed)?;
        response.await.map_err(|_| SetupError::SessionClosed)
    }

    /// Abort the session from outside (e.g. on service shutdown)
    pub async fn abort(&self, reason: AbortReason) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SessionRequest::Abort { reason, reply })
            .await
            .map_err(|_| SetupError::SessionClosed)?;
        response.await.map_err(|_| SetupError::SessionClosed)
    }
}

/// The actor task state
pub struct SessionActor {
    session: Session,
    ctx: SessionContext,
    receiver: mpsc::Receiver<SessionRequest>,
    events_tx: mpsc::UnboundedSender<SubflowEvent>,
    events_rx: mpsc::UnboundedReceiver<SubflowEvent>,
    cancel: CancellationToken,
    invitations: HashMap<UserId, CancellationToken>,
    confirmation: Option<PendingConfirmation>,
    status_message: Option<MessageId>,
    deadline: Instant,
    warned: bool,
}

impl SessionActor {
    /// Create the actor and a handle to it; nothing runs until [`run`](Self::run)
    pub fn new(session: Session, ctx: SessionContext) -> (Self, SessionHandle) {
        let (sender, receiver) = mpsc::channel(ctx.config.command_buffer.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::from_parts(session.id(), session.key().clone(), sender);
        let deadline = Instant::now() + ctx.config.inactivity_timeout();

        let actor = Self {
            session,
            ctx,
            receiver,
            events_tx,
            events_rx,
            cancel: CancellationToken::new(),
            invitations: HashMap::new(),
            confirmation: None,
            status_message: None,
            deadline,
            warned: false,
        };
        (actor, handle)
    }

    /// Run the actor on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process requests and sub-flow results until the session ends
    pub async fn run(mut self) {
        info!(
            session_id = %self.session.id(),
            key = %self.session.key(),
            game = self.session.definition().name(),
            host = %self.session.host().id,
            "setup session started"
        );
        self.publish_status().await;

        let game_name = self.session.definition().name().to_string();
        loop {
            let deadline = self.deadline;
            let warning = self.ctx.config.inactivity_warning();
            let warn_at = deadline.checked_sub(warning).unwrap_or(deadline);
            let warning_armed = !self.warned && !warning.is_zero();

            tokio::select! {
                biased;

                Some(event) = self.events_rx.recv() => self.on_subflow(event).await,

                request = self.receiver.recv() => {
                    let Some(request) = request else {
                        self.abort(AbortReason::Shutdown).await;
                        break;
                    };
                    if self.on_request(request).await == Flow::Stop {
                        break;
                    }
                }

                _ = sleep_until(warn_at), if warning_armed => {
                    self.warned = true;
                    self.notify(&format!(
                        "Setup for game \"{}\" will time out in {} seconds unless a command is issued.",
                        game_name,
                        warning.as_secs()
                    ))
                    .await;
                }

                _ = sleep_until(deadline) => {
                    self.notify(&format!("Setup for game \"{}\" has timed out.", game_name))
                        .await;
                    self.abort(AbortReason::TimedOut).await;
                    break;
                }
            }
        }

        debug!(session_id = %self.session.id(), "setup session actor stopped");
    }

    async fn on_request(&mut self, request: SessionRequest) -> Flow {
        match request {
            SessionRequest::Command {
                command,
                issuer,
                reply,
            } => {
                debug!(
                    session_id = %self.session.id(),
                    command = command.name(),
                    issuer = %issuer.id,
                    "handling setup command"
                );

                let result = self.execute(command, &issuer).await;
                let flow = match &result {
                    Ok(outcome) if outcome.is_terminal() => Flow::Stop,
                    Ok(_) => {
                        self.touch();
                        Flow::Continue
                    }
                    Err(error) => {
                        debug!(session_id = %self.session.id(), "setup command rejected: {}", error);
                        self.notify(&error.to_string()).await;
                        Flow::Continue
                    }
                };

                let _ = reply.send(result);
                flow
            }
            SessionRequest::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Flow::Continue
            }
            SessionRequest::Abort { reason, reply } => {
                self.notify(&format!(
                    "Setup for game \"{}\" has been aborted.",
                    self.session.definition().name()
                ))
                .await;
                self.abort(reason).await;
                let _ = reply.send(());
                Flow::Stop
            }
        }
    }

    async fn execute(&mut self, command: SetupCommand, issuer: &User) -> Result<CommandOutcome> {
        match command {
            SetupCommand::ToggleAccess => {
                let notice = if self.session.toggle_access() {
                    "The game is now **public** - anyone may join the game."
                } else {
                    "The game is now **private** - you must invite users to let them join."
                };
                self.notify(notice).await;
                self.refresh_status().await;
            }

            SetupCommand::Invite(invitees) => {
                let planned = self.session.plan_invitations(&invitees)?;
                let fresh: Vec<User> = planned
                    .into_iter()
                    .filter(|user| !self.invitations.contains_key(&user.id))
                    .collect();

                if fresh.is_empty() {
                    self.notify("Everyone mentioned is already playing or invited.")
                        .await;
                    return Ok(CommandOutcome::Updated);
                }

                let count = fresh.len() as u64;
                for invitee in fresh {
                    self.spawn_invitation(invitee);
                }
                self.record_stats(|stats| stats.invitations_sent += count);

                self.notify(&format!(
                    "Users have been invited! The relevant user(s) must type \"{}\" to join the game within {} seconds.",
                    ACCEPT_TOKEN, self.ctx.config.invite_timeout_seconds
                ))
                .await;
            }

            SetupCommand::Join => {
                self.session.join(issuer.clone())?;
                self.notify(&format!("{} has joined the game!", issuer)).await;
                self.refresh_status().await;
            }

            SetupCommand::SetOption { key, value } => {
                let stored = self.session.set_option(&key, &value)?;
                self.notify(&format!("Option `{}` has been set to: `{}`.", key, stored))
                    .await;
                self.refresh_status().await;
            }

            SetupCommand::SetTurnPosition { user, position } => {
                self.session.set_turn_position(&user, position)?;
                self.refresh_status().await;
            }

            SetupCommand::ToggleRandomTurns => {
                let random = self.session.toggle_random_turns()?;
                self.notify(&format!("Random Turn Order has been toggled to: `{}`.", random))
                    .await;
                self.refresh_status().await;
            }

            SetupCommand::SetVariant(query) => {
                if self.confirmation.is_some() {
                    return Err(SetupError::ConfirmationPending);
                }

                let target = self.session.resolve_variant(query.as_deref())?;
                if self.session.needs_confirmation(target.as_ref()) {
                    self.request_confirmation(target, issuer).await;
                    return Ok(CommandOutcome::AwaitingConfirmation);
                }

                self.session.apply_variant(target);
                self.announce_variant().await;
                self.refresh_status().await;
            }

            SetupCommand::Resend => {
                if let Some(message) = self.status_message.take() {
                    if let Err(error) = self.ctx.transport.delete(message).await {
                        warn!(session_id = %self.session.id(), "Failed to delete status message: {}", error);
                    }
                }
                self.publish_status().await;
            }

            SetupCommand::Leave => {
                self.session.leave(issuer)?;
                self.notify(&format!("{} has left the game.", issuer)).await;

                if self.session.players().is_empty() {
                    self.notify(&format!(
                        "Everyone has left - setup for game \"{}\" has been closed.",
                        self.session.definition().name()
                    ))
                    .await;
                    self.abort(AbortReason::Abandoned).await;
                    return Ok(CommandOutcome::Aborted(AbortReason::Abandoned));
                }
                self.refresh_status().await;
            }

            SetupCommand::Kick(user) => {
                let kicked = self.session.kick(&user)?;
                self.notify(&format!("Player **{}** has been kicked from the game.", kicked))
                    .await;
                self.refresh_status().await;
            }

            SetupCommand::Start => return self.start_game().await,

            SetupCommand::Cancel => {
                self.notify(&format!(
                    "Setup for game \"{}\" has been aborted.",
                    self.session.definition().name()
                ))
                .await;
                self.abort(AbortReason::Cancelled).await;
                return Ok(CommandOutcome::Aborted(AbortReason::Cancelled));
            }
        }

        Ok(CommandOutcome::Updated)
    }

    async fn on_subflow(&mut self, event: SubflowEvent) {
        match event {
            SubflowEvent::InvitationResolved { invitee, accepted } => {
                if self.invitations.remove(&invitee.id).is_none() {
                    return;
                }

                if !accepted {
                    debug!(session_id = %self.session.id(), invitee = %invitee.id, "invitation expired");
                    self.notify(&format!("Invite for user **{}** has timed out.", invitee))
                        .await;
                    return;
                }

                match self.session.admit(invitee.clone()) {
                    Ok(()) => {
                        info!(session_id = %self.session.id(), invitee = %invitee.id, "invitation accepted");
                        self.notify(&format!("{} Invite accepted!", invitee)).await;
                        self.refresh_status().await;
                    }
                    Err(error) => self.notify(&error.to_string()).await,
                }
            }

            SubflowEvent::ConfirmationResolved { answer } => {
                let Some(pending) = self.confirmation.take() else {
                    return;
                };

                match answer {
                    ConfirmationAnswer::Confirm => {
                        self.session.apply_variant(pending.target);
                        self.announce_variant().await;
                        self.refresh_status().await;
                    }
                    ConfirmationAnswer::Cancel => {
                        self.notify("Variant setting has been cancelled.").await;
                    }
                    ConfirmationAnswer::TimedOut => {
                        self.notify(&SetupError::Timeout.to_string()).await;
                    }
                }
            }
        }
    }

    fn spawn_invitation(&mut self, invitee: User) {
        let token = self.cancel.child_token();
        let task_token = token.clone();
        let transport = Arc::clone(&self.ctx.transport);
        let events = self.events_tx.clone();
        let filter = MessageFilter::new(invitee.id.clone(), [ACCEPT_TOKEN]);
        let timeout = self.ctx.config.invite_timeout();

        self.invitations.insert(invitee.id.clone(), token);

        tokio::spawn(async move {
            let accepted = tokio::select! {
                _ = task_token.cancelled() => return,
                result = transport.await_matching_message(filter, timeout) => match result {
                    Ok(_) => true,
                    Err(SetupError::Timeout) => false,
                    Err(error) => {
                        warn!(invitee = %invitee.id, "invitation wait failed: {}", error);
                        false
                    }
                },
            };
            let _ = events.send(SubflowEvent::InvitationResolved { invitee, accepted });
        });
    }

    async fn request_confirmation(&mut self, target: Option<Arc<GameTemplate>>, issuer: &User) {
        let label = target
            .as_ref()
            .unwrap_or_else(|| self.session.definition().base())
            .variant_name()
            .to_string();

        self.notify(&format!(
            "**Warning:** The variant `{}`'s options do not match the current variant's options. \
             Changing the variation will cause game options to reset!\n\
             Please type \"{}\" within {} seconds to confirm this change, or \"{}\" to abort this operation.",
            label, CONFIRM_TOKEN, self.ctx.config.confirmation_timeout_seconds, CANCEL_TOKEN
        ))
        .await;

        let token = self.cancel.child_token();
        let transport = Arc::clone(&self.ctx.transport);
        let events = self.events_tx.clone();
        let filter = MessageFilter::new(issuer.id.clone(), [CONFIRM_TOKEN, CANCEL_TOKEN]);
        let timeout = self.ctx.config.confirmation_timeout();

        tokio::spawn(async move {
            let answer = tokio::select! {
                _ = token.cancelled() => return,
                result = transport.await_matching_message(filter, timeout) => match result {
                    Ok(message) if message.content.trim().eq_ignore_ascii_case(CONFIRM_TOKEN) => {
                        ConfirmationAnswer::Confirm
                    }
                    Ok(_) => ConfirmationAnswer::Cancel,
                    Err(SetupError::Timeout) => ConfirmationAnswer::TimedOut,
                    Err(error) => {
                        warn!("confirmation wait failed: {}", error);
                        ConfirmationAnswer::Cancel
                    }
                },
            };
            let _ = events.send(SubflowEvent::ConfirmationResolved { answer });
        });

        self.confirmation = Some(PendingConfirmation { target });
    }

    async fn announce_variant(&self) {
        self.notify(&format!(
            "The game variant has been set to: **{}**.",
            self.session.active_template().variant_name()
        ))
        .await;
    }

    async fn start_game(&mut self) -> Result<CommandOutcome> {
        let launch = self.session.prepare_launch()?;
        let template = Arc::clone(&launch.template);
        let player_count = launch.players.len();

        let game = template.rules().create_game(launch)?;
        self.ctx
            .registry
            .promote(self.session.key(), self.session.id(), Arc::clone(&game))?;

        self.stop_subflows();
        self.record_stats(|stats| {
            stats.games_started += 1;
            stats.active_sessions = stats.active_sessions.saturating_sub(1);
        });

        let session_id = self.session.id();
        info!(
            session_id = %session_id,
            key = %self.session.key(),
            game = template.name(),
            variant = template.variant_name(),
            players = player_count,
            "setup complete, starting game"
        );
        self.notify(&format!("Starting game \"{}\"!", template.name()))
            .await;

        tokio::spawn(async move {
            if let Err(error) = game.start().await {
                error!(session_id = %session_id, "Active game failed to start: {}", error);
            }
        });

        Ok(CommandOutcome::Started {
            game_id: session_id,
        })
    }

    /// Cancel every invitation and confirmation task
    fn stop_subflows(&mut self) {
        self.cancel.cancel();
        self.invitations.clear();
        self.confirmation = None;
    }

    async fn abort(&mut self, reason: AbortReason) {
        self.stop_subflows();

        match self
            .ctx
            .registry
            .release(self.session.key(), self.session.id())
        {
            Ok(true) => {}
            Ok(false) => warn!(
                session_id = %self.session.id(),
                "registry slot was no longer held by this session"
            ),
            Err(error) => error!(session_id = %self.session.id(), "Failed to release registry slot: {}", error),
        }

        self.record_stats(|stats| {
            stats.sessions_aborted += 1;
            stats.active_sessions = stats.active_sessions.saturating_sub(1);
        });

        info!(
            session_id = %self.session.id(),
            key = %self.session.key(),
            reason = %reason,
            "setup session aborted"
        );
    }

    fn touch(&mut self) {
        self.deadline = Instant::now() + self.ctx.config.inactivity_timeout();
        self.warned = false;
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = self.session.snapshot();
        let mut pending: Vec<UserId> = self.invitations.keys().cloned().collect();
        pending.sort();
        snapshot.pending_invitations = pending;
        snapshot.awaiting_confirmation = self.confirmation.is_some();
        snapshot
    }

    fn record_stats(&self, update: impl FnOnce(&mut SessionManagerStats)) {
        match self.ctx.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire stats lock"),
        }
    }

    /// Post a one-line notice; failures are logged and swallowed
    async fn notify(&self, text: &str) {
        if let Err(error) = self.ctx.transport.publish(text).await {
            warn!(session_id = %self.session.id(), "Failed to publish notice: {}", error);
        }
    }

    async fn publish_status(&mut self) {
        match self
            .ctx
            .transport
            .publish(&self.session.render_status())
            .await
        {
            Ok(message) => self.status_message = Some(message),
            Err(error) => {
                warn!(session_id = %self.session.id(), "Failed to publish status message: {}", error)
            }
        }
    }

    async fn refresh_status(&mut self) {
        let Some(message) = self.status_message else {
            self.publish_status().await;
            return;
        };

        if let Err(error) = self
            .ctx
            .transport
            .edit(message, &self.session.render_status())
            .await
        {
            warn!(session_id = %self.session.id(), "Failed to update status message: {}", error);
        }
    }
}
