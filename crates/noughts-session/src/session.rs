//! Session actor: an isolated Tokio task that owns one game.
//!
//! Every operation on a game travels through the actor's command channel
//! and is handled one at a time, so two moves racing for the same turn are
//! always validated in sequence: the second one sees the board the first
//! one left behind. Sessions never share state, so unrelated games never
//! wait on each other.
//!
//! The actor also owns the fan-out. Each joined connection registers an
//! [`Outbox`]; after a state change the actor pushes the resulting events
//! into every registered outbox before replying to the caller.

use std::collections::HashMap;

use noughts_game::{Game, GameError, Phase, Role, Snapshot};
use noughts_protocol::{GameId, ServerEvent};
use noughts_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::SessionError;

/// Channel sender for delivering outbound events to one connection.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a session actor through its channel.
enum SessionCommand {
    Join {
        conn: ConnectionId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<Role, GameError>>,
    },
    Move {
        conn: ConnectionId,
        row: usize,
        col: usize,
        reply: oneshot::Sender<Result<Snapshot, GameError>>,
    },
    Disconnect {
        conn: ConnectionId,
        reply: oneshot::Sender<Departure>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    RetireIfEmpty {
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Result of removing a connection from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The snapshot broadcast to the remaining connections, if the
    /// departure ended the game.
    pub snapshot: Option<Snapshot>,
    /// Connections still bound after the departure.
    pub remaining: usize,
}

/// Session metadata (not the board itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub game_id: GameId,
    pub phase: Phase,
    /// Symbols ever bound (0, 1 or 2).
    pub players: usize,
    pub spectators: usize,
    /// Connections currently receiving this session's events.
    pub connections: usize,
}

/// Handle to a running session actor.
///
/// Cheap to clone. The registry keeps one; connection tasks borrow a clone
/// for the duration of a single request.
#[derive(Clone)]
pub struct SessionHandle {
    game_id: GameId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Returns the session's public id.
    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    /// Binds `conn` to the game and registers its outbox.
    ///
    /// The joiner receives `player_assigned` followed by `game_state`. The
    /// join that binds the second player broadcasts that `game_state` to
    /// every connection instead of only the joiner.
    pub async fn join(&self, conn: ConnectionId, outbox: Outbox) -> Result<Role, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Join {
            conn,
            outbox,
            reply,
        })
        .await?;
        Ok(self.receive(rx).await??)
    }

    /// Plays a move for `conn`. On success every bound connection has
    /// already been sent the new `game_state` when this returns.
    pub async fn make_move(
        &self,
        conn: ConnectionId,
        row: usize,
        col: usize,
    ) -> Result<Snapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Move {
            conn,
            row,
            col,
            reply,
        })
        .await?;
        Ok(self.receive(rx).await??)
    }

    /// Removes `conn` from the session.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<Departure, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Disconnect { conn, reply })
            .await?;
        self.receive(rx).await
    }

    /// Requests the session's metadata.
    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Info { reply }).await?;
        self.receive(rx).await
    }

    /// Stops the actor if no connection is bound to it.
    ///
    /// The check and the stop happen in one step inside the actor, so a
    /// join queued before this request keeps the session alive and a join
    /// queued after it sees `GameNotFound`. Returns `true` only to the
    /// caller whose request stopped the actor.
    pub async fn retire_if_empty(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .request(SessionCommand::RetireIfEmpty { reply })
            .await
            .is_err()
        {
            return false;
        }
        self.receive(rx).await.unwrap_or(false)
    }

    /// Asks the actor to stop. Commands already queued behind this one are
    /// dropped and their callers see `GameNotFound`.
    pub fn shutdown(&self) {
        let _ = self.sender.try_send(SessionCommand::Shutdown);
    }

    async fn request(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessionError::GameNotFound(self.game_id.clone()))
    }

    async fn receive<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, SessionError> {
        rx.await
            .map_err(|_| SessionError::GameNotFound(self.game_id.clone()))
    }
}

/// The actor state. Lives inside its own task.
struct SessionActor {
    game_id: GameId,
    game: Game<ConnectionId>,
    outboxes: HashMap<ConnectionId, Outbox>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        tracing::debug!(game_id = %self.game_id, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Join {
                    conn,
                    outbox,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(conn, outbox));
                }
                SessionCommand::Move {
                    conn,
                    row,
                    col,
                    reply,
                } => {
                    let _ = reply.send(self.handle_move(conn, row, col));
                }
                SessionCommand::Disconnect { conn, reply } => {
                    let _ = reply.send(self.handle_disconnect(conn));
                }
                SessionCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                SessionCommand::RetireIfEmpty { reply } => {
                    let empty = self.outboxes.is_empty();
                    let _ = reply.send(empty);
                    if empty {
                        tracing::debug!(game_id = %self.game_id, "session retired");
                        break;
                    }
                }
                SessionCommand::Shutdown => break,
            }
        }

        tracing::debug!(game_id = %self.game_id, "session actor stopped");
    }

    fn handle_join(&mut self, conn: ConnectionId, outbox: Outbox) -> Result<Role, GameError> {
        let was_active = self.game.phase() == Phase::Active;
        let role = self.game.join(conn)?;
        self.outboxes.insert(conn, outbox);

        tracing::info!(
            game_id = %self.game_id,
            %conn,
            %role,
            phase = %self.game.phase(),
            "connection joined"
        );

        self.send_to(conn, ServerEvent::PlayerAssigned { symbol: role });
        let state = ServerEvent::GameState(self.game.snapshot());
        match self.game.phase() {
            Phase::Active if !was_active => self.broadcast(&state),
            _ => self.send_to(conn, state),
        }
        Ok(role)
    }

    fn handle_move(
        &mut self,
        conn: ConnectionId,
        row: usize,
        col: usize,
    ) -> Result<Snapshot, GameError> {
        let snapshot = match self.game.make_move(conn, row, col) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(
                    game_id = %self.game_id,
                    %conn,
                    row,
                    col,
                    error = %e,
                    "move rejected"
                );
                return Err(e);
            }
        };

        self.broadcast(&ServerEvent::GameState(snapshot));
        if let Phase::Terminal(outcome) = self.game.phase() {
            tracing::info!(game_id = %self.game_id, ?outcome, "game finished");
        }
        Ok(snapshot)
    }

    fn handle_disconnect(&mut self, conn: ConnectionId) -> Departure {
        let snapshot = self.game.disconnect(conn);
        self.outboxes.remove(&conn);

        if let Some(snapshot) = snapshot {
            tracing::info!(game_id = %self.game_id, %conn, "player departed, game abandoned");
            self.broadcast(&ServerEvent::PlayerDisconnected);
            self.broadcast(&ServerEvent::GameState(snapshot));
        } else {
            tracing::debug!(game_id = %self.game_id, %conn, "connection left");
        }

        Departure {
            snapshot,
            remaining: self.outboxes.len(),
        }
    }

    /// Pushes an event to every bound connection.
    fn broadcast(&self, event: &ServerEvent) {
        for outbox in self.outboxes.values() {
            let _ = outbox.send(event.clone());
        }
    }

    /// Pushes an event to one connection. Dropped silently if that
    /// connection's writer is already gone.
    fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(outbox) = self.outboxes.get(&conn) {
            let _ = outbox.send(event);
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            game_id: self.game_id.clone(),
            phase: self.game.phase(),
            players: self.game.player_count(),
            spectators: self.game.spectator_count(),
            connections: self.outboxes.len(),
        }
    }
}

/// Spawns a session actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; callers wait when it is full.
pub(crate) fn spawn_session(game_id: GameId, channel_size: usize) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = SessionActor {
        game_id: game_id.clone(),
        game: Game::new(),
        outboxes: HashMap::new(),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    SessionHandle {
        game_id,
        sender: tx,
    }
}
