//! Per-connection handler: decode, dispatch, fan-out.
//!
//! Each accepted peer gets its own Tokio task running [`handle_connection`],
//! which first completes the WebSocket handshake. The connection is then
//! served by two loops:
//!
//! - the **reader** (this task) decodes `Envelope<ClientEvent>` frames and
//!   dispatches them to the registry and session actors;
//! - the **writer** (a spawned task) drains the connection's outbox, wraps
//!   each `ServerEvent` in an envelope, and sends it.
//!
//! Sessions push into the outbox directly, so a broadcast never waits on
//! any connection's socket and events reach each connection in the order
//! its sessions produced them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use noughts_protocol::{ClientEvent, Codec, Envelope, ErrorKind, GameId, ServerEvent};
use noughts_session::{Outbox, SessionError, SessionHandle};
use noughts_transport::{
    Connection, ConnectionId, Pending, PendingWebSocket, TransportError, WebSocketConnection,
};
use tokio::sync::mpsc;

use crate::NoughtsError;
use crate::server::ServerState;

/// How long the writer gets to flush queued events after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// How long a peer gets to complete the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// The games a connection is bound to.
///
/// Dropping it departs every game still listed. Normal shutdown calls
/// [`leave_all`](Self::leave_all) first; the drop path covers a handler
/// that unwinds. Since `Drop` is synchronous, the departures run on a
/// spawned task.
struct Membership<C: Codec> {
    conn_id: ConnectionId,
    games: HashSet<GameId>,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Membership<C> {
    fn new(conn_id: ConnectionId, state: Arc<ServerState<C>>) -> Self {
        Self {
            conn_id,
            games: HashSet::new(),
            state,
        }
    }

    /// Departs one game. Returns `false` if this connection was not in it.
    async fn leave(&mut self, game_id: &GameId) -> bool {
        if !self.games.remove(game_id) {
            return false;
        }
        depart(&self.state, self.conn_id, game_id).await;
        true
    }

    async fn leave_all(&mut self) {
        for game_id in std::mem::take(&mut self.games) {
            depart(&self.state, self.conn_id, &game_id).await;
        }
    }
}

impl<C: Codec> Drop for Membership<C> {
    fn drop(&mut self) {
        if self.games.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let conn_id = self.conn_id;
        let games = std::mem::take(&mut self.games);
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            for game_id in games {
                depart(&state, conn_id, &game_id).await;
            }
        });
    }
}

/// Removes `conn_id` from a session and retires the session if that left
/// it empty.
async fn depart<C: Codec>(state: &ServerState<C>, conn_id: ConnectionId, game_id: &GameId) {
    let lookup = state.registry.lock().await.get(game_id);
    let Ok(session) = lookup else {
        return;
    };

    match session.disconnect(conn_id).await {
        Ok(departure) => {
            tracing::debug!(
                %conn_id,
                %game_id,
                remaining = departure.remaining,
                abandoned = departure.snapshot.is_some(),
                "departed game"
            );
            if departure.remaining == 0 && state.retire(&session).await {
                tracing::debug!(%game_id, "retired empty session");
            }
        }
        Err(e) => {
            tracing::debug!(%conn_id, %game_id, error = %e, "departure skipped");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    pending: PendingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), NoughtsError> {
    let peer = pending.peer_addr();
    let conn = match tokio::time::timeout(HANDSHAKE_TIMEOUT, pending.upgrade()).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::debug!(%peer, "handshake timed out");
            return Ok(());
        }
    };
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let start = Instant::now();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbox, inbox) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        Arc::clone(&state),
        inbox,
        start,
    ));

    let mut membership = Membership::new(conn_id, Arc::clone(&state));
    let idle_timeout = state.config.idle_timeout;

    loop {
        let data = match recv_with_timeout(&conn, idle_timeout).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope<ClientEvent> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                reply(&outbox, ServerEvent::error(ErrorKind::InvalidMessage, e));
                continue;
            }
        };

        dispatch(&state, &mut membership, &outbox, envelope.event, start).await;
    }

    // Departures broadcast to the other parties and release this
    // connection's outbox from every session.
    membership.leave_all().await;
    drop(outbox);
    let _ = tokio::time::timeout(WRITER_DRAIN, writer).await;

    conn.close().await?;
    Ok(())
}

/// Routes one decoded event.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    membership: &mut Membership<C>,
    outbox: &Outbox,
    event: ClientEvent,
    start: Instant,
) {
    let conn_id = membership.conn_id;

    match event {
        ClientEvent::CreateGame => {
            let game_id = state.registry.lock().await.create();
            tracing::info!(%conn_id, %game_id, "game created");
            reply(outbox, ServerEvent::GameCreated { game_id });
        }

        ClientEvent::JoinGame { game_id } => {
            let result = match lookup(state, &game_id).await {
                Ok(session) => session.join(conn_id, outbox.clone()).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(role) => {
                    tracing::info!(%conn_id, %game_id, %role, "joined game");
                    membership.games.insert(game_id);
                }
                Err(e) => reply_error(outbox, conn_id, &e),
            }
        }

        // Any `symbol` the client sent is ignored. The session derives it
        // from this connection's binding.
        ClientEvent::MakeMove {
            game_id, row, col, ..
        } => {
            let result = match lookup(state, &game_id).await {
                Ok(session) => session.make_move(conn_id, row, col).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                reply_error(outbox, conn_id, &e);
            }
        }

        ClientEvent::LeaveGame { game_id } => {
            if !membership.leave(&game_id).await {
                tracing::debug!(%conn_id, %game_id, "leave for a game not joined");
            }
        }

        ClientEvent::Heartbeat { client_time } => {
            reply(
                outbox,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: millis_since(start),
                },
            );
        }
    }
}

/// Resolves a session handle, holding the registry lock only for the
/// lookup.
async fn lookup<C: Codec>(
    state: &ServerState<C>,
    game_id: &GameId,
) -> Result<SessionHandle, SessionError> {
    state.registry.lock().await.get(game_id)
}

/// Drains the outbox onto the socket until every sender is gone or a send
/// fails.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent>,
    start: Instant,
) {
    let conn_id = conn.id();
    let mut seq: u64 = 1;

    while let Some(event) = inbox.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), millis_since(start), event);
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}

async fn recv_with_timeout(
    conn: &WebSocketConnection,
    idle_timeout: Option<Duration>,
) -> Result<Result<Option<Vec<u8>>, TransportError>, tokio::time::error::Elapsed> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, conn.recv()).await,
        None => Ok(conn.recv().await),
    }
}

/// Queues an event for this connection only.
fn reply(outbox: &Outbox, event: ServerEvent) {
    let _ = outbox.send(event);
}

/// Reports a rejected request to the requester. Nothing is broadcast.
fn reply_error(outbox: &Outbox, conn_id: ConnectionId, err: &SessionError) {
    tracing::debug!(%conn_id, error = %err, "request rejected");
    reply(outbox, ServerEvent::error(err.kind(), err));
}

fn millis_since(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
