//! `NoughtsServer` builder and server loop.
//!
//! Ties the layers together: WebSocket transport → JSON codec → per-game
//! session actors held in the registry.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use noughts_protocol::{Codec, GameId, JsonCodec};
use noughts_session::{Registry, SessionHandle};
use noughts_transport::{Transport, TransportError, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{NoughtsError, ServerConfig};

/// The sweeper never runs more often than this.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Shared server state passed to each connection handler task.
///
/// The registry lock is only held for map operations, never while a frame
/// is being sent or received.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

impl<C: Codec> ServerState<C> {
    /// Stops `session` if nobody is bound to it, then drops its registry
    /// entry. Returns whether the session was retired.
    ///
    /// The session actor is awaited without the registry lock; the lock is
    /// taken afterwards only to remove the entry.
    pub(crate) async fn retire(&self, session: &SessionHandle) -> bool {
        if !session.retire_if_empty().await {
            return false;
        }
        self.registry.lock().await.remove(session.game_id());
        true
    }

    /// Retires every session older than the unclaimed TTL that has no
    /// connection. Returns the ids removed.
    pub(crate) async fn sweep_unclaimed(&self) -> Vec<GameId> {
        let candidates = self
            .registry
            .lock()
            .await
            .unclaimed(self.config.unclaimed_ttl);

        let mut removed = Vec::new();
        for session in candidates {
            if self.retire(&session).await {
                removed.push(session.game_id().clone());
            }
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "swept unclaimed sessions");
        }
        removed
    }
}

/// Builder for configuring and starting a Noughts server.
///
/// ```rust,no_run
/// # async fn start() -> Result<(), noughts::NoughtsError> {
/// use noughts::NoughtsServer;
///
/// let server = NoughtsServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NoughtsServerBuilder {
    config: ServerConfig,
}

impl NoughtsServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a silent connection is kept. `None` keeps it forever.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the command queue length of each session actor.
    pub fn channel_size(mut self, size: usize) -> Self {
        self.config.channel_size = size;
        self
    }

    /// Sets how old an empty session must be before it is swept.
    pub fn unclaimed_ttl(mut self, ttl: Duration) -> Self {
        self.config.unclaimed_ttl = ttl;
        self
    }

    /// Sets how often the sweeper runs.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Binds the listener and builds the server with the JSON codec.
    pub async fn build(self) -> Result<NoughtsServer<JsonCodec>, NoughtsError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(Registry::with_channel_size(self.config.channel_size)),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(NoughtsServer { transport, state })
    }
}

impl Default for NoughtsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Noughts server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NoughtsServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl NoughtsServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> NoughtsServerBuilder {
        NoughtsServerBuilder::new()
    }
}

impl<C: Codec> NoughtsServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.transport.local_addr()
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop.
    ///
    /// Spawns the unclaimed-session sweeper, then a handler task per
    /// accepted peer. The WebSocket handshake runs inside that task, so a
    /// stalled peer never holds up the loop. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), NoughtsError> {
        tracing::info!(addr = %self.state.config.bind_addr, "Noughts server running");
        spawn_sweeper(Arc::downgrade(&self.state));

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(pending, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically removes sessions nobody is bound to. Stops once the
/// server state is gone.
fn spawn_sweeper<C: Codec>(state: Weak<ServerState<C>>) {
    tokio::spawn(async move {
        let Some(period) = state
            .upgrade()
            .map(|s| s.config.sweep_interval.max(MIN_SWEEP_INTERVAL))
        else {
            return;
        };
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                break;
            };
            let started = Instant::now();
            let removed = state.sweep_unclaimed().await;
            if !removed.is_empty() {
                tracing::debug!(
                    count = removed.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sweep finished"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use noughts_transport::ConnectionId;
    use tokio::sync::mpsc;

    fn state(unclaimed_ttl: Duration) -> ServerState<JsonCodec> {
        ServerState {
            registry: Mutex::new(Registry::new()),
            codec: JsonCodec,
            config: ServerConfig {
                unclaimed_ttl,
                ..ServerConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn test_retire_skips_session_joined_meanwhile() {
        let state = state(Duration::ZERO);
        let game_id = state.registry.lock().await.create();
        let session = state.registry.lock().await.get(&game_id).unwrap();
        let (outbox, _inbox) = mpsc::unbounded_channel();

        // The join is queued first, so the emptiness check sees it.
        let (joined, retired) = tokio::join!(
            session.join(ConnectionId::new(1), outbox),
            state.retire(&session),
        );
        assert!(joined.is_ok());
        assert!(!retired);
        assert!(state.registry.lock().await.get(&game_id).is_ok());
    }

    #[tokio::test]
    async fn test_retire_removes_empty_session() {
        let state = state(Duration::ZERO);
        let game_id = state.registry.lock().await.create();
        let session = state.registry.lock().await.get(&game_id).unwrap();

        assert!(state.retire(&session).await);
        assert!(state.registry.lock().await.is_empty());
        assert!(!state.retire(&session).await);
    }

    #[tokio::test]
    async fn test_sweep_unclaimed_keeps_bound_sessions() {
        let state = state(Duration::ZERO);
        let empty = state.registry.lock().await.create();
        let bound = state.registry.lock().await.create();
        let session = state.registry.lock().await.get(&bound).unwrap();
        let (outbox, _inbox) = mpsc::unbounded_channel();
        session.join(ConnectionId::new(1), outbox).await.unwrap();

        assert_eq!(state.sweep_unclaimed().await, vec![empty]);
        assert_eq!(state.registry.lock().await.ids(), vec![bound]);
    }

    #[tokio::test]
    async fn test_sweep_unclaimed_respects_ttl() {
        let state = state(Duration::from_secs(3600));
        state.registry.lock().await.create();
        assert!(state.sweep_unclaimed().await.is_empty());
        assert_eq!(state.registry.lock().await.len(), 1);
    }
}
