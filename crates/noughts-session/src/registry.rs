//! Session registry: the process-wide directory of live games.
//!
//! The registry itself is a plain map. The server wraps it in a
//! `tokio::sync::Mutex` and only holds that lock for map operations, so
//! the registry is never a bottleneck for game traffic: moves go straight
//! to the session actor through a cloned [`SessionHandle`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use noughts_protocol::GameId;
use rand::Rng;

use crate::session::spawn_session;
use crate::{SessionError, SessionHandle};

/// Default command channel size for session actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

struct Entry {
    handle: SessionHandle,
    created: Instant,
}

/// Directory of live sessions keyed by public [`GameId`].
///
/// ```text
/// create() ──→ [live] ──→ retire_if_empty() + remove() ──→ gone
/// ```
pub struct Registry {
    sessions: HashMap<GameId, Entry>,
    channel_size: usize,
}

impl Registry {
    /// Creates an empty registry using [`DEFAULT_CHANNEL_SIZE`].
    pub fn new() -> Self {
        Self::with_channel_size(DEFAULT_CHANNEL_SIZE)
    }

    /// Creates an empty registry whose session actors queue at most
    /// `channel_size` commands.
    pub fn with_channel_size(channel_size: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            channel_size: channel_size.max(1),
        }
    }

    /// Starts a new session and returns its id.
    ///
    /// Ids are 8 lowercase hex characters. A fresh one is drawn until it
    /// does not collide with any live session.
    pub fn create(&mut self) -> GameId {
        let game_id = loop {
            let candidate = generate_game_id();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let handle = spawn_session(game_id.clone(), self.channel_size);
        self.sessions.insert(
            game_id.clone(),
            Entry {
                handle,
                created: Instant::now(),
            },
        );
        tracing::info!(%game_id, live = self.sessions.len(), "session created");
        game_id
    }

    /// Looks up a session.
    ///
    /// # Errors
    /// [`SessionError::GameNotFound`] if no live session has this id.
    pub fn get(&self, game_id: &GameId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .get(game_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| SessionError::GameNotFound(game_id.clone()))
    }

    /// Removes a session and stops its actor. Removing an unknown id is a
    /// no-op. Returns whether anything was removed.
    pub fn remove(&mut self, game_id: &GameId) -> bool {
        match self.sessions.remove(game_id) {
            Some(entry) => {
                entry.handle.shutdown();
                tracing::info!(%game_id, live = self.sessions.len(), "session removed");
                true
            }
            None => false,
        }
    }

    /// Handles of every session created at least `ttl` ago.
    ///
    /// Candidates for the unclaimed sweep. Whether one is actually empty is
    /// decided by [`SessionHandle::retire_if_empty`], which the caller
    /// awaits without holding the registry.
    pub fn unclaimed(&self, ttl: Duration) -> Vec<SessionHandle> {
        self.sessions
            .values()
            .filter(|entry| entry.created.elapsed() >= ttl)
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Lists all live session ids.
    pub fn ids(&self) -> Vec<GameId> {
        self.sessions.keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates 32 random bits as 8 lowercase hex characters.
fn generate_game_id() -> GameId {
    let bytes: [u8; 4] = rand::rng().random();
    GameId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
