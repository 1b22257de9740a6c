//! The player registry: every player the server currently knows about.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is a plain struct over `HashMap`s. The server shares
//! one instance as [`SharedPlayers`] (an `Arc<tokio::sync::Mutex<_>>`).
//! Room actors take the lock briefly to read names and write back
//! per-game results; nobody holds it across an await on another task.
//!
//! Per-game fields (score, stats, status) of a player are only written
//! by the one room that player sits in. The room registry guarantees a
//! player sits in at most one room, so those writes never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quizforge_protocol::{ConnectionId, PlayerId};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{Player, PlayerError, PlayerStatus, validate_name};

/// Registry shared between the server facade and room actors.
pub type SharedPlayers = Arc<Mutex<PlayerRegistry>>;

/// Tracks connected (and recently disconnected) players by id and name.
///
/// ## Lifecycle
///
/// ```text
/// add_player() ──→ [Connected] ──→ disconnect() ──→ [Disconnected]
///                       ↑                                 │
///                       └──── add_player(same name) ──────┘
///
/// mark_inactive(timeout) ──→ removed (any status)
/// ```
#[derive(Debug)]
pub struct PlayerRegistry {
    /// All players, keyed by id.
    players: HashMap<PlayerId, Player>,

    /// Index from display name to id, kept in sync with `players`.
    names: HashMap<String, PlayerId>,

    next_id: u64,
}

impl PlayerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            names: HashMap::new(),
            next_id: 1,
        }
    }

    /// Wraps a new registry for sharing with room actors.
    pub fn shared() -> SharedPlayers {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers a player by name, or reconnects a disconnected one.
    ///
    /// If a *disconnected* player already holds the name, that player is
    /// resumed: same id, new connection handle, status back to
    /// `Connected`. Score and stats are kept.
    ///
    /// # Errors
    /// - [`PlayerError::InvalidName`]: name failed validation
    /// - [`PlayerError::NameTaken`]: the holder of the name is still connected
    pub fn add_player(
        &mut self,
        name: &str,
        connection: ConnectionId,
    ) -> Result<&Player, PlayerError> {
        let name = validate_name(name)?;

        if let Some(&existing) = self.names.get(&name) {
            let player = self
                .players
                .get_mut(&existing)
                .ok_or(PlayerError::NotFound(existing))?;
            if player.status != PlayerStatus::Disconnected {
                return Err(PlayerError::NameTaken(name));
            }
            player.connection = connection;
            player.status = PlayerStatus::Connected;
            player.last_activity = Instant::now();
            tracing::info!(player_id = %existing, %connection, "player reconnected");
            return Ok(&*player);
        }

        let id = PlayerId(self.next_id);
        self.next_id += 1;
        self.names.insert(name.clone(), id);
        tracing::info!(player_id = %id, %name, %connection, "player registered");
        Ok(self
            .players
            .entry(id)
            .or_insert_with(|| Player::new(id, name, connection)))
    }

    /// Removes a player for good, returning its last record.
    pub fn remove(&mut self, player_id: PlayerId) -> Result<Player, PlayerError> {
        let player = self
            .players
            .remove(&player_id)
            .ok_or(PlayerError::NotFound(player_id))?;
        self.names.remove(&player.name);
        tracing::info!(%player_id, "player removed");
        Ok(player)
    }

    /// Looks up a player by id.
    pub fn get(&self, player_id: PlayerId) -> Result<&Player, PlayerError> {
        self.players
            .get(&player_id)
            .ok_or(PlayerError::NotFound(player_id))
    }

    /// Looks up a player id by display name (trimmed, exact match).
    pub fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        self.names.get(name.trim()).copied()
    }

    /// Marks a player as disconnected. The name stays reserved so the
    /// player can reconnect with it.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Result<(), PlayerError> {
        let player = self.get_mut(player_id)?;
        player.status = PlayerStatus::Disconnected;
        tracing::info!(%player_id, "player disconnected");
        Ok(())
    }

    /// Records activity for the player, resetting its inactivity clock.
    pub fn touch(&mut self, player_id: PlayerId) -> Result<(), PlayerError> {
        self.get_mut(player_id)?.last_activity = Instant::now();
        Ok(())
    }

    /// Sets a player's status. Disconnected players stay disconnected;
    /// only a reconnect brings them back.
    pub fn set_status(
        &mut self,
        player_id: PlayerId,
        status: PlayerStatus,
    ) -> Result<(), PlayerError> {
        let player = self.get_mut(player_id)?;
        if player.status != PlayerStatus::Disconnected {
            player.status = status;
        }
        Ok(())
    }

    /// Folds one judged answer into the player's per-game accumulators.
    pub fn record_answer(
        &mut self,
        player_id: PlayerId,
        correct: bool,
        response_time: Duration,
        points: u32,
    ) -> Result<(), PlayerError> {
        let player = self.get_mut(player_id)?;
        player.stats.answered += 1;
        player.stats.total_response += response_time;
        if correct {
            player.stats.correct += 1;
        }
        player.score = player.score.saturating_add(points);
        Ok(())
    }

    /// Clears score and stats ahead of a new game.
    pub fn reset_for_new_game(&mut self, player_id: PlayerId) -> Result<(), PlayerError> {
        self.get_mut(player_id)?.reset_for_new_game();
        Ok(())
    }

    /// Removes every player whose last activity is at least `timeout` ago.
    ///
    /// Called by the server's maintenance task, never by a room. Returns
    /// the removed ids so the caller can take them out of their rooms.
    pub fn mark_inactive(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let mut stale: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.is_inactive(timeout))
            .map(|p| p.id)
            .collect();
        stale.sort();

        for id in &stale {
            if let Some(player) = self.players.remove(id) {
                self.names.remove(&player.name);
                tracing::info!(
                    player_id = %id,
                    idle_secs = player.last_activity.elapsed().as_secs(),
                    "inactive player removed"
                );
            }
        }

        stale
    }

    /// Iterates over all registered players.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Returns the number of registered players (any status).
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no players are registered.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn get_mut(&mut self, player_id: PlayerId) -> Result<&mut Player, PlayerError> {
        self.players
            .get_mut(&player_id)
            .ok_or(PlayerError::NotFound(player_id))
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
